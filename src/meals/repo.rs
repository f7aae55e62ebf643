use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::meals::repo_types::{Food, Meal, MealChanges, MealRow, MealType, NewFood, NewMeal};

#[async_trait]
pub trait MealStore: Send + Sync {
    /// Inserts the meal, then its foods, in one transaction.
    async fn insert(&self, new: NewMeal) -> anyhow::Result<Meal>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Meal>>;
    async fn list_all(&self) -> anyhow::Result<Vec<Meal>>;
    async fn list_by_member(&self, member_id: i64) -> anyhow::Result<Vec<Meal>>;
    async fn list_by_member_and_type(
        &self,
        member_id: i64,
        meal_type: MealType,
    ) -> anyhow::Result<Vec<Meal>>;
    /// Meals with `from <= updated_at < until`.
    async fn list_updated_between(
        &self,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>>;
    /// Drops every food of the meal, inserts `foods` and rewrites the scalar fields.
    async fn replace(
        &self,
        id: i64,
        changes: MealChanges,
        foods: Vec<NewFood>,
    ) -> anyhow::Result<Option<Meal>>;
    async fn update_image(
        &self,
        id: i64,
        image_url: Option<String>,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool>;
    /// Foods are removed by the cascading foreign key.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
}

const MEAL_COLUMNS: &str = "id, member_id, meal_type, image_url, memo, created_at, updated_at";

#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
}

impl PgMealStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Loads the foods of all `rows` in one query and stitches them on.
    async fn with_foods(&self, rows: Vec<MealRow>) -> anyhow::Result<Vec<Meal>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let foods = sqlx::query_as::<_, Food>(
            r#"
            SELECT id, meal_id, food_name, calories, carbohydrate, protein, fat, sodium, fiber
              FROM foods
             WHERE meal_id = ANY($1)
             ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("load foods")?;

        let mut by_meal: HashMap<i64, Vec<Food>> = HashMap::new();
        for f in foods {
            by_meal.entry(f.meal_id).or_default().push(f);
        }
        rows.into_iter()
            .map(|r| {
                let foods = by_meal.remove(&r.id).unwrap_or_default();
                r.into_meal(foods)
            })
            .collect()
    }
}

async fn insert_foods_tx(
    tx: &mut Transaction<'_, Postgres>,
    meal_id: i64,
    foods: &[NewFood],
) -> anyhow::Result<Vec<Food>> {
    let mut out = Vec::with_capacity(foods.len());
    for f in foods {
        let food = sqlx::query_as::<_, Food>(
            r#"
            INSERT INTO foods (meal_id, food_name, calories, carbohydrate, protein, fat, sodium, fiber)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, meal_id, food_name, calories, carbohydrate, protein, fat, sodium, fiber
            "#,
        )
        .bind(meal_id)
        .bind(&f.food_name)
        .bind(f.nutrients.calories)
        .bind(f.nutrients.carbohydrate)
        .bind(f.nutrients.protein)
        .bind(f.nutrients.fat)
        .bind(f.nutrients.sodium)
        .bind(f.nutrients.fiber)
        .fetch_one(&mut **tx)
        .await
        .context("insert food")?;
        out.push(food);
    }
    Ok(out)
}

#[async_trait]
impl MealStore for PgMealStore {
    async fn insert(&self, new: NewMeal) -> anyhow::Result<Meal> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            INSERT INTO meals (member_id, meal_type, image_url, memo)
            VALUES ($1, $2, $3, $4)
            RETURNING {MEAL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MealRow>(&sql)
            .bind(new.member_id)
            .bind(new.meal_type.as_str())
            .bind(&new.image_url)
            .bind(&new.memo)
            .fetch_one(&mut *tx)
            .await
            .context("insert meal")?;

        let foods = insert_foods_tx(&mut tx, row.id, &new.foods).await?;
        tx.commit().await.context("commit tx")?;

        row.into_meal(foods)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Meal>> {
        let sql = format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, MealRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find meal")?
        else {
            return Ok(None);
        };
        Ok(self.with_foods(vec![row]).await?.pop())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Meal>> {
        let sql = format!("SELECT {MEAL_COLUMNS} FROM meals ORDER BY id");
        let rows = sqlx::query_as::<_, MealRow>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list meals")?;
        self.with_foods(rows).await
    }

    async fn list_by_member(&self, member_id: i64) -> anyhow::Result<Vec<Meal>> {
        let sql = format!("SELECT {MEAL_COLUMNS} FROM meals WHERE member_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, MealRow>(&sql)
            .bind(member_id)
            .fetch_all(&self.db)
            .await
            .context("list meals by member")?;
        self.with_foods(rows).await
    }

    async fn list_by_member_and_type(
        &self,
        member_id: i64,
        meal_type: MealType,
    ) -> anyhow::Result<Vec<Meal>> {
        let sql = format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE member_id = $1 AND meal_type = $2 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, MealRow>(&sql)
            .bind(member_id)
            .bind(meal_type.as_str())
            .fetch_all(&self.db)
            .await
            .context("list meals by member and type")?;
        self.with_foods(rows).await
    }

    async fn list_updated_between(
        &self,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>> {
        let sql = format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE updated_at >= $1 AND updated_at < $2 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, MealRow>(&sql)
            .bind(from)
            .bind(until)
            .fetch_all(&self.db)
            .await
            .context("list meals by updated_at")?;
        self.with_foods(rows).await
    }

    async fn replace(
        &self,
        id: i64,
        changes: MealChanges,
        foods: Vec<NewFood>,
    ) -> anyhow::Result<Option<Meal>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            UPDATE meals
               SET meal_type = $2, image_url = $3, memo = $4, updated_at = $5
             WHERE id = $1
            RETURNING {MEAL_COLUMNS}
            "#
        );
        let Some(row) = sqlx::query_as::<_, MealRow>(&sql)
            .bind(id)
            .bind(changes.meal_type.as_str())
            .bind(&changes.image_url)
            .bind(&changes.memo)
            .bind(changes.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .context("update meal")?
        else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM foods WHERE meal_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete foods")?;
        let foods = insert_foods_tx(&mut tx, id, &foods).await?;

        tx.commit().await.context("commit tx")?;
        row.into_meal(foods).map(Some)
    }

    async fn update_image(
        &self,
        id: i64,
        image_url: Option<String>,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE meals SET image_url = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(image_url)
            .bind(updated_at)
            .execute(&self.db)
            .await
            .context("update meal image")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete meal")?;
        Ok(res.rows_affected() > 0)
    }
}
