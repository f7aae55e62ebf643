use time::{Date, Duration, OffsetDateTime};
use tracing::{info, instrument};

use crate::config::UpdatedAtPolicy;
use crate::error::{AppError, AppResult};
use crate::meals::dto::MealRequest;
use crate::meals::repo_types::{Meal, MealChanges, MealType, NewMeal};
use crate::state::AppState;

/// `[date 00:00, date+1 00:00)` in UTC.
pub(crate) fn day_window(date: Date) -> (OffsetDateTime, OffsetDateTime) {
    let start = date.midnight().assume_utc();
    (start, start + Duration::days(1))
}

pub(crate) fn stamp_updated_at(
    policy: UpdatedAtPolicy,
    supplied: Option<Date>,
    now: OffsetDateTime,
) -> OffsetDateTime {
    match (supplied, policy) {
        (Some(date), _) => date.midnight().assume_utc(),
        (None, UpdatedAtPolicy::SuppliedOrNow) => now,
        (None, UpdatedAtPolicy::StartOfDay) => now.date().midnight().assume_utc(),
    }
}

async fn ensure_member(st: &AppState, member_id: i64) -> AppResult<()> {
    match st.members.find_by_id(member_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::member_not_found()),
    }
}

#[instrument(skip(st, req), fields(foods = req.foods.len()))]
pub async fn create_meal(st: &AppState, member_id: i64, req: MealRequest) -> AppResult<Meal> {
    ensure_member(st, member_id).await?;

    let meal = st
        .meals
        .insert(NewMeal {
            member_id,
            meal_type: req.meal_type,
            image_url: req.image_url,
            memo: req.memo,
            foods: req.foods.into_iter().map(Into::into).collect(),
        })
        .await?;

    info!(meal_id = meal.id, member_id, "meal created");
    Ok(meal)
}

pub async fn get_meal(st: &AppState, id: i64) -> AppResult<Meal> {
    st.meals
        .find_by_id(id)
        .await?
        .ok_or_else(AppError::meal_not_found)
}

pub async fn list_all(st: &AppState) -> AppResult<Vec<Meal>> {
    Ok(st.meals.list_all().await?)
}

pub async fn list_by_member(st: &AppState, member_id: i64) -> AppResult<Vec<Meal>> {
    ensure_member(st, member_id).await?;
    Ok(st.meals.list_by_member(member_id).await?)
}

pub async fn list_by_member_and_type(
    st: &AppState,
    member_id: i64,
    meal_type: MealType,
) -> AppResult<Vec<Meal>> {
    ensure_member(st, member_id).await?;
    Ok(st.meals.list_by_member_and_type(member_id, meal_type).await?)
}

pub async fn list_by_updated_date(st: &AppState, date: Date) -> AppResult<Vec<Meal>> {
    let (from, until) = day_window(date);
    Ok(st.meals.list_updated_between(from, until).await?)
}

/// Full replace: the meal's foods become exactly `req.foods`.
#[instrument(skip(st, req), fields(foods = req.foods.len()))]
pub async fn update_meal(st: &AppState, id: i64, req: MealRequest) -> AppResult<Meal> {
    let updated_at = stamp_updated_at(
        st.config.meal_updated_at,
        req.updated_at,
        OffsetDateTime::now_utc(),
    );
    let changes = MealChanges {
        meal_type: req.meal_type,
        image_url: req.image_url,
        memo: req.memo,
        updated_at,
    };
    let foods = req.foods.into_iter().map(Into::into).collect();

    let meal = st
        .meals
        .replace(id, changes, foods)
        .await?
        .ok_or_else(AppError::meal_not_found)?;

    info!(meal_id = id, "meal updated");
    Ok(meal)
}

#[instrument(skip(st))]
pub async fn update_meal_image(st: &AppState, id: i64, image_url: Option<String>) -> AppResult<()> {
    if !st
        .meals
        .update_image(id, image_url, OffsetDateTime::now_utc())
        .await?
    {
        return Err(AppError::meal_not_found());
    }
    Ok(())
}

#[instrument(skip(st))]
pub async fn delete_meal(st: &AppState, id: i64) -> AppResult<()> {
    if !st.meals.delete(id).await? {
        return Err(AppError::meal_not_found());
    }
    info!(meal_id = id, "meal deleted");
    Ok(())
}
