//! In-memory stand-ins for the Postgres stores and the file storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::meals::repo::MealStore;
use crate::meals::repo_types::{Food, Meal, MealChanges, MealType, NewFood, NewMeal};
use crate::members::repo::{MemberStore, UniqueViolation};
use crate::members::repo_types::{Member, NewMember};
use crate::storage::StorageClient;

#[derive(Default)]
struct Tables {
    next_id: i64,
    members: BTreeMap<i64, Member>,
    meals: BTreeMap<i64, Meal>, // `foods` left empty, rows live in `foods`
    foods: BTreeMap<i64, Food>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_foods(&mut self, meal_id: i64, foods: &[NewFood]) {
        for f in foods {
            let id = self.next_id();
            self.foods.insert(
                id,
                Food {
                    id,
                    meal_id,
                    food_name: f.food_name.clone(),
                    nutrients: f.nutrients,
                },
            );
        }
    }

    fn load(&self, meal: &Meal) -> Meal {
        let foods = self
            .foods
            .values()
            .filter(|f| f.meal_id == meal.id)
            .cloned()
            .collect();
        Meal {
            foods,
            ..meal.clone()
        }
    }

    fn delete_meal(&mut self, id: i64) -> bool {
        self.foods.retain(|_, f| f.meal_id != id);
        self.meals.remove(&id).is_some()
    }
}

/// Shared tables so member deletes can cascade into meals.
#[derive(Clone, Default)]
pub struct Db(Arc<Mutex<Tables>>);

pub struct MemoryMemberStore {
    db: Db,
}

impl MemoryMemberStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemberStore for MemoryMemberStore {
    async fn insert(&self, new: NewMember) -> anyhow::Result<Member> {
        let mut t = self.db.0.lock().unwrap();
        if t.members.values().any(|m| m.email == new.email) {
            return Err(UniqueViolation("members_email_key".into()).into());
        }
        if t.members.values().any(|m| m.nickname == new.nickname) {
            return Err(UniqueViolation("members_nickname_key".into()).into());
        }
        let id = t.next_id();
        let now = OffsetDateTime::now_utc();
        let member = Member {
            id,
            email: new.email,
            nickname: new.nickname,
            password_hash: new.password_hash,
            name: new.name,
            birth_at: new.birth_at,
            gender: new.gender,
            height: new.height,
            weight: new.weight,
            activity_level: new.activity_level,
            profile_image_url: new.profile_image_url,
            role: new.role,
            created_at: now,
            updated_at: now,
        };
        t.members.insert(id, member.clone());
        Ok(member)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Member>> {
        Ok(self.db.0.lock().unwrap().members.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Member>> {
        let t = self.db.0.lock().unwrap();
        Ok(t.members.values().find(|m| m.email == email).cloned())
    }

    async fn find_by_nickname(&self, nickname: &str) -> anyhow::Result<Option<Member>> {
        let t = self.db.0.lock().unwrap();
        Ok(t.members.values().find(|m| m.nickname == nickname).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn exists_by_nickname(&self, nickname: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_nickname(nickname).await?.is_some())
    }

    async fn update(&self, member: &Member) -> anyhow::Result<Option<Member>> {
        let mut t = self.db.0.lock().unwrap();
        let clash = t.members.values().any(|m| {
            m.id != member.id && (m.email == member.email || m.nickname == member.nickname)
        });
        if clash {
            return Err(UniqueViolation("members_unique".into()).into());
        }
        match t.members.get_mut(&member.id) {
            Some(row) => {
                *row = Member {
                    created_at: row.created_at,
                    ..member.clone()
                };
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let mut t = self.db.0.lock().unwrap();
        if t.members.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<i64> = t
            .meals
            .values()
            .filter(|m| m.member_id == id)
            .map(|m| m.id)
            .collect();
        for meal_id in owned {
            t.delete_meal(meal_id);
        }
        Ok(true)
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Member>> {
        let q = query.to_lowercase();
        let t = self.db.0.lock().unwrap();
        Ok(t.members
            .values()
            .filter(|m| m.nickname.to_lowercase().contains(&q) || m.email.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }
}

pub struct MemoryMealStore {
    db: Db,
}

impl MemoryMealStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn list(&self, pred: impl Fn(&Meal) -> bool) -> Vec<Meal> {
        let t = self.db.0.lock().unwrap();
        t.meals.values().filter(|m| pred(m)).map(|m| t.load(m)).collect()
    }
}

#[async_trait]
impl MealStore for MemoryMealStore {
    async fn insert(&self, new: NewMeal) -> anyhow::Result<Meal> {
        let mut t = self.db.0.lock().unwrap();
        anyhow::ensure!(
            t.members.contains_key(&new.member_id),
            "foreign key violation: member {}",
            new.member_id
        );
        let id = t.next_id();
        let now = OffsetDateTime::now_utc();
        let meal = Meal {
            id,
            member_id: new.member_id,
            meal_type: new.meal_type,
            image_url: new.image_url,
            memo: new.memo,
            foods: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        t.meals.insert(id, meal.clone());
        t.insert_foods(id, &new.foods);
        Ok(t.load(&meal))
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Meal>> {
        let t = self.db.0.lock().unwrap();
        Ok(t.meals.get(&id).map(|m| t.load(m)))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Meal>> {
        Ok(self.list(|_| true))
    }

    async fn list_by_member(&self, member_id: i64) -> anyhow::Result<Vec<Meal>> {
        Ok(self.list(|m| m.member_id == member_id))
    }

    async fn list_by_member_and_type(
        &self,
        member_id: i64,
        meal_type: MealType,
    ) -> anyhow::Result<Vec<Meal>> {
        Ok(self.list(|m| m.member_id == member_id && m.meal_type == meal_type))
    }

    async fn list_updated_between(
        &self,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> anyhow::Result<Vec<Meal>> {
        Ok(self.list(|m| m.updated_at >= from && m.updated_at < until))
    }

    async fn replace(
        &self,
        id: i64,
        changes: MealChanges,
        foods: Vec<NewFood>,
    ) -> anyhow::Result<Option<Meal>> {
        let mut t = self.db.0.lock().unwrap();
        let Some(meal) = t.meals.get_mut(&id) else {
            return Ok(None);
        };
        meal.meal_type = changes.meal_type;
        meal.image_url = changes.image_url;
        meal.memo = changes.memo;
        meal.updated_at = changes.updated_at;
        let meal = meal.clone();

        t.foods.retain(|_, f| f.meal_id != id);
        t.insert_foods(id, &foods);
        Ok(Some(t.load(&meal)))
    }

    async fn update_image(
        &self,
        id: i64,
        image_url: Option<String>,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut t = self.db.0.lock().unwrap();
        match t.meals.get_mut(&id) {
            Some(meal) => {
                meal.image_url = image_url;
                meal.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.db.0.lock().unwrap().delete_meal(id))
    }
}

impl Db {
    pub fn food_rows(&self) -> usize {
        self.0.lock().unwrap().foods.len()
    }

    pub fn force_meal_updated_at(&self, id: i64, at: OffsetDateTime) {
        let mut t = self.0.lock().unwrap();
        if let Some(meal) = t.meals.get_mut(&id) {
            meal.updated_at = at;
        }
    }
}

/// Keeps uploaded bytes in a map keyed by storage key.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/images/{key}")
    }
}
