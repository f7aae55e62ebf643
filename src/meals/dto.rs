use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::meals::repo_types::{Food, Meal, MealType, NewFood, Nutrients};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodRequest {
    pub food_name: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
}

impl From<FoodRequest> for NewFood {
    fn from(f: FoodRequest) -> Self {
        Self {
            food_name: f.food_name,
            nutrients: f.nutrients,
        }
    }
}

/// Body of meal create and full update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRequest {
    pub meal_type: MealType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodRequest>,
    /// Only read on update.
    #[serde(default, with = "iso_date::option")]
    pub updated_at: Option<Date>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealImageRequest {
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberIdQuery {
    pub member_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(with = "iso_date")]
    pub date: Date,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodResponse {
    pub id: i64,
    pub food_name: String,
    #[serde(flatten)]
    pub nutrients: Nutrients,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealResponse {
    pub id: i64,
    pub member_id: i64,
    pub meal_type: MealType,
    pub image_url: Option<String>,
    pub memo: Option<String>,
    pub foods: Vec<FoodResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Food> for FoodResponse {
    fn from(f: Food) -> Self {
        Self {
            id: f.id,
            food_name: f.food_name,
            nutrients: f.nutrients,
        }
    }
}

impl From<Meal> for MealResponse {
    fn from(m: Meal) -> Self {
        Self {
            id: m.id,
            member_id: m.member_id,
            meal_type: m.meal_type,
            image_url: m.image_url,
            memo: m.memo,
            foods: m.foods.into_iter().map(Into::into).collect(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
