use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "BREAKFAST",
            MealType::Lunch => "LUNCH",
            MealType::Dinner => "DINNER",
            MealType::Snack => "SNACK",
        }
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BREAKFAST" => Ok(MealType::Breakfast),
            "LUNCH" => Ok(MealType::Lunch),
            "DINNER" => Ok(MealType::Dinner),
            "SNACK" => Ok(MealType::Snack),
            other => anyhow::bail!("unknown meal type {other:?}"),
        }
    }
}

/// Nutrition fields shared by stored foods and food inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Nutrients {
    pub calories: f64,
    pub carbohydrate: f64,
    pub protein: f64,
    pub fat: f64,
    pub sodium: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Food {
    pub id: i64,
    pub meal_id: i64,
    pub food_name: String,
    #[sqlx(flatten)]
    pub nutrients: Nutrients,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFood {
    pub food_name: String,
    pub nutrients: Nutrients,
}

/// A meal together with the foods it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Meal {
    pub id: i64,
    pub member_id: i64,
    pub meal_type: MealType,
    pub image_url: Option<String>,
    pub memo: Option<String>,
    pub foods: Vec<Food>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub member_id: i64,
    pub meal_type: MealType,
    pub image_url: Option<String>,
    pub memo: Option<String>,
    pub foods: Vec<NewFood>,
}

/// Scalar fields rewritten by a full meal update.
#[derive(Debug, Clone)]
pub struct MealChanges {
    pub meal_type: MealType,
    pub image_url: Option<String>,
    pub memo: Option<String>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: i64,
    pub member_id: i64,
    pub meal_type: String,
    pub image_url: Option<String>,
    pub memo: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl MealRow {
    pub fn into_meal(self, foods: Vec<Food>) -> anyhow::Result<Meal> {
        Ok(Meal {
            id: self.id,
            member_id: self.member_id,
            meal_type: self.meal_type.parse()?,
            image_url: self.image_url,
            memo: self.memo,
            foods,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
