use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            other => anyhow::bail!("unknown gender {other:?}"),
        }
    }
}

impl ActivityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "SEDENTARY",
            ActivityLevel::Light => "LIGHT",
            ActivityLevel::Moderate => "MODERATE",
            ActivityLevel::Active => "ACTIVE",
            ActivityLevel::VeryActive => "VERY_ACTIVE",
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEDENTARY" => Ok(ActivityLevel::Sedentary),
            "LIGHT" => Ok(ActivityLevel::Light),
            "MODERATE" => Ok(ActivityLevel::Moderate),
            "ACTIVE" => Ok(ActivityLevel::Active),
            "VERY_ACTIVE" => Ok(ActivityLevel::VeryActive),
            other => anyhow::bail!("unknown activity level {other:?}"),
        }
    }
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role {other:?}"),
        }
    }
}

/// Member record as the rest of the crate sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub password_hash: String, // never leaves the service layer
    pub name: String,
    pub birth_at: Date,
    pub gender: Option<Gender>,
    pub height: f32,
    pub weight: f32,
    pub activity_level: ActivityLevel,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields of a member that does not have a row yet.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub email: String,
    pub nickname: String,
    pub password_hash: String,
    pub name: String,
    pub birth_at: Date,
    pub gender: Option<Gender>,
    pub height: f32,
    pub weight: f32,
    pub activity_level: ActivityLevel,
    pub profile_image_url: Option<String>,
    pub role: Role,
}

/// Raw `members` row; enum columns are stored as text.
#[derive(Debug, FromRow)]
pub struct MemberRow {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub password_hash: String,
    pub name: String,
    pub birth_at: Date,
    pub gender: Option<String>,
    pub height: f32,
    pub weight: f32,
    pub activity_level: String,
    pub profile_image_url: Option<String>,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<MemberRow> for Member {
    type Error = anyhow::Error;

    fn try_from(r: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            nickname: r.nickname,
            password_hash: r.password_hash,
            name: r.name,
            birth_at: r.birth_at,
            gender: r.gender.as_deref().map(str::parse).transpose()?,
            height: r.height,
            weight: r.weight,
            activity_level: r.activity_level.parse()?,
            profile_image_url: r.profile_image_url,
            role: r.role.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn enum_text_matches_wire_form() {
        for level in [
            ActivityLevel::Sedentary,
            ActivityLevel::Light,
            ActivityLevel::Moderate,
            ActivityLevel::Active,
            ActivityLevel::VeryActive,
        ] {
            let wire = serde_json::to_value(level).unwrap();
            assert_eq!(wire, level.as_str());
            assert_eq!(level.as_str().parse::<ActivityLevel>().unwrap(), level);
        }
        assert_eq!(serde_json::to_value(Gender::Female).unwrap(), "FEMALE");
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn row_with_bad_enum_text_is_rejected() {
        let row = MemberRow {
            id: 1,
            email: "a@b.io".into(),
            nickname: "a".into(),
            password_hash: "h".into(),
            name: "A".into(),
            birth_at: date!(1990 - 01 - 01),
            gender: None,
            height: 170.0,
            weight: 60.0,
            activity_level: "LAZY".into(),
            profile_image_url: None,
            role: "USER".into(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
        };
        let err = Member::try_from(row).unwrap_err();
        assert!(err.to_string().contains("LAZY"));
    }
}
