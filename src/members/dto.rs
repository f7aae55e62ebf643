use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::members::repo_types::{ActivityLevel, Gender, Member, Role};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// JSON `data` part of the register / update multipart bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberForm {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub nickname: String,
    pub name: String,
    #[serde(with = "iso_date")]
    pub birth_at: Date,
    #[serde(default)]
    pub gender: Option<Gender>,
    pub height: f32,
    pub weight: f32,
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordQuery {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NicknameQuery {
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub name: String,
    #[serde(with = "iso_date")]
    pub birth_at: Date,
    pub gender: Option<Gender>,
    pub height: f32,
    pub weight: f32,
    pub activity_level: ActivityLevel,
    pub profile_image_url: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Member> for MemberResponse {
    fn from(m: Member) -> Self {
        Self {
            id: m.id,
            email: m.email,
            nickname: m.nickname,
            name: m.name,
            birth_at: m.birth_at,
            gender: m.gender,
            height: m.height,
            weight: m.weight,
            activity_level: m.activity_level,
            profile_image_url: m.profile_image_url,
            role: m.role,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn form_accepts_camel_case_json() {
        let form: MemberForm = serde_json::from_str(
            r#"{
                "email": "kim@example.com",
                "password": "pw",
                "nickname": "kim",
                "name": "Kim",
                "birthAt": "1995-04-12",
                "gender": "MALE",
                "height": 175.5,
                "weight": 70,
                "activityLevel": "VERY_ACTIVE"
            }"#,
        )
        .unwrap();
        assert_eq!(form.birth_at, date!(1995 - 04 - 12));
        assert_eq!(form.activity_level, ActivityLevel::VeryActive);
        assert_eq!(form.password.as_deref(), Some("pw"));
    }

    #[test]
    fn form_requires_activity_level() {
        let res = serde_json::from_str::<MemberForm>(
            r#"{"email":"a@b.io","nickname":"a","name":"A","birthAt":"2000-01-01","height":1,"weight":1}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn response_hides_password() {
        let member = Member {
            id: 7,
            email: "kim@example.com".into(),
            nickname: "kim".into(),
            password_hash: "$argon2id$secret".into(),
            name: "Kim".into(),
            birth_at: date!(1995 - 04 - 12),
            gender: None,
            height: 175.0,
            weight: 70.0,
            activity_level: ActivityLevel::Light,
            profile_image_url: Some("/images/profiles/x.png".into()),
            role: Role::User,
            created_at: datetime!(2024-05-01 10:00 UTC),
            updated_at: datetime!(2024-05-01 10:00 UTC),
        };
        let json = serde_json::to_value(MemberResponse::from(member)).unwrap();
        assert_eq!(json["birthAt"], "1995-04-12");
        assert_eq!(json["profileImageUrl"], "/images/profiles/x.png");
        assert_eq!(json["role"], "USER");
        assert!(!json.to_string().contains("argon2"));
    }
}
