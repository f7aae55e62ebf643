use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::members::repo_types::{Member, MemberRow, NewMember};

/// A write hit the unique index on email or nickname.
#[derive(Debug, Error)]
#[error("unique constraint violated: {0}")]
pub struct UniqueViolation(pub String);

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<UniqueViolation>().is_some()
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn insert(&self, new: NewMember) -> anyhow::Result<Member>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Member>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Member>>;
    async fn find_by_nickname(&self, nickname: &str) -> anyhow::Result<Option<Member>>;
    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool>;
    async fn exists_by_nickname(&self, nickname: &str) -> anyhow::Result<bool>;
    /// Writes every column of `member`; `None` if the row is gone.
    async fn update(&self, member: &Member) -> anyhow::Result<Option<Member>>;
    /// Removes the member; their meals go with them through the foreign key.
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
    /// Case-insensitive substring match on nickname or email.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<Member>>;
}

/// Escapes LIKE wildcards so the query is matched literally.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_write_err(e: sqlx::Error) -> anyhow::Error {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            UniqueViolation(db.constraint().unwrap_or("unique").to_string()).into()
        }
        _ => anyhow::Error::new(e),
    }
}

const MEMBER_COLUMNS: &str = "id, email, nickname, password_hash, name, birth_at, gender, \
     height, weight, activity_level, profile_image_url, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgMemberStore {
    db: PgPool,
}

impl PgMemberStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<Member>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE {column} = $1");
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find member by {column}"))?;
        row.map(Member::try_from).transpose()
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn insert(&self, new: NewMember) -> anyhow::Result<Member> {
        let sql = format!(
            r#"
            INSERT INTO members (email, nickname, password_hash, name, birth_at, gender,
                                 height, weight, activity_level, profile_image_url, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {MEMBER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(&new.email)
            .bind(&new.nickname)
            .bind(&new.password_hash)
            .bind(&new.name)
            .bind(new.birth_at)
            .bind(new.gender.map(|g| g.as_str()))
            .bind(new.height)
            .bind(new.weight)
            .bind(new.activity_level.as_str())
            .bind(&new.profile_image_url)
            .bind(new.role.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(map_write_err)?;
        Member::try_from(row)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Member>> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1");
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find member by id")?;
        row.map(Member::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Member>> {
        self.find_one("email", email).await
    }

    async fn find_by_nickname(&self, nickname: &str) -> anyhow::Result<Option<Member>> {
        self.find_one("nickname", nickname).await
    }

    async fn exists_by_email(&self, email: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.db)
                .await
                .context("exists by email")?;
        Ok(exists)
    }

    async fn exists_by_nickname(&self, nickname: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE nickname = $1)")
                .bind(nickname)
                .fetch_one(&self.db)
                .await
                .context("exists by nickname")?;
        Ok(exists)
    }

    async fn update(&self, m: &Member) -> anyhow::Result<Option<Member>> {
        let sql = format!(
            r#"
            UPDATE members
               SET email = $2, nickname = $3, password_hash = $4, name = $5, birth_at = $6,
                   gender = $7, height = $8, weight = $9, activity_level = $10,
                   profile_image_url = $11, role = $12, updated_at = $13
             WHERE id = $1
            RETURNING {MEMBER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(m.id)
            .bind(&m.email)
            .bind(&m.nickname)
            .bind(&m.password_hash)
            .bind(&m.name)
            .bind(m.birth_at)
            .bind(m.gender.map(|g| g.as_str()))
            .bind(m.height)
            .bind(m.weight)
            .bind(m.activity_level.as_str())
            .bind(&m.profile_image_url)
            .bind(m.role.as_str())
            .bind(m.updated_at)
            .fetch_optional(&self.db)
            .await
            .map_err(map_write_err)?;
        row.map(Member::try_from).transpose()
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete member")?;
        Ok(res.rows_affected() > 0)
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Member>> {
        let sql = format!(
            r#"
            SELECT {MEMBER_COLUMNS}
              FROM members
             WHERE nickname ILIKE $1 ESCAPE '\'
                OR email ILIKE $1 ESCAPE '\'
             ORDER BY id
            "#
        );
        let rows = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(like_pattern(query))
            .fetch_all(&self.db)
            .await
            .context("search members")?;
        rows.into_iter().map(Member::try_from).collect()
    }
}
