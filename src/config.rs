use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Where uploaded images end up.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageBackend {
    Local,
    S3(S3Config),
}

/// How `updated_at` is stamped when a meal is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpdatedAtPolicy {
    /// Supplied date at midnight, otherwise the current instant.
    SuppliedOrNow,
    /// Supplied date at midnight, otherwise today at midnight.
    StartOfDay,
}

impl FromStr for UpdatedAtPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "supplied-or-now" => Ok(Self::SuppliedOrNow),
            "start-of-day" => Ok(Self::StartOfDay),
            other => anyhow::bail!("unknown updated_at policy: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub cors_allowed_origin: String,
    pub upload_dir: String,
    pub image_url_prefix: String,
    pub max_upload_bytes: usize,
    pub storage: StorageBackend,
    pub meal_updated_at: UpdatedAtPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let storage = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .as_str()
        {
            "local" => StorageBackend::Local,
            "s3" => StorageBackend::S3(S3Config {
                endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
                bucket: std::env::var("MINIO_BUCKET").context("MINIO_BUCKET is not set")?,
                access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY is not set")?,
                secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY is not set")?,
                region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            other => anyhow::bail!("unknown STORAGE_BACKEND: {other}"),
        };

        let meal_updated_at = match std::env::var("MEAL_UPDATED_AT_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => UpdatedAtPolicy::SuppliedOrNow,
        };

        Ok(Self {
            database_url,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            cors_allowed_origin: std::env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            image_url_prefix: std::env::var("IMAGE_URL_PREFIX")
                .unwrap_or_else(|_| "/images".into()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(10 * 1024 * 1024),
            storage,
            meal_updated_at,
        })
    }
}
