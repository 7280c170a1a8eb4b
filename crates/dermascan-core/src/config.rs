//! Configuration module
//!
//! Storage, collaborator endpoints, retry policy and image processing
//! settings, loaded from the environment (and `.env` when present).

use std::env;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const DIAGNOSIS_MAX_ATTEMPTS: u32 = 3;
const DIAGNOSIS_RETRY_BASE_MS: u64 = 1000;
const DIAGNOSIS_TIMEOUT_SECS: u64 = 120;
const ANALYSIS_STAGE_PACING_MS: u64 = 4000;
const RESIZE_MAX_WIDTH: u32 = 1024;
const RESIZE_QUALITY: f32 = 0.85;
const MIN_QUALITY_SCORE: u8 = 60;

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    // Collaborator endpoints
    pub diagnosis_api_url: String,
    pub record_api_url: String,
    pub diagnosis_max_attempts: u32,
    pub diagnosis_retry_base_ms: u64,
    pub diagnosis_timeout_secs: u64,
    /// Interval between staged analysis milestones while the service call is in flight
    pub analysis_stage_pacing_ms: u64,
    // Derived asset generation
    pub resize_max_width: u32,
    pub resize_quality: f32,
    pub min_quality_score: u8,
    // Static session (CLI and service accounts)
    pub owner_id: Option<String>,
    pub access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            storage_backend: StorageBackend::Local,
            local_storage_path: Some("./data/media".to_string()),
            local_storage_base_url: Some("http://localhost:3000/media".to_string()),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            diagnosis_api_url: "http://localhost:8000".to_string(),
            record_api_url: "http://localhost:8001".to_string(),
            diagnosis_max_attempts: DIAGNOSIS_MAX_ATTEMPTS,
            diagnosis_retry_base_ms: DIAGNOSIS_RETRY_BASE_MS,
            diagnosis_timeout_secs: DIAGNOSIS_TIMEOUT_SECS,
            analysis_stage_pacing_ms: ANALYSIS_STAGE_PACING_MS,
            resize_max_width: RESIZE_MAX_WIDTH,
            resize_quality: RESIZE_QUALITY,
            min_quality_score: MIN_QUALITY_SCORE,
            owner_id: None,
            access_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let default = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => default.storage_backend,
        };

        let config = Self {
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or(default.environment),
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .ok()
                .or(default.local_storage_path),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .ok()
                .or(default.local_storage_base_url),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            diagnosis_api_url: env::var("DIAGNOSIS_API_URL").unwrap_or(default.diagnosis_api_url),
            record_api_url: env::var("RECORD_API_URL").unwrap_or(default.record_api_url),
            diagnosis_max_attempts: parse_env("DIAGNOSIS_MAX_ATTEMPTS", default.diagnosis_max_attempts)?,
            diagnosis_retry_base_ms: parse_env("DIAGNOSIS_RETRY_BASE_MS", default.diagnosis_retry_base_ms)?,
            diagnosis_timeout_secs: parse_env("DIAGNOSIS_TIMEOUT_SECS", default.diagnosis_timeout_secs)?,
            analysis_stage_pacing_ms: parse_env(
                "ANALYSIS_STAGE_PACING_MS",
                default.analysis_stage_pacing_ms,
            )?,
            resize_max_width: parse_env("RESIZE_MAX_WIDTH", default.resize_max_width)?,
            resize_quality: parse_env("RESIZE_QUALITY", default.resize_quality)?,
            min_quality_score: parse_env("MIN_QUALITY_SCORE", default.min_quality_score)?,
            owner_id: env::var("DERMASCAN_OWNER_ID").ok().filter(|s| !s.is_empty()),
            access_token: env::var("DERMASCAN_ACCESS_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.diagnosis_max_attempts == 0 {
            anyhow::bail!("DIAGNOSIS_MAX_ATTEMPTS must be at least 1");
        }
        if !(self.resize_quality > 0.0 && self.resize_quality <= 1.0) {
            anyhow::bail!(
                "RESIZE_QUALITY must be in (0, 1], got {}",
                self.resize_quality
            );
        }
        if self.resize_max_width == 0 {
            anyhow::bail!("RESIZE_MAX_WIDTH must be positive");
        }
        if self.min_quality_score > 100 {
            anyhow::bail!("MIN_QUALITY_SCORE must be within 0-100");
        }
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            anyhow::bail!("S3_BUCKET is required when STORAGE_BACKEND=s3");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}
