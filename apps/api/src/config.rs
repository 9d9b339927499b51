use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::errors::ScreeningError;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Which prompt/response contract the pipeline speaks with the generation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Best-effort parsing of free-form text.
    Text,
    /// Templates demand a small JSON payload; parsing is strict.
    Json,
}

/// Where completed screening records are written.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordStoreConfig {
    File { data_dir: PathBuf },
    S3(S3Config),
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if the generation credential is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub generation_timeout: Duration,
    pub generation_max_concurrency: usize,
    pub response_format: ResponseFormat,
    pub prompts_dir: Option<PathBuf>,
    pub record_store: RecordStoreConfig,
    /// How long a Completed/Failed session stays readable before eviction.
    pub session_retention: Duration,
    /// How long a live session may sit without requests before it is abandoned.
    pub session_idle_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = require_credential(&lookup, "GEMINI_API_KEY")?;

        let response_format = match lookup("RESPONSE_FORMAT").as_deref() {
            None | Some("text") => ResponseFormat::Text,
            Some("json") => ResponseFormat::Json,
            Some(other) => bail!("RESPONSE_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        let record_store = match lookup("RECORD_STORE").as_deref() {
            None | Some("file") => RecordStoreConfig::File {
                data_dir: PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            },
            Some("s3") => RecordStoreConfig::S3(S3Config {
                bucket: require_env(&lookup, "S3_BUCKET")?,
                endpoint: require_env(&lookup, "S3_ENDPOINT")?,
                access_key_id: require_credential(&lookup, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_credential(&lookup, "AWS_SECRET_ACCESS_KEY")?,
            }),
            Some(other) => bail!("RECORD_STORE must be 'file' or 's3', got '{other}'"),
        };

        let generation_timeout = positive_secs(&lookup, "GENERATION_TIMEOUT_SECS", 30)?;
        let session_retention = positive_secs(&lookup, "SESSION_RETENTION_SECS", 600)?;
        let session_idle_timeout = positive_secs(&lookup, "SESSION_IDLE_TIMEOUT_SECS", 3600)?;

        let generation_max_concurrency = lookup("GENERATION_MAX_CONCURRENCY")
            .unwrap_or_else(|| "4".to_string())
            .parse::<usize>()
            .context("GENERATION_MAX_CONCURRENCY must be a positive integer")?;
        if generation_max_concurrency == 0 {
            bail!("GENERATION_MAX_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            gemini_api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            generation_timeout,
            generation_max_concurrency,
            response_format,
            prompts_dir: lookup("PROMPTS_DIR").map(PathBuf::from),
            record_store,
            session_retention,
            session_idle_timeout,
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Parses a whole number of seconds, defaulting when unset. Zero is rejected.
fn positive_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds"))?,
        None => default,
    };
    if secs == 0 {
        bail!("{key} must be at least 1 second");
    }
    Ok(Duration::from_secs(secs))
}

/// Credentials get their own error kind so a missing key is distinguishable at startup.
fn require_credential<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ScreeningError::MissingCredential {
            var: key.to_string(),
        }
        .into()),
    }
}
