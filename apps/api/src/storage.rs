//! Record persistence: write-once storage for completed screening records.
//!
//! `AppState` carries an `Arc<dyn RecordStore>`; the backend is picked from RECORD_STORE.
//! Only records of Completed sessions ever reach a store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::{RecordStoreConfig, S3Config};
use crate::errors::AppError;
use crate::screening::models::ScreeningRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("S3 upload failed: {0}")]
    S3(String),
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// "file" | "s3", for logs.
    fn backend(&self) -> &'static str;

    /// Persists `record` and returns the key it was stored under. Never overwrites.
    async fn store(&self, record: &ScreeningRecord) -> Result<String, StorageError>;
}

pub async fn build_record_store(config: &RecordStoreConfig) -> Arc<dyn RecordStore> {
    match config {
        RecordStoreConfig::File { data_dir } => Arc::new(FileRecordStore::new(data_dir.clone())),
        RecordStoreConfig::S3(s3) => Arc::new(S3RecordStore::new(s3).await),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FileRecordStore
// ────────────────────────────────────────────────────────────────────────────

/// One pretty-printed JSON file per record under `data_dir`.
pub struct FileRecordStore {
    data_dir: PathBuf,
}

impl FileRecordStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn store(&self, record: &ScreeningRecord) -> Result<String, StorageError> {
        let io_err = |path: &PathBuf| {
            let path = path.clone();
            move |source| StorageError::Io { path, source }
        };

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(io_err(&self.data_dir))?;

        let key = record.storage_key();
        let path = self.data_dir.join(&key);
        let body = serde_json::to_vec_pretty(record)?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key))
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        file.write_all(&body).await.map_err(io_err(&path))?;
        file.flush().await.map_err(io_err(&path))?;

        info!("Saved screening record to {}", path.display());
        Ok(key)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// S3RecordStore
// ────────────────────────────────────────────────────────────────────────────

/// Uploads records to `s3://<bucket>/screenings/<key>` (MinIO locally, AWS in production).
pub struct S3RecordStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3RecordStore {
    pub async fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "screener-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        Self {
            client: aws_sdk_s3::Client::new(&s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl RecordStore for S3RecordStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn store(&self, record: &ScreeningRecord) -> Result<String, StorageError> {
        let key = format!("screenings/{}", record.storage_key());
        let body = serde_json::to_vec_pretty(record)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        info!("Uploaded screening record to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::screening::models::{Question, ScoreResult, ScreeningRequest};

    fn record() -> ScreeningRecord {
        let results = (1..=3)
            .map(|i| ScoreResult {
                question: Question {
                    index: i,
                    text: format!("Question {i}?"),
                },
                answer: format!("Answer {i}"),
                score: (i * 3) as u8,
                explanation: format!("Explanation {i}"),
            })
            .collect();
        ScreeningRecord {
            request: ScreeningRequest {
                job_description: "Backend engineer, Go experience".to_string(),
                resume_text: "5 years Go, distributed systems".to_string(),
            },
            results,
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_file_store_writes_readable_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().join("data"));
        let original = record();

        let key = store.store(&original).await.unwrap();
        assert_eq!(key, "screening_20261018_120000_000000.json");

        let json = std::fs::read_to_string(dir.path().join("data").join(&key)).unwrap();
        let reread: ScreeningRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(reread, original);
        assert_eq!(reread.results.len(), 3);
        assert_eq!(reread.results[2].question.text, "Question 3?");
    }

    #[tokio::test]
    async fn test_file_store_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(dir.path().to_path_buf());
        let original = record();

        store.store(&original).await.unwrap();
        let err = store.store(&original).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[test]
    fn test_storage_error_maps_to_app_error() {
        let err: AppError = StorageError::AlreadyExists("k".to_string()).into();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
