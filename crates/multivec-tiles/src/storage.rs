//! Store construction for multivec datasets.
//!
//! A dataset can live on a local filesystem, behind a plain HTTP server, or
//! in an S3-compatible bucket. Remote stores are async `object_store` clients
//! wrapped in an async-to-sync adapter so the synchronous zarrs API can use
//! them.

use std::path::PathBuf;
use std::sync::Arc;

use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::http::HttpBuilder;
use object_store::prefix::PrefixStore;
use serde::{Deserialize, Serialize};
use zarrs::storage::ReadableStorage;
use zarrs_filesystem::FilesystemStore;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::error::{MultivecError, Result};

/// Blocking executor that works from within a tokio runtime.
///
/// `block_in_place` moves the current task off the async worker thread so
/// the runtime handle can drive the future without nesting runtimes. Store
/// reads already run under `spawn_blocking`, where this is a plain
/// `block_on`.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Endpoint URL (e.g., "http://minio:9000"); empty means AWS.
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use "us-east-1" for MinIO.
    pub region: String,
    pub allow_http: bool,
    /// Key prefix of the dataset root inside the bucket.
    pub prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "multivec".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
            prefix: String::new(),
        }
    }
}

impl S3Config {
    /// Create config from `S3_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("S3_ENDPOINT").unwrap_or(defaults.endpoint),
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: std::env::var("S3_ACCESS_KEY").unwrap_or(defaults.access_key_id),
            secret_access_key: std::env::var("S3_SECRET_KEY")
                .unwrap_or(defaults.secret_access_key),
            region: std::env::var("S3_REGION").unwrap_or(defaults.region),
            allow_http: std::env::var("S3_ALLOW_HTTP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.allow_http),
            prefix: std::env::var("S3_PREFIX").unwrap_or(defaults.prefix),
        }
    }
}

/// Where a multivec dataset lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Read-only HTTP(S) server rooted at `url`.
    Http { url: String },
    /// S3-compatible bucket.
    S3(S3Config),
    /// Local directory.
    Filesystem { path: PathBuf },
}

impl StoreConfig {
    /// Short human-readable location, used in logs.
    pub fn location(&self) -> String {
        match self {
            Self::Http { url } => url.clone(),
            Self::S3(s3) => format!("s3://{}/{}", s3.bucket, s3.prefix.trim_matches('/')),
            Self::Filesystem { path } => path.display().to_string(),
        }
    }
}

/// S3 store, scoped to the dataset prefix, wrapped for the synchronous zarrs API.
pub type S3Storage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<PrefixStore<AmazonS3>>, TokioBlockOn>;

/// HTTP store wrapped for the synchronous zarrs API.
pub type HttpStorage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<object_store::http::HttpStore>, TokioBlockOn>;

/// Create an S3-compatible store rooted at `config.prefix`.
pub fn create_s3_storage(config: &S3Config) -> Result<Arc<S3Storage>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_access_key_id(&config.access_key_id)
        .with_secret_access_key(&config.secret_access_key)
        .with_region(&config.region)
        .with_allow_http(config.allow_http);
    if !config.endpoint.is_empty() {
        builder = builder.with_endpoint(&config.endpoint);
    }

    let s3 = builder
        .build()
        .map_err(|e| MultivecError::storage(format!("Failed to create S3 client: {}", e)))?;

    let scoped = PrefixStore::new(s3, config.prefix.trim_matches('/'));
    let async_store = Arc::new(AsyncObjectStore::new(scoped));
    Ok(Arc::new(AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn)))
}

/// Create a read-only HTTP store rooted at `url`.
pub fn create_http_storage(url: &str) -> Result<Arc<HttpStorage>> {
    let http = HttpBuilder::new()
        .with_url(url.trim_end_matches('/'))
        .build()
        .map_err(|e| MultivecError::storage(format!("Failed to create HTTP client: {}", e)))?;

    let async_store = Arc::new(AsyncObjectStore::new(http));
    Ok(Arc::new(AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn)))
}

/// Open a local directory as a store.
pub fn create_filesystem_storage(path: impl Into<PathBuf>) -> Result<Arc<FilesystemStore>> {
    let path = path.into();
    let store = FilesystemStore::new(&path).map_err(|e| {
        MultivecError::storage(format!("Failed to open {}: {}", path.display(), e))
    })?;
    Ok(Arc::new(store))
}

/// Open the store described by `config`.
pub fn open_storage(config: &StoreConfig) -> Result<ReadableStorage> {
    tracing::debug!(location = %config.location(), "Opening multivec store");
    let storage: ReadableStorage = match config {
        StoreConfig::Http { url } => create_http_storage(url)?,
        StoreConfig::S3(s3) => create_s3_storage(s3)?,
        StoreConfig::Filesystem { path } => create_filesystem_storage(path.clone())?,
    };
    Ok(storage)
}
