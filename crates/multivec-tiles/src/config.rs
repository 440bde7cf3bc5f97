//! Configuration for multivec tile fetching.

use serde::{Deserialize, Serialize};

use crate::error::{MultivecError, Result};

/// Configuration for the Zarr multivec backend and tile fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultivecConfig {
    /// Store key of the metadata document (relative to the store root).
    pub metadata_key: String,

    /// Group under which per-chromosome arrays live
    /// (`/{chromosome_root}/{chrom}/{resolution}`).
    pub chromosome_root: String,

    /// Number of opened array handles kept in the LRU cache.
    pub array_cache_capacity: usize,

    /// Resolve the metadata document once per fetcher instead of once per tile.
    pub memoize_metadata: bool,
}

impl Default for MultivecConfig {
    fn default() -> Self {
        Self {
            metadata_key: ".zattrs".to_string(),
            chromosome_root: "chromosomes".to_string(),
            array_cache_capacity: 256,
            memoize_metadata: true,
        }
    }
}

impl MultivecConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MULTIVEC_METADATA_KEY") {
            if !val.is_empty() {
                config.metadata_key = val;
            }
        }

        if let Ok(val) = std::env::var("MULTIVEC_CHROMOSOME_ROOT") {
            config.chromosome_root = val;
        }

        if let Ok(val) = std::env::var("MULTIVEC_ARRAY_CACHE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                config.array_cache_capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("MULTIVEC_MEMOIZE_METADATA") {
            config.memoize_metadata = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_key.trim().is_empty() {
            return Err(MultivecError::config("metadata_key must not be empty"));
        }

        if self.metadata_key.starts_with('/') {
            return Err(MultivecError::config(
                "metadata_key must be relative to the store root",
            ));
        }

        if self.array_cache_capacity == 0 {
            return Err(MultivecError::config("array_cache_capacity must be > 0"));
        }

        Ok(())
    }

    /// Storage path of the array holding `chrom` at `resolution`.
    pub fn array_path(&self, chrom: &str, resolution: u64) -> String {
        let root = self.chromosome_root.trim_matches('/');
        if root.is_empty() {
            format!("/{}/{}", chrom, resolution)
        } else {
            format!("/{}/{}/{}", root, chrom, resolution)
        }
    }
}
