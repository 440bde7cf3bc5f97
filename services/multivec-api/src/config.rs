//! Tileset registry configuration loaded from YAML.

use anyhow::{bail, Context, Result};
use multivec_tiles::{MultivecConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Service configuration: the tilesets to serve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub tilesets: Vec<TilesetEntry>,
}

/// One multivec dataset exposed by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesetEntry {
    /// Identifier clients use in `d=` parameters. Must not contain `.`.
    pub uid: String,

    /// Human-readable name; defaults to the uid.
    #[serde(default)]
    pub name: Option<String>,

    /// Where the dataset lives.
    pub store: StoreConfig,

    /// Backend and fetcher settings.
    #[serde(default)]
    pub multivec: MultivecConfig,
}

impl TilesetEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uid)
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Tileset config {} does not exist, serving no tilesets",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let config =
            Self::from_yaml(&content).with_context(|| format!("Failed to parse: {:?}", path))?;

        tracing::info!(
            "Loaded {} tilesets from {:?}",
            config.tilesets.len(),
            path
        );
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that uids are usable in tile ids and that every entry is valid.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.tilesets {
            if entry.uid.is_empty() {
                bail!("tileset uid must not be empty");
            }
            if entry.uid.contains('.') {
                bail!("tileset uid {:?} must not contain '.'", entry.uid);
            }
            if !seen.insert(entry.uid.as_str()) {
                bail!("duplicate tileset uid {:?}", entry.uid);
            }
            entry
                .multivec
                .validate()
                .with_context(|| format!("invalid settings for tileset {:?}", entry.uid))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_config_parses() {
        let config = ServiceConfig::from_yaml(include_str!("../config/tilesets.yaml")).unwrap();

        assert_eq!(config.tilesets.len(), 3);
        assert_eq!(config.tilesets[0].uid, "sample-local");
        assert!(matches!(
            config.tilesets[0].store,
            StoreConfig::Filesystem { .. }
        ));
        assert_eq!(config.tilesets[1].multivec.array_cache_capacity, 64);
        assert_eq!(config.tilesets[1].multivec.metadata_key, ".zattrs");
        match &config.tilesets[2].store {
            StoreConfig::S3(s3) => assert_eq!(s3.prefix, "sample.multires.mv5.zarr"),
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_display_name_defaults_to_uid() {
        let config = ServiceConfig::from_yaml(
            "tilesets:\n  - uid: abc\n    store: { type: http, url: 'https://example.org/a.zarr' }\n",
        )
        .unwrap();
        assert_eq!(config.tilesets[0].display_name(), "abc");
    }

    #[test]
    fn test_rejects_duplicate_uid() {
        let yaml = r#"
tilesets:
  - uid: a
    store: { type: filesystem, path: /tmp/a }
  - uid: a
    store: { type: filesystem, path: /tmp/b }
"#;
        let err = ServiceConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_dotted_uid() {
        let yaml = "tilesets:\n  - uid: a.b\n    store: { type: filesystem, path: /tmp/a }\n";
        assert!(ServiceConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_invalid_multivec_settings() {
        let yaml = r#"
tilesets:
  - uid: a
    store: { type: filesystem, path: /tmp/a }
    multivec: { array_cache_capacity: 0 }
"#;
        let err = ServiceConfig::from_yaml(yaml).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("invalid settings for tileset \"a\""));
        assert!(message.contains("configuration error: array_cache_capacity must be > 0"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let config = ServiceConfig::load(Path::new("/nonexistent/tilesets.yaml")).unwrap();
        assert!(config.tilesets.is_empty());
    }
}
