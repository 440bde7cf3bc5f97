//! Application state for the multivec API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use multivec_tiles::{open_storage, MultivecConfig, TileFetcher, ZarrMultivecStore};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ServiceConfig;

/// A served tileset and the fetcher behind it.
pub struct Tileset {
    pub uid: String,
    pub name: String,
    pub fetcher: Arc<TileFetcher>,
}

/// Shared application state.
pub struct AppState {
    /// Tilesets by uid.
    tilesets: HashMap<String, Tileset>,

    /// Uids in configuration order, for listings.
    order: Vec<String>,

    /// Prometheus exporter handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Open every configured tileset.
    ///
    /// Stores are opened eagerly; metadata is resolved on first use.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let mut state = Self::empty();

        for entry in &config.tilesets {
            let storage = open_storage(&entry.store)
                .with_context(|| format!("Failed to open store for tileset {:?}", entry.uid))?;
            let backend = ZarrMultivecStore::new(storage, entry.multivec.clone());
            let fetcher = TileFetcher::new(Arc::new(backend), entry.multivec.clone());

            tracing::info!(
                uid = %entry.uid,
                location = %entry.store.location(),
                "Registered tileset"
            );
            state.insert(&entry.uid, entry.display_name(), Arc::new(fetcher));
        }

        Ok(state)
    }

    /// State with no tilesets.
    pub fn empty() -> Self {
        Self {
            tilesets: HashMap::new(),
            order: Vec::new(),
            prometheus: None,
        }
    }

    /// Register a tileset, replacing any previous one with the same uid.
    pub fn insert(&mut self, uid: &str, name: &str, fetcher: Arc<TileFetcher>) {
        if !self.tilesets.contains_key(uid) {
            self.order.push(uid.to_string());
        }
        self.tilesets.insert(
            uid.to_string(),
            Tileset {
                uid: uid.to_string(),
                name: name.to_string(),
                fetcher,
            },
        );
    }

    /// Builder form of [`insert`](Self::insert) for a backend with default settings.
    pub fn with_tileset(
        mut self,
        uid: &str,
        backend: Arc<dyn multivec_tiles::MultivecBackend>,
    ) -> Self {
        let fetcher = TileFetcher::new(backend, MultivecConfig::default());
        self.insert(uid, uid, Arc::new(fetcher));
        self
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn get(&self, uid: &str) -> Option<&Tileset> {
        self.tilesets.get(uid)
    }

    /// Tilesets in configuration order.
    pub fn tilesets(&self) -> impl Iterator<Item = &Tileset> {
        self.order.iter().filter_map(|uid| self.tilesets.get(uid))
    }

    pub fn len(&self) -> usize {
        self.tilesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }
}
