//! LoRA adapter registry: the set of loaded adapters plus per-adapter
//! running-reference counts.
//!
//! Ref counts are touched concurrently by the worker pool (incref on
//! dispatch, decref after emit), so both maps are concurrent; no external
//! locking.

use dashmap::DashMap;
use tracing::{debug, error, info};

use crate::config::LoraModule;

#[derive(Debug, Default)]
pub struct LoraRegistry {
    /// Adapters known to this instance, loaded at startup or via the API
    loaded: DashMap<String, LoraModule>,
    /// Per-adapter count of requests currently running against it.
    /// A name is present iff its count is at least 1.
    running: DashMap<String, i64>,
}

impl LoraRegistry {
    pub fn new(modules: &[LoraModule]) -> Self {
        let registry = Self::default();
        for module in modules {
            registry.load(module.clone());
        }
        registry
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Loaded adapter names, sorted for stable listings.
    pub fn list_loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn load(&self, module: LoraModule) {
        debug!(lora = %module.name, "Loading LoRA adapter");
        self.loaded.insert(module.name.clone(), module);
    }

    pub fn unload(&self, name: &str) {
        debug!(lora = %name, "Unloading LoRA adapter");
        self.loaded.remove(name);
    }

    /// Names of adapters with at least one running request, sorted.
    pub fn list_running(&self) -> Vec<String> {
        let mut names: Vec<String> = self.running.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn running_count(&self, name: &str) -> i64 {
        self.running.get(name).map(|count| *count).unwrap_or(0)
    }

    /// Bump the running count for an adapter a dispatched request uses.
    pub fn incref(&self, name: &str) {
        let mut count = self.running.entry(name.to_string()).or_insert(0);
        *count += 1;
        info!(lora = %name, count = *count, "LoRA reference counter increased");
    }

    /// Drop one running reference; the entry disappears when the count hits
    /// zero. A missing entry indicates a bookkeeping bug and is logged, not
    /// fatal.
    pub fn decref(&self, name: &str) {
        match self.running.entry(name.to_string()) {
            dashmap::Entry::Occupied(mut occupied) => {
                if *occupied.get() > 1 {
                    *occupied.get_mut() -= 1;
                    info!(lora = %name, count = *occupied.get(), "LoRA reference counter decreased");
                } else {
                    occupied.remove();
                    info!(lora = %name, "LoRA removed from the running set");
                }
            }
            dashmap::Entry::Vacant(_) => {
                error!(lora = %name, "LoRA reference counter missing on release");
            }
        }
    }
}
