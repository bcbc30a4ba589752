//! Proxy definition registry
//!
//! Synthesized definitions are parked here under (loader, name) until the
//! loader is asked for that name. Loading consumes the entry.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::key::LoaderId;

/// Receives synthesized definitions ahead of loading
pub trait ProxyDefinitions: Send + Sync {
    /// Park `bytes` so that `loader` finds them when asked for `name`
    fn save_proxy_definition(&self, loader: LoaderId, name: &str, bytes: Vec<u8>);
}

/// Concurrent definition registry
pub struct DefinitionRegistry {
    pending: DashMap<(LoaderId, String), Vec<u8>, FxBuildHasher>,
}

impl DefinitionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pending: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Remove and return the definition parked for `loader` under `name`
    pub fn take_proxy_definition(&self, loader: LoaderId, name: &str) -> Option<Vec<u8>> {
        self.pending
            .remove(&(loader, name.to_string()))
            .map(|(_, bytes)| bytes)
    }

    /// Number of definitions not yet loaded
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyDefinitions for DefinitionRegistry {
    fn save_proxy_definition(&self, loader: LoaderId, name: &str, bytes: Vec<u8>) {
        trace!(%loader, name, len = bytes.len(), "saved proxy definition");
        self.pending.insert((loader, name.to_string()), bytes);
    }
}
