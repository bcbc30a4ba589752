//! Metadata service
//!
//! Constructed once when the agent starts and passed by handle to the
//! transformation engine (which records) and to interception points
//! (which query). There is no global instance.

use std::sync::Arc;

use tracing::info;

use crate::config::{AgentConfig, ConfigError};
use crate::query::AnnotationQuery;
use crate::registry::ProxyDefinitions;
use crate::store::AnnotationDataStore;
use crate::synth::ProxySynthesizer;

/// Owns the store and hands out query facades
#[derive(Debug, Clone)]
pub struct AnnotationService {
    config: AgentConfig,
    store: Arc<AnnotationDataStore>,
}

impl AnnotationService {
    /// Validate `config` and build the service
    pub fn new(
        config: AgentConfig,
        definitions: Arc<dyn ProxyDefinitions>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let synthesizer = ProxySynthesizer::from_config(&config, definitions);
        info!(
            prefix = %config.proxy_prefix,
            major_version = config.class_major_version,
            verify = config.verify_proxies,
            "annotation metadata service started"
        );
        Ok(Self {
            config,
            store: Arc::new(AnnotationDataStore::new(synthesizer)),
        })
    }

    /// Configuration in effect
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Recording side
    pub fn store(&self) -> &Arc<AnnotationDataStore> {
        &self.store
    }

    /// A read-only facade over the store
    pub fn query(&self) -> AnnotationQuery {
        AnnotationQuery::new(Arc::clone(&self.store))
    }
}
