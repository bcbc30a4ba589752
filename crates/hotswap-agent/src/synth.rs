//! Proxy synthesis
//!
//! Turns an annotation attribute into a loaded proxy class: allocate a
//! unique name, build the definition, optionally verify it, park it in the
//! definition registry and ask the entity's loader for it. The loader then
//! materializes the annotations; nothing here interprets member values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hotswap_classfile::{
    build_annotation_proxy, build_parameter_proxy, verify_class_file, AnnotationsAttribute,
    ClassFile, ParameterAnnotationsAttribute, ProxyOptions,
};
use tracing::trace;

use crate::config::AgentConfig;
use crate::error::SynthesisError;
use crate::loader::{ClassLoader, LoadedClass};
use crate::marker::Annotation;
use crate::naming::ProxyNamer;
use crate::registry::ProxyDefinitions;

pub use hotswap_classfile::proxy::PARAMETER_METHOD;

/// Builds and loads proxy classes
pub struct ProxySynthesizer {
    namer: ProxyNamer,
    options: ProxyOptions,
    verify: bool,
    definitions: Arc<dyn ProxyDefinitions>,
    synthesized: AtomicU64,
}

impl ProxySynthesizer {
    /// Create a synthesizer that verifies what it builds
    pub fn new(namer: ProxyNamer, options: ProxyOptions, definitions: Arc<dyn ProxyDefinitions>) -> Self {
        Self {
            namer,
            options,
            verify: true,
            definitions,
            synthesized: AtomicU64::new(0),
        }
    }

    /// Create a synthesizer from agent configuration
    pub fn from_config(config: &AgentConfig, definitions: Arc<dyn ProxyDefinitions>) -> Self {
        let options = ProxyOptions {
            major_version: config.class_major_version,
        };
        Self::new(ProxyNamer::new(config.proxy_prefix.clone()), options, definitions)
            .with_verification(config.verify_proxies)
    }

    /// Enable or disable verification of built definitions
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Number of synthesis attempts so far
    pub fn synthesis_count(&self) -> u64 {
        self.synthesized.load(Ordering::Relaxed)
    }

    /// Load a proxy carrying `attribute` into `loader`
    pub fn synthesize(
        &self,
        loader: &dyn ClassLoader,
        attribute: &AnnotationsAttribute,
    ) -> Result<Arc<LoadedClass>, SynthesisError> {
        self.synthesized.fetch_add(1, Ordering::Relaxed);
        let name = self.namer.next_name();
        let bytes = build_annotation_proxy(&name, attribute, self.options)?;
        self.install(loader, name, bytes)
    }

    /// Load a parameter proxy carrying `attribute` into `loader` and
    /// return its materialized per-parameter annotations
    pub fn synthesize_parameters(
        &self,
        loader: &dyn ClassLoader,
        attribute: &ParameterAnnotationsAttribute,
    ) -> Result<Vec<Vec<Annotation>>, SynthesisError> {
        self.synthesized.fetch_add(1, Ordering::Relaxed);
        let name = self.namer.next_name();
        let bytes = build_parameter_proxy(&name, attribute, self.options)?;
        let class = self.install(loader, name, bytes)?;
        class
            .method(PARAMETER_METHOD)
            .map(|m| m.parameter_annotations.clone())
            .ok_or_else(|| SynthesisError::MissingParameterMethod(class.name().to_string()))
    }

    fn install(
        &self,
        loader: &dyn ClassLoader,
        name: String,
        bytes: Vec<u8>,
    ) -> Result<Arc<LoadedClass>, SynthesisError> {
        if self.verify {
            let decoded = ClassFile::decode(&bytes).map_err(|source| SynthesisError::Decode {
                name: name.clone(),
                source,
            })?;
            verify_class_file(&decoded).map_err(|source| SynthesisError::Verify {
                name: name.clone(),
                source,
            })?;
        }

        trace!(proxy = %name, loader = %loader.id(), len = bytes.len(), "installing proxy");
        self.definitions
            .save_proxy_definition(loader.id(), &name, bytes);
        loader
            .load_class(&name)
            .map_err(|source| SynthesisError::Load { name, source })
    }
}

impl std::fmt::Debug for ProxySynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySynthesizer")
            .field("namer", &self.namer)
            .field("options", &self.options)
            .field("verify", &self.verify)
            .field("synthesized", &self.synthesis_count())
            .finish()
    }
}
