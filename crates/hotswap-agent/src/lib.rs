//! Annotation Metadata for Redefined Classes
//!
//! When a class is redefined in place, the runtime class object no longer
//! carries the annotations its original declaration had. This crate keeps
//! that pre-redefinition truth:
//!
//! - the transformation engine records each entity's annotation attribute
//!   once, at redefinition time ([`AnnotationDataStore`]);
//! - non-empty attributes are transcoded into a small proxy class, handed
//!   to the entity's class loader and materialized by the platform
//!   ([`ProxySynthesizer`]);
//! - reflective call sites read the recorded sets back through
//!   [`AnnotationQuery`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = Arc::new(DefinitionRegistry::new());
//! let service = AnnotationService::new(AgentConfig::default(), registry.clone())?;
//!
//! // At redefinition time
//! service.store().record_field_annotations(field, &loader, Some(&attribute))?;
//!
//! // Later, from any thread
//! let tag = service.query().get_field_annotation(field, &MarkerType::new("com.example.Tag"))?;
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod loader;
pub mod marker;
pub mod naming;
pub mod query;
pub mod registry;
pub mod service;
pub mod store;
pub mod synth;

pub use config::{AgentConfig, ConfigError};
pub use error::{AnnotationError, SynthesisError};
pub use key::{ClassKey, ConstructorKey, EntityId, FieldKey, LoaderId, MethodKey, ReflectiveKey};
pub use loader::{ClassLoader, LoadError, LoadedClass, LoadedMethod, MarkerResolution, RuntimeLoader};
pub use marker::{Annotation, MarkerDecl, MarkerType, Member, MemberDecl, MemberValue};
pub use naming::ProxyNamer;
pub use query::AnnotationQuery;
pub use registry::{DefinitionRegistry, ProxyDefinitions};
pub use service::AnnotationService;
pub use store::{AnnotationDataStore, AnnotationSet, ParameterAnnotationSet};
pub use synth::ProxySynthesizer;
