//! Class loaders
//!
//! The [`ClassLoader`] trait is the host's injection capability: given a
//! name, produce a defined class whose annotations have been materialized
//! by the platform. [`RuntimeLoader`] is the in-process platform used by
//! the agent's tools and tests. It defines classes from class-file bytes,
//! consults the definition registry before its parent, and materializes
//! annotations against the marker declarations it can see.

use std::sync::Arc;

use hotswap_classfile::{
    AnnotationInfo, ClassFile, CodecError, ConstantPool, DecodeError,
    ParameterAnnotationsAttribute,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::key::LoaderId;
use crate::marker::{Annotation, MarkerDecl, MarkerType, Member, MemberValue};
use crate::registry::DefinitionRegistry;

/// Class loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    /// Neither the registry, the cache nor a parent knows the name
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// An annotation names a marker type this loader cannot see
    #[error("Marker type {marker} used by {class} is not visible to the loader")]
    MarkerNotFound {
        /// Class being defined
        class: String,
        /// Unresolved marker
        marker: MarkerType,
    },

    /// Definition bytes did not decode
    #[error("Malformed definition for {name}: {source}")]
    Malformed {
        /// Requested or defined name
        name: String,
        /// Decode failure
        #[source]
        source: DecodeError,
    },

    /// Definition bytes declare a different class than requested
    #[error("Definition for {expected} declares {found}")]
    NameMismatch {
        /// Requested name
        expected: String,
        /// Name inside the definition
        found: String,
    },

    /// An attribute index did not resolve in the definition's pool
    #[error("Bad constant in {class}: {source}")]
    BadConstant {
        /// Class being defined
        class: String,
        /// Codec failure
        #[source]
        source: CodecError,
    },

    /// `define_class` for a name already defined by this loader
    #[error("Class already defined: {0}")]
    AlreadyDefined(String),
}

/// A class loader as seen by the agent
pub trait ClassLoader: Send + Sync {
    /// Loader identity
    fn id(&self) -> LoaderId;

    /// Load (defining if necessary) the class with internal name `name`
    fn load_class(&self, name: &str) -> Result<Arc<LoadedClass>, LoadError>;
}

/// A method of a loaded class
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMethod {
    /// Simple name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Materialized annotations, one entry per parameter position;
    /// empty when the method has no parameter annotations attribute
    pub parameter_annotations: Vec<Vec<Annotation>>,
}

/// A defined class
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedClass {
    name: String,
    loader: LoaderId,
    annotations: Vec<Annotation>,
    methods: Vec<LoadedMethod>,
}

impl LoadedClass {
    /// Internal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defining loader
    pub fn loader(&self) -> LoaderId {
        self.loader
    }

    /// Class-level annotations in attribute order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Class-level annotation of type `marker`
    pub fn annotation(&self, marker: &MarkerType) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.marker == marker)
    }

    /// Whether a class-level annotation of type `marker` is present
    pub fn is_annotation_present(&self, marker: &MarkerType) -> bool {
        self.annotation(marker).is_some()
    }

    /// Declared methods
    pub fn methods(&self) -> &[LoadedMethod] {
        &self.methods
    }

    /// First method named `name`
    pub fn method(&self, name: &str) -> Option<&LoadedMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// What to do with annotations whose marker type has no declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerResolution {
    /// Fail the definition
    #[default]
    Strict,
    /// Keep the annotation with the members it was written with
    Lenient,
}

/// In-process loader
pub struct RuntimeLoader {
    id: LoaderId,
    name: String,
    parent: Option<Arc<RuntimeLoader>>,
    definitions: Arc<DefinitionRegistry>,
    resolution: MarkerResolution,
    markers: RwLock<FxHashMap<MarkerType, MarkerDecl>>,
    classes: RwLock<FxHashMap<String, Arc<LoadedClass>>>,
}

impl RuntimeLoader {
    /// Create a root loader backed by `definitions`
    pub fn new(name: impl Into<String>, definitions: Arc<DefinitionRegistry>) -> Self {
        Self {
            id: LoaderId::next(),
            name: name.into(),
            parent: None,
            definitions,
            resolution: MarkerResolution::default(),
            markers: RwLock::new(FxHashMap::default()),
            classes: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create a child loader sharing the parent's registry
    pub fn with_parent(name: impl Into<String>, parent: Arc<RuntimeLoader>) -> Self {
        let mut loader = Self::new(name, Arc::clone(&parent.definitions));
        loader.resolution = parent.resolution;
        loader.parent = Some(parent);
        loader
    }

    /// Set the marker resolution mode
    pub fn with_resolution(mut self, resolution: MarkerResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Loader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make a marker type visible to this loader and its children
    pub fn declare_marker(&self, decl: MarkerDecl) {
        self.markers.write().insert(decl.marker.clone(), decl);
    }

    /// Find a marker declaration, self first, then parents
    pub fn find_marker(&self, marker: &MarkerType) -> Option<MarkerDecl> {
        if let Some(decl) = self.markers.read().get(marker) {
            return Some(decl.clone());
        }
        self.parent.as_ref().and_then(|p| p.find_marker(marker))
    }

    /// Whether this loader has defined `name` itself
    pub fn is_defined(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Names of the classes this loader has defined, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Define an ordinary class
    pub fn define_class(&self, bytes: &[u8]) -> Result<Arc<LoadedClass>, LoadError> {
        let class = Arc::new(self.materialize(None, bytes)?);
        let mut classes = self.classes.write();
        if classes.contains_key(class.name()) {
            return Err(LoadError::AlreadyDefined(class.name().to_string()));
        }
        classes.insert(class.name().to_string(), Arc::clone(&class));
        debug!(loader = %self.id, class = class.name(), "defined class");
        Ok(class)
    }

    /// Replace the definition of a class in place
    pub fn redefine_class(&self, bytes: &[u8]) -> Result<Arc<LoadedClass>, LoadError> {
        let class = Arc::new(self.materialize(None, bytes)?);
        let replaced = self
            .classes
            .write()
            .insert(class.name().to_string(), Arc::clone(&class))
            .is_some();
        debug!(loader = %self.id, class = class.name(), replaced, "redefined class");
        Ok(class)
    }

    fn materialize(&self, expected: Option<&str>, bytes: &[u8]) -> Result<LoadedClass, LoadError> {
        let display_name = || expected.unwrap_or("<unnamed>").to_string();
        let file = ClassFile::decode(bytes).map_err(|source| LoadError::Malformed {
            name: display_name(),
            source,
        })?;
        let name = file
            .name()
            .ok_or_else(|| LoadError::BadConstant {
                class: display_name(),
                source: CodecError::BadConstant {
                    index: file.this_class,
                    expected: "Class",
                },
            })?
            .to_string();
        if let Some(expected) = expected {
            if expected != name {
                return Err(LoadError::NameMismatch {
                    expected: expected.to_string(),
                    found: name,
                });
            }
        }

        let malformed = |source| LoadError::Malformed {
            name: name.clone(),
            source,
        };
        let annotations = match file.annotations().map_err(malformed)? {
            Some(attr) => self.materialize_all(&name, &attr.pool, &attr.annotations)?,
            None => Vec::new(),
        };

        let mut methods = Vec::with_capacity(file.methods.len());
        for method in &file.methods {
            let utf8 = |index| {
                file.pool
                    .utf8(index)
                    .map(str::to_string)
                    .ok_or_else(|| LoadError::BadConstant {
                        class: name.clone(),
                        source: CodecError::BadConstant {
                            index,
                            expected: "Utf8",
                        },
                    })
            };
            let method_name = utf8(method.name_index)?;
            let descriptor = utf8(method.descriptor_index)?;
            let attribute = method.attributes.iter().find(|a| {
                file.pool.utf8(a.name_index) == Some(ParameterAnnotationsAttribute::NAME)
            });
            let mut parameter_annotations = Vec::new();
            if let Some(attribute) = attribute {
                let parsed = ParameterAnnotationsAttribute::parse(file.pool.clone(), &attribute.info)
                    .map_err(malformed)?;
                for infos in &parsed.parameters {
                    parameter_annotations.push(self.materialize_all(&name, &parsed.pool, infos)?);
                }
            }
            methods.push(LoadedMethod {
                name: method_name,
                descriptor,
                parameter_annotations,
            });
        }

        Ok(LoadedClass {
            name,
            loader: self.id,
            annotations,
            methods,
        })
    }

    fn materialize_all(
        &self,
        class: &str,
        pool: &ConstantPool,
        infos: &[AnnotationInfo],
    ) -> Result<Vec<Annotation>, LoadError> {
        infos
            .iter()
            .map(|info| {
                let raw = Annotation::from_info(pool, info).map_err(|source| {
                    LoadError::BadConstant {
                        class: class.to_string(),
                        source,
                    }
                })?;
                self.resolve(class, raw)
            })
            .collect()
    }

    /// Apply the marker declaration: members in declared order, defaults
    /// for those not written, undeclared members dropped
    fn resolve(&self, class: &str, annotation: Annotation) -> Result<Annotation, LoadError> {
        let Annotation { marker, members } = annotation;
        let members = members
            .into_iter()
            .map(|m| {
                Ok(Member {
                    name: m.name,
                    value: self.resolve_value(class, m.value)?,
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        let Some(decl) = self.find_marker(&marker) else {
            return match self.resolution {
                MarkerResolution::Strict => Err(LoadError::MarkerNotFound {
                    class: class.to_string(),
                    marker,
                }),
                MarkerResolution::Lenient => Ok(Annotation { marker, members }),
            };
        };

        let mut ordered = Vec::with_capacity(decl.members.len());
        for declared in decl.members {
            let written = members
                .iter()
                .find(|m| m.name == declared.name)
                .map(|m| m.value.clone());
            if let Some(value) = written.or(declared.default) {
                ordered.push(Member {
                    name: declared.name,
                    value,
                });
            }
        }
        Ok(Annotation {
            marker,
            members: ordered,
        })
    }

    fn resolve_value(&self, class: &str, value: MemberValue) -> Result<MemberValue, LoadError> {
        Ok(match value {
            MemberValue::Annotation(nested) => {
                MemberValue::Annotation(Box::new(self.resolve(class, *nested)?))
            }
            MemberValue::Array(values) => MemberValue::Array(
                values
                    .into_iter()
                    .map(|v| self.resolve_value(class, v))
                    .collect::<Result<_, _>>()?,
            ),
            other => other,
        })
    }
}

impl ClassLoader for RuntimeLoader {
    fn id(&self) -> LoaderId {
        self.id
    }

    fn load_class(&self, name: &str) -> Result<Arc<LoadedClass>, LoadError> {
        if let Some(class) = self.classes.read().get(name) {
            return Ok(Arc::clone(class));
        }

        if let Some(bytes) = self.definitions.take_proxy_definition(self.id, name) {
            let class = Arc::new(self.materialize(Some(name), &bytes)?);
            debug!(loader = %self.id, class = name, "defined class from registry");
            let mut classes = self.classes.write();
            return Ok(Arc::clone(
                classes.entry(name.to_string()).or_insert(class),
            ));
        }

        match &self.parent {
            Some(parent) => parent.load_class(name),
            None => Err(LoadError::ClassNotFound(name.to_string())),
        }
    }
}

impl std::fmt::Debug for RuntimeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLoader")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("classes", &self.classes.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::annotations_attribute;
    use crate::registry::ProxyDefinitions;
    use hotswap_classfile::{build_annotation_proxy, ProxyOptions};

    fn tag(value: &str) -> Annotation {
        Annotation::new("com.example.Tag").with("value", MemberValue::String(value.to_string()))
    }

    fn proxy_bytes(name: &str, annotations: &[Annotation]) -> Vec<u8> {
        let attr = annotations_attribute(annotations).unwrap();
        build_annotation_proxy(name, &attr, ProxyOptions::default()).unwrap()
    }

    fn loader() -> RuntimeLoader {
        let loader = RuntimeLoader::new("app", Arc::new(DefinitionRegistry::new()));
        loader.declare_marker(MarkerDecl::new("com.example.Tag").member("value"));
        loader
    }

    #[test]
    fn test_define_materializes_annotations() {
        let loader = loader();
        let class = loader.define_class(&proxy_bytes("p/C$1", &[tag("1")])).unwrap();
        assert_eq!(class.name(), "p/C$1");
        assert_eq!(class.loader(), loader.id());
        assert_eq!(class.annotations(), &[tag("1")]);
        assert!(class.is_annotation_present(&MarkerType::new("com.example.Tag")));
        assert!(!class.is_annotation_present(&MarkerType::new("com.example.Other")));
    }

    #[test]
    fn test_registry_consulted_before_parent() {
        let registry = Arc::new(DefinitionRegistry::new());
        let parent = Arc::new(RuntimeLoader::new("boot", Arc::clone(&registry)));
        parent.declare_marker(MarkerDecl::new("com.example.Tag").member("value"));
        let child = RuntimeLoader::with_parent("app", Arc::clone(&parent));

        registry.save_proxy_definition(child.id(), "p/R$1", proxy_bytes("p/R$1", &[tag("x")]));
        let class = child.load_class("p/R$1").unwrap();
        assert_eq!(class.loader(), child.id());
        // Marker declared by the parent resolves for the child
        assert_eq!(class.annotations(), &[tag("x")]);
        assert!(!parent.is_defined("p/R$1"));
        assert_eq!(registry.pending_count(), 0);

        // Second load comes from the cache
        let again = child.load_class("p/R$1").unwrap();
        assert!(Arc::ptr_eq(&class, &again));
    }

    #[test]
    fn test_parent_delegation_and_not_found() {
        let parent = Arc::new(loader());
        parent.define_class(&proxy_bytes("p/Shared", &[])).unwrap();
        let child = RuntimeLoader::with_parent("app", Arc::clone(&parent));

        assert_eq!(child.load_class("p/Shared").unwrap().loader(), parent.id());
        assert!(matches!(
            child.load_class("p/Missing"),
            Err(LoadError::ClassNotFound(name)) if name == "p/Missing"
        ));
    }

    #[test]
    fn test_unknown_marker_strict_and_lenient() {
        let other = Annotation::new("com.example.Unknown").with("n", MemberValue::Int(1));
        let bytes = proxy_bytes("p/U$1", &[other.clone()]);

        let strict = loader();
        assert!(matches!(
            strict.define_class(&bytes),
            Err(LoadError::MarkerNotFound { marker, .. }) if marker.as_str() == "com.example.Unknown"
        ));
        assert!(!strict.is_defined("p/U$1"));

        let lenient = loader().with_resolution(MarkerResolution::Lenient);
        let class = lenient.define_class(&bytes).unwrap();
        assert_eq!(class.annotations(), &[other]);
    }

    #[test]
    fn test_defaults_fill_missing_members() {
        let loader = loader();
        loader.declare_marker(
            MarkerDecl::new("com.example.Range")
                .member("min")
                .member_with_default("max", MemberValue::Int(100)),
        );
        let written = Annotation::new("com.example.Range")
            .with("ignored", MemberValue::Boolean(true))
            .with("min", MemberValue::Int(5));
        let class = loader.define_class(&proxy_bytes("p/D$1", &[written])).unwrap();

        let range = class.annotation(&MarkerType::new("com.example.Range")).unwrap();
        assert_eq!(
            range,
            &Annotation::new("com.example.Range")
                .with("min", MemberValue::Int(5))
                .with("max", MemberValue::Int(100))
        );
    }

    #[test]
    fn test_define_twice_and_redefine() {
        let loader = loader();
        loader.define_class(&proxy_bytes("p/V", &[tag("old")])).unwrap();
        assert!(matches!(
            loader.define_class(&proxy_bytes("p/V", &[])),
            Err(LoadError::AlreadyDefined(_))
        ));

        loader.redefine_class(&proxy_bytes("p/V", &[])).unwrap();
        assert!(loader.load_class("p/V").unwrap().annotations().is_empty());
    }

    #[test]
    fn test_registry_name_mismatch() {
        let loader = loader();
        loader
            .definitions
            .save_proxy_definition(loader.id(), "p/Want", proxy_bytes("p/Got", &[]));
        assert!(matches!(
            loader.load_class("p/Want"),
            Err(LoadError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_definition() {
        let loader = loader();
        loader
            .definitions
            .save_proxy_definition(loader.id(), "p/Bad", vec![0xCA, 0xFE]);
        assert!(matches!(
            loader.load_class("p/Bad"),
            Err(LoadError::Malformed { .. })
        ));
    }
}
