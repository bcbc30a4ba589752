//! Annotation metadata store
//!
//! One table per entity kind plus two for parameter annotations. A set is
//! built completely (ordered list and by-type index together) before it is
//! inserted, so the insert is the only point at which readers can see it.
//! Reads never synthesize and never fall back to an empty set: a key that
//! was not recorded is reported as [`AnnotationError::Unrecorded`].

use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use hotswap_classfile::{AnnotationsAttribute, ParameterAnnotationsAttribute};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, error, warn};

use crate::error::{AnnotationError, SynthesisError};
use crate::key::{ClassKey, ConstructorKey, FieldKey, MethodKey, ReflectiveKey};
use crate::loader::ClassLoader;
use crate::marker::{Annotation, MarkerType};
use crate::synth::ProxySynthesizer;

/// Annotations of one entity, in attribute order, indexed by marker type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
    by_type: FxHashMap<MarkerType, usize>,
}

impl AnnotationSet {
    /// Set with no annotations
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set; for a repeated marker type the later instance is the
    /// one returned by lookups
    pub fn from_annotations(annotations: Vec<Annotation>) -> Self {
        let mut by_type =
            FxHashMap::with_capacity_and_hasher(annotations.len(), FxBuildHasher::default());
        for (i, annotation) in annotations.iter().enumerate() {
            if by_type.insert(annotation.marker.clone(), i).is_some() {
                warn!(marker = %annotation.marker, "duplicate marker type, later instance wins");
            }
        }
        Self {
            annotations,
            by_type,
        }
    }

    /// Annotations in attribute order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotation of type `marker`
    pub fn get(&self, marker: &MarkerType) -> Option<&Annotation> {
        self.by_type.get(marker).map(|&i| &self.annotations[i])
    }

    /// Whether an annotation of type `marker` is present
    pub fn contains(&self, marker: &MarkerType) -> bool {
        self.by_type.contains_key(marker)
    }
}

impl Deref for AnnotationSet {
    type Target = [Annotation];

    fn deref(&self) -> &[Annotation] {
        &self.annotations
    }
}

/// Parameter annotations of one method or constructor, one set per position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterAnnotationSet {
    parameters: Vec<AnnotationSet>,
}

impl ParameterAnnotationSet {
    /// `count` positions, none annotated
    pub fn empty(count: usize) -> Self {
        Self {
            parameters: vec![AnnotationSet::empty(); count],
        }
    }

    /// Build from per-position annotation lists
    pub fn from_parameters(parameters: Vec<Vec<Annotation>>) -> Self {
        Self {
            parameters: parameters
                .into_iter()
                .map(AnnotationSet::from_annotations)
                .collect(),
        }
    }

    /// Set for the parameter at `position`
    pub fn parameter(&self, position: usize) -> Option<&AnnotationSet> {
        self.parameters.get(position)
    }
}

impl Deref for ParameterAnnotationSet {
    type Target = [AnnotationSet];

    fn deref(&self) -> &[AnnotationSet] {
        &self.parameters
    }
}

/// A concurrent map whose values are published whole
struct Table<K, V> {
    entries: DashMap<K, Arc<V>, FxBuildHasher>,
}

impl<K: Eq + Hash, V> Table<K, V> {
    fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Insert a finished value; returns true if it replaced one
    fn publish(&self, key: K, value: V) -> bool {
        self.entries.insert(key, Arc::new(value)).is_some()
    }

    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn lookup<K, V>(table: &Table<K, V>, key: K) -> Result<Arc<V>, AnnotationError>
where
    K: Copy + Eq + Hash + Into<ReflectiveKey>,
{
    table
        .get(&key)
        .ok_or_else(|| AnnotationError::Unrecorded(key.into()))
}

/// Recorded annotation metadata for classes, fields, methods, constructors
/// and parameters
pub struct AnnotationDataStore {
    synthesizer: ProxySynthesizer,
    classes: Table<ClassKey, AnnotationSet>,
    fields: Table<FieldKey, AnnotationSet>,
    methods: Table<MethodKey, AnnotationSet>,
    constructors: Table<ConstructorKey, AnnotationSet>,
    method_parameters: Table<MethodKey, ParameterAnnotationSet>,
    constructor_parameters: Table<ConstructorKey, ParameterAnnotationSet>,
}

impl AnnotationDataStore {
    /// Create an empty store that synthesizes through `synthesizer`
    pub fn new(synthesizer: ProxySynthesizer) -> Self {
        Self {
            synthesizer,
            classes: Table::new(),
            fields: Table::new(),
            methods: Table::new(),
            constructors: Table::new(),
            method_parameters: Table::new(),
            constructor_parameters: Table::new(),
        }
    }

    /// The synthesizer in use
    pub fn synthesizer(&self) -> &ProxySynthesizer {
        &self.synthesizer
    }

    /// Total number of recorded keys across all tables
    pub fn recorded_count(&self) -> usize {
        self.classes.len()
            + self.fields.len()
            + self.methods.len()
            + self.constructors.len()
            + self.method_parameters.len()
            + self.constructor_parameters.len()
    }

    fn synthesis_failed(key: ReflectiveKey, source: SynthesisError) -> AnnotationError {
        error!(%key, error = %source, "annotation synthesis failed, key left unrecorded");
        AnnotationError::Synthesis { key, source }
    }

    fn build_set(
        &self,
        key: ReflectiveKey,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<AnnotationSet, AnnotationError> {
        // Most members carry no markers; those never reach the synthesizer
        let Some(attribute) = attribute.filter(|a| !a.is_empty()) else {
            return Ok(AnnotationSet::empty());
        };
        let class = self
            .synthesizer
            .synthesize(loader, attribute)
            .map_err(|source| Self::synthesis_failed(key, source))?;
        Ok(AnnotationSet::from_annotations(class.annotations().to_vec()))
    }

    fn record_into<K>(
        &self,
        table: &Table<K, AnnotationSet>,
        key: K,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<(), AnnotationError>
    where
        K: Copy + Eq + Hash + Into<ReflectiveKey>,
    {
        let reflective = key.into();
        let set = self.build_set(reflective, loader, attribute)?;
        let markers = set.len();
        let replaced = table.publish(key, set);
        debug!(key = %reflective, markers, replaced, "recorded annotations");
        Ok(())
    }

    fn record_parameters_into<K>(
        &self,
        table: &Table<K, ParameterAnnotationSet>,
        key: K,
        loader: &dyn ClassLoader,
        parameter_count: usize,
        attribute: Option<&ParameterAnnotationsAttribute>,
    ) -> Result<(), AnnotationError>
    where
        K: Copy + Eq + Hash + Into<ReflectiveKey>,
    {
        let reflective = key.into();
        let set = match attribute {
            Some(attr) if attr.parameter_count() != parameter_count => {
                return Err(AnnotationError::ParameterCountMismatch {
                    key: reflective,
                    declared: parameter_count,
                    recorded: attr.parameter_count(),
                });
            }
            Some(attr) if attr.parameters.iter().any(|p| !p.is_empty()) => {
                let parameters = self
                    .synthesizer
                    .synthesize_parameters(loader, attr)
                    .map_err(|source| Self::synthesis_failed(reflective, source))?;
                if parameters.len() != parameter_count {
                    return Err(AnnotationError::ParameterCountMismatch {
                        key: reflective,
                        declared: parameter_count,
                        recorded: parameters.len(),
                    });
                }
                ParameterAnnotationSet::from_parameters(parameters)
            }
            _ => ParameterAnnotationSet::empty(parameter_count),
        };
        let replaced = table.publish(key, set);
        debug!(key = %reflective, parameters = parameter_count, replaced, "recorded parameter annotations");
        Ok(())
    }

    // Classes

    /// Record the class-level attribute of `key`; `None` if it had none
    pub fn record_class_annotations(
        &self,
        key: ClassKey,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_into(&self.classes, key, loader, attribute)
    }

    /// Whether `key` has been recorded
    pub fn is_class_data_recorded(&self, key: ClassKey) -> bool {
        self.classes.contains(&key)
    }

    /// Recorded class annotations
    pub fn get_class_annotations(&self, key: ClassKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        lookup(&self.classes, key)
    }

    /// Recorded class annotation of type `marker`
    pub fn get_class_annotation(
        &self,
        key: ClassKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        Ok(lookup(&self.classes, key)?.get(marker).cloned())
    }

    /// Whether the recorded class annotations include `marker`
    pub fn is_class_annotation_present(
        &self,
        key: ClassKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        Ok(lookup(&self.classes, key)?.contains(marker))
    }

    // Fields

    /// Record the attribute of field `key`
    pub fn record_field_annotations(
        &self,
        key: FieldKey,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_into(&self.fields, key, loader, attribute)
    }

    /// Whether `key` has been recorded
    pub fn is_field_data_recorded(&self, key: FieldKey) -> bool {
        self.fields.contains(&key)
    }

    /// Recorded field annotations
    pub fn get_field_annotations(&self, key: FieldKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        lookup(&self.fields, key)
    }

    /// Recorded field annotation of type `marker`
    pub fn get_field_annotation(
        &self,
        key: FieldKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        Ok(lookup(&self.fields, key)?.get(marker).cloned())
    }

    /// Whether the recorded field annotations include `marker`
    pub fn is_field_annotation_present(
        &self,
        key: FieldKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        Ok(lookup(&self.fields, key)?.contains(marker))
    }

    // Methods

    /// Record the attribute of method `key`
    pub fn record_method_annotations(
        &self,
        key: MethodKey,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_into(&self.methods, key, loader, attribute)
    }

    /// Whether `key` has been recorded
    pub fn is_method_data_recorded(&self, key: MethodKey) -> bool {
        self.methods.contains(&key)
    }

    /// Recorded method annotations
    pub fn get_method_annotations(&self, key: MethodKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        lookup(&self.methods, key)
    }

    /// Recorded method annotation of type `marker`
    pub fn get_method_annotation(
        &self,
        key: MethodKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        Ok(lookup(&self.methods, key)?.get(marker).cloned())
    }

    /// Whether the recorded method annotations include `marker`
    pub fn is_method_annotation_present(
        &self,
        key: MethodKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        Ok(lookup(&self.methods, key)?.contains(marker))
    }

    // Constructors

    /// Record the attribute of constructor `key`
    pub fn record_constructor_annotations(
        &self,
        key: ConstructorKey,
        loader: &dyn ClassLoader,
        attribute: Option<&AnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_into(&self.constructors, key, loader, attribute)
    }

    /// Whether `key` has been recorded
    pub fn is_constructor_data_recorded(&self, key: ConstructorKey) -> bool {
        self.constructors.contains(&key)
    }

    /// Recorded constructor annotations
    pub fn get_constructor_annotations(
        &self,
        key: ConstructorKey,
    ) -> Result<Arc<AnnotationSet>, AnnotationError> {
        lookup(&self.constructors, key)
    }

    /// Recorded constructor annotation of type `marker`
    pub fn get_constructor_annotation(
        &self,
        key: ConstructorKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        Ok(lookup(&self.constructors, key)?.get(marker).cloned())
    }

    /// Whether the recorded constructor annotations include `marker`
    pub fn is_constructor_annotation_present(
        &self,
        key: ConstructorKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        Ok(lookup(&self.constructors, key)?.contains(marker))
    }

    // Parameters

    /// Record the parameter attribute of method `key`, which declares
    /// `parameter_count` parameters
    pub fn record_method_parameter_annotations(
        &self,
        key: MethodKey,
        loader: &dyn ClassLoader,
        parameter_count: usize,
        attribute: Option<&ParameterAnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_parameters_into(&self.method_parameters, key, loader, parameter_count, attribute)
    }

    /// Whether parameters of `key` have been recorded
    pub fn is_method_parameter_data_recorded(&self, key: MethodKey) -> bool {
        self.method_parameters.contains(&key)
    }

    /// Recorded parameter annotations of method `key`
    pub fn get_method_parameter_annotations(
        &self,
        key: MethodKey,
    ) -> Result<Arc<ParameterAnnotationSet>, AnnotationError> {
        lookup(&self.method_parameters, key)
    }

    /// Record the parameter attribute of constructor `key`
    pub fn record_constructor_parameter_annotations(
        &self,
        key: ConstructorKey,
        loader: &dyn ClassLoader,
        parameter_count: usize,
        attribute: Option<&ParameterAnnotationsAttribute>,
    ) -> Result<(), AnnotationError> {
        self.record_parameters_into(
            &self.constructor_parameters,
            key,
            loader,
            parameter_count,
            attribute,
        )
    }

    /// Whether parameters of `key` have been recorded
    pub fn is_constructor_parameter_data_recorded(&self, key: ConstructorKey) -> bool {
        self.constructor_parameters.contains(&key)
    }

    /// Recorded parameter annotations of constructor `key`
    pub fn get_constructor_parameter_annotations(
        &self,
        key: ConstructorKey,
    ) -> Result<Arc<ParameterAnnotationSet>, AnnotationError> {
        lookup(&self.constructor_parameters, key)
    }
}

impl std::fmt::Debug for AnnotationDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationDataStore")
            .field("synthesizer", &self.synthesizer)
            .field("recorded", &self.recorded_count())
            .finish()
    }
}
