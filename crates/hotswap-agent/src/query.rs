//! Read-only entry point for reflective call sites

use std::sync::Arc;

use crate::error::AnnotationError;
use crate::key::{ClassKey, ConstructorKey, FieldKey, MethodKey};
use crate::marker::{Annotation, MarkerType};
use crate::store::{AnnotationDataStore, AnnotationSet, ParameterAnnotationSet};

/// Query facade over an [`AnnotationDataStore`]
#[derive(Debug, Clone)]
pub struct AnnotationQuery {
    store: Arc<AnnotationDataStore>,
}

impl AnnotationQuery {
    /// Wrap a store
    pub fn new(store: Arc<AnnotationDataStore>) -> Self {
        Self { store }
    }

    /// Whether annotations of class `key` have been recorded
    pub fn is_class_data_recorded(&self, key: ClassKey) -> bool {
        self.store.is_class_data_recorded(key)
    }

    /// Recorded annotations of class `key`
    pub fn get_class_annotations(&self, key: ClassKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        self.store.get_class_annotations(key)
    }

    /// The `marker` annotation of class `key`, if present
    pub fn get_class_annotation(
        &self,
        key: ClassKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        self.store.get_class_annotation(key, marker)
    }

    /// Whether class `key` carries `marker`
    pub fn is_class_annotation_present(
        &self,
        key: ClassKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        self.store.is_class_annotation_present(key, marker)
    }

    /// Whether annotations of field `key` have been recorded
    pub fn is_field_data_recorded(&self, key: FieldKey) -> bool {
        self.store.is_field_data_recorded(key)
    }

    /// Recorded annotations of field `key`
    pub fn get_field_annotations(&self, key: FieldKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        self.store.get_field_annotations(key)
    }

    /// The `marker` annotation of field `key`, if present
    pub fn get_field_annotation(
        &self,
        key: FieldKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        self.store.get_field_annotation(key, marker)
    }

    /// Whether field `key` carries `marker`
    pub fn is_field_annotation_present(
        &self,
        key: FieldKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        self.store.is_field_annotation_present(key, marker)
    }

    /// Whether annotations of method `key` have been recorded
    pub fn is_method_data_recorded(&self, key: MethodKey) -> bool {
        self.store.is_method_data_recorded(key)
    }

    /// Recorded annotations of method `key`
    pub fn get_method_annotations(&self, key: MethodKey) -> Result<Arc<AnnotationSet>, AnnotationError> {
        self.store.get_method_annotations(key)
    }

    /// The `marker` annotation of method `key`, if present
    pub fn get_method_annotation(
        &self,
        key: MethodKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        self.store.get_method_annotation(key, marker)
    }

    /// Whether method `key` carries `marker`
    pub fn is_method_annotation_present(
        &self,
        key: MethodKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        self.store.is_method_annotation_present(key, marker)
    }

    /// Whether annotations of constructor `key` have been recorded
    pub fn is_constructor_data_recorded(&self, key: ConstructorKey) -> bool {
        self.store.is_constructor_data_recorded(key)
    }

    /// Recorded annotations of constructor `key`
    pub fn get_constructor_annotations(
        &self,
        key: ConstructorKey,
    ) -> Result<Arc<AnnotationSet>, AnnotationError> {
        self.store.get_constructor_annotations(key)
    }

    /// The `marker` annotation of constructor `key`, if present
    pub fn get_constructor_annotation(
        &self,
        key: ConstructorKey,
        marker: &MarkerType,
    ) -> Result<Option<Annotation>, AnnotationError> {
        self.store.get_constructor_annotation(key, marker)
    }

    /// Whether constructor `key` carries `marker`
    pub fn is_constructor_annotation_present(
        &self,
        key: ConstructorKey,
        marker: &MarkerType,
    ) -> Result<bool, AnnotationError> {
        self.store.is_constructor_annotation_present(key, marker)
    }

    /// Whether parameters of method `key` have been recorded
    pub fn is_method_parameter_data_recorded(&self, key: MethodKey) -> bool {
        self.store.is_method_parameter_data_recorded(key)
    }

    /// Recorded parameter annotations of method `key`
    pub fn get_method_parameter_annotations(
        &self,
        key: MethodKey,
    ) -> Result<Arc<ParameterAnnotationSet>, AnnotationError> {
        self.store.get_method_parameter_annotations(key)
    }

    /// Whether parameters of constructor `key` have been recorded
    pub fn is_constructor_parameter_data_recorded(&self, key: ConstructorKey) -> bool {
        self.store.is_constructor_parameter_data_recorded(key)
    }

    /// Recorded parameter annotations of constructor `key`
    pub fn get_constructor_parameter_annotations(
        &self,
        key: ConstructorKey,
    ) -> Result<Arc<ParameterAnnotationSet>, AnnotationError> {
        self.store.get_constructor_parameter_annotations(key)
    }
}
