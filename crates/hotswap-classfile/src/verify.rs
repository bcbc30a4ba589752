//! Class-file verification
//!
//! Structural checks only: every index must resolve to the kind of constant
//! its position requires, and annotation attributes must parse and reference
//! well-formed marker descriptors. Nothing here resolves marker types.

use crate::annotation::{
    constant_kind, AnnotationInfo, AnnotationsAttribute, ElementValue,
    ParameterAnnotationsAttribute,
};
use crate::classfile::{Attribute, ClassFile, MIN_ANNOTATION_MAJOR};
use crate::constants::{tag, Constant, ConstantPool};
use crate::descriptor::binary_from_descriptor;
use crate::encoder::DecodeError;
use std::sync::Arc;

/// Class-file verification errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VerifyError {
    /// Index does not point at a constant of the required kind
    #[error("Invalid constant pool reference #{index} for {context}: expected {expected}")]
    InvalidConstantRef {
        /// Offending index
        index: u16,
        /// Required constant kind
        expected: &'static str,
        /// Where the index appeared
        context: &'static str,
    },

    /// Marker type descriptor is not a reference type descriptor
    #[error("Invalid annotation type descriptor: {0}")]
    InvalidDescriptor(String),

    /// Element value tag is not valid in its position
    #[error("Invalid element value tag {0:?}")]
    InvalidElementTag(char),

    /// Annotation attribute body did not parse
    #[error("Malformed {name} attribute: {source}")]
    MalformedAttribute {
        /// Attribute name
        name: &'static str,
        /// Decode failure
        source: DecodeError,
    },

    /// Annotations present in a version that predates them
    #[error("Annotation attributes require major version {MIN_ANNOTATION_MAJOR}, found {0}")]
    UnsupportedVersion(u16),
}

/// Verify a decoded class
pub fn verify_class_file(class: &ClassFile) -> Result<(), VerifyError> {
    let pool = &class.pool;
    verify_pool(pool)?;

    expect_class(pool, class.this_class, "this_class")?;
    if class.super_class != 0 || class.name() != Some("java/lang/Object") {
        expect_class(pool, class.super_class, "super_class")?;
    }
    for &interface in &class.interfaces {
        expect_class(pool, interface, "interface")?;
    }

    verify_attributes(pool, class.major_version, &class.attributes)?;
    for member in class.fields.iter().chain(class.methods.iter()) {
        expect_utf8(pool, member.name_index, "member name")?;
        expect_utf8(pool, member.descriptor_index, "member descriptor")?;
        verify_attributes(pool, class.major_version, &member.attributes)?;
    }
    Ok(())
}

/// Internal references between pool entries
fn verify_pool(pool: &ConstantPool) -> Result<(), VerifyError> {
    for (_, constant) in pool.iter() {
        match constant {
            Constant::Class(name) => {
                expect_utf8(pool, *name, "class name")?;
            }
            Constant::String(utf8) => {
                expect_utf8(pool, *utf8, "string literal")?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn verify_attributes(
    pool: &Arc<ConstantPool>,
    major_version: u16,
    attributes: &[Attribute],
) -> Result<(), VerifyError> {
    for attribute in attributes {
        let name = expect_utf8(pool, attribute.name_index, "attribute name")?;
        if name == AnnotationsAttribute::NAME {
            check_version(major_version)?;
            let parsed = AnnotationsAttribute::parse(Arc::clone(pool), &attribute.info)
                .map_err(|source| VerifyError::MalformedAttribute {
                    name: AnnotationsAttribute::NAME,
                    source,
                })?;
            for annotation in &parsed.annotations {
                verify_annotation(pool, annotation)?;
            }
        } else if name == ParameterAnnotationsAttribute::NAME {
            check_version(major_version)?;
            let parsed = ParameterAnnotationsAttribute::parse(Arc::clone(pool), &attribute.info)
                .map_err(|source| VerifyError::MalformedAttribute {
                    name: ParameterAnnotationsAttribute::NAME,
                    source,
                })?;
            for annotation in parsed.parameters.iter().flatten() {
                verify_annotation(pool, annotation)?;
            }
        }
    }
    Ok(())
}

fn check_version(major_version: u16) -> Result<(), VerifyError> {
    if major_version < MIN_ANNOTATION_MAJOR {
        return Err(VerifyError::UnsupportedVersion(major_version));
    }
    Ok(())
}

fn verify_annotation(pool: &ConstantPool, annotation: &AnnotationInfo) -> Result<(), VerifyError> {
    let descriptor = expect_utf8(pool, annotation.type_index, "annotation type")?;
    if binary_from_descriptor(descriptor).is_none() {
        return Err(VerifyError::InvalidDescriptor(descriptor.to_string()));
    }
    for (name_index, value) in &annotation.members {
        expect_utf8(pool, *name_index, "member name")?;
        verify_element(pool, value)?;
    }
    Ok(())
}

fn verify_element(pool: &ConstantPool, value: &ElementValue) -> Result<(), VerifyError> {
    match value {
        ElementValue::Const { tag: element_tag, index } => {
            let kind = constant_kind(*element_tag)
                .ok_or(VerifyError::InvalidElementTag(*element_tag as char))?;
            let found = pool.get(*index).map(Constant::tag);
            if found != Some(kind) {
                return Err(VerifyError::InvalidConstantRef {
                    index: *index,
                    expected: kind_label(kind),
                    context: "constant element",
                });
            }
        }
        ElementValue::Enum {
            type_name_index,
            const_name_index,
        } => {
            expect_utf8(pool, *type_name_index, "enum type")?;
            expect_utf8(pool, *const_name_index, "enum constant")?;
        }
        ElementValue::Class { descriptor_index } => {
            expect_utf8(pool, *descriptor_index, "class literal")?;
        }
        ElementValue::Annotation(nested) => verify_annotation(pool, nested)?,
        ElementValue::Array(values) => {
            for value in values {
                verify_element(pool, value)?;
            }
        }
    }
    Ok(())
}

fn kind_label(pool_tag: u8) -> &'static str {
    match pool_tag {
        tag::INTEGER => "Integer",
        tag::FLOAT => "Float",
        tag::LONG => "Long",
        tag::DOUBLE => "Double",
        _ => "Utf8",
    }
}

fn expect_utf8<'p>(
    pool: &'p ConstantPool,
    index: u16,
    context: &'static str,
) -> Result<&'p str, VerifyError> {
    pool.utf8(index).ok_or(VerifyError::InvalidConstantRef {
        index,
        expected: "Utf8",
        context,
    })
}

fn expect_class(pool: &ConstantPool, index: u16, context: &'static str) -> Result<(), VerifyError> {
    match pool.get(index) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::InvalidConstantRef {
            index,
            expected: "Class",
            context,
        }),
    }
}
