//! Annotation values
//!
//! Annotations are plain data: a marker type plus its member values in
//! declaration order. Conversions to and from the class-file attribute
//! model live here so that the loader and the tools share one mapping.

use std::fmt;
use std::sync::Arc;

use hotswap_classfile::annotation::element;
use hotswap_classfile::descriptor::{binary_from_descriptor, object_descriptor};
use hotswap_classfile::{
    AnnotationInfo, AnnotationsAttribute, CodecError, ConstantPool, ElementValue,
    ParameterAnnotationsAttribute,
};
use serde::{Deserialize, Serialize};

/// Binary name of a marker type, e.g. `com.example.Tag`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerType(String);

impl MarkerType {
    /// Create a marker type from its binary name
    pub fn new(binary_name: impl Into<String>) -> Self {
        MarkerType(binary_name.into())
    }

    /// Marker type named by a field descriptor such as `Lcom/example/Tag;`
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        binary_from_descriptor(descriptor).map(MarkerType)
    }

    /// Binary name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Field descriptor
    pub fn descriptor(&self) -> String {
        object_descriptor(&self.0)
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkerType {
    fn from(name: &str) -> Self {
        MarkerType::new(name)
    }
}

/// A member value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MemberValue {
    /// byte
    Byte(i8),
    /// char, as a UTF-16 code unit; lone surrogates are legal
    Char(u16),
    /// short
    Short(i16),
    /// int
    Int(i32),
    /// long
    Long(i64),
    /// float
    Float(f32),
    /// double
    Double(f64),
    /// boolean
    Boolean(bool),
    /// String
    String(String),
    /// Enum constant
    Enum {
        /// Binary name of the enum type
        type_name: String,
        /// Constant name
        constant: String,
    },
    /// Class literal: binary name for reference types, the raw descriptor
    /// for primitives, `void` and arrays
    Class(String),
    /// Nested annotation
    Annotation(Box<Annotation>),
    /// Array of values
    Array(Vec<MemberValue>),
}

fn is_raw_class_descriptor(name: &str) -> bool {
    name.starts_with('[') || (name.len() == 1 && "BCDFIJSZV".contains(name))
}

fn class_descriptor(name: &str) -> String {
    if is_raw_class_descriptor(name) {
        name.to_string()
    } else {
        object_descriptor(name)
    }
}

fn utf8(pool: &ConstantPool, index: u16) -> Result<&str, CodecError> {
    pool.utf8(index).ok_or(CodecError::BadConstant {
        index,
        expected: "Utf8",
    })
}

fn integer(pool: &ConstantPool, index: u16) -> Result<i32, CodecError> {
    pool.integer(index).ok_or(CodecError::BadConstant {
        index,
        expected: "Integer",
    })
}

impl MemberValue {
    /// String contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MemberValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// int contents; byte, short and char widen
    pub fn as_int(&self) -> Option<i32> {
        match self {
            MemberValue::Int(v) => Some(*v),
            MemberValue::Short(v) => Some(i32::from(*v)),
            MemberValue::Byte(v) => Some(i32::from(*v)),
            MemberValue::Char(c) => Some(i32::from(*c)),
            _ => None,
        }
    }

    /// long contents
    pub fn as_long(&self) -> Option<i64> {
        match self {
            MemberValue::Long(v) => Some(*v),
            other => other.as_int().map(i64::from),
        }
    }

    /// boolean contents
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MemberValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Class literal name
    pub fn as_class(&self) -> Option<&str> {
        match self {
            MemberValue::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[MemberValue]> {
        match self {
            MemberValue::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Nested annotation
    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            MemberValue::Annotation(a) => Some(a),
            _ => None,
        }
    }

    /// Write this value into `pool`
    pub fn to_element(&self, pool: &mut ConstantPool) -> Result<ElementValue, CodecError> {
        let constant = |tag: u8, index: u16| ElementValue::Const { tag, index };
        Ok(match self {
            MemberValue::Byte(v) => constant(element::BYTE, pool.add_integer(i32::from(*v))?),
            MemberValue::Char(c) => constant(element::CHAR, pool.add_integer(i32::from(*c))?),
            MemberValue::Short(v) => constant(element::SHORT, pool.add_integer(i32::from(*v))?),
            MemberValue::Int(v) => constant(element::INT, pool.add_integer(*v)?),
            MemberValue::Long(v) => constant(element::LONG, pool.add_long(*v)?),
            MemberValue::Float(v) => constant(element::FLOAT, pool.add_float(*v)?),
            MemberValue::Double(v) => constant(element::DOUBLE, pool.add_double(*v)?),
            MemberValue::Boolean(b) => constant(element::BOOLEAN, pool.add_integer(i32::from(*b))?),
            MemberValue::String(s) => constant(element::STRING, pool.add_utf8(s)?),
            MemberValue::Enum {
                type_name,
                constant,
            } => ElementValue::Enum {
                type_name_index: pool.add_utf8(&object_descriptor(type_name))?,
                const_name_index: pool.add_utf8(constant)?,
            },
            MemberValue::Class(name) => ElementValue::Class {
                descriptor_index: pool.add_utf8(&class_descriptor(name))?,
            },
            MemberValue::Annotation(nested) => ElementValue::Annotation(nested.to_info(pool)?),
            MemberValue::Array(values) => ElementValue::Array(
                values
                    .iter()
                    .map(|v| v.to_element(pool))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Read a value out of `pool`
    pub fn from_element(pool: &ConstantPool, value: &ElementValue) -> Result<Self, CodecError> {
        Ok(match value {
            ElementValue::Const { tag, index } => {
                let index = *index;
                let bad = |expected| CodecError::BadConstant { index, expected };
                match *tag {
                    element::BYTE => MemberValue::Byte(integer(pool, index)? as i8),
                    element::CHAR => MemberValue::Char(integer(pool, index)? as u16),
                    element::SHORT => MemberValue::Short(integer(pool, index)? as i16),
                    element::INT => MemberValue::Int(integer(pool, index)?),
                    element::BOOLEAN => MemberValue::Boolean(integer(pool, index)? != 0),
                    element::LONG => MemberValue::Long(pool.long(index).ok_or(bad("Long"))?),
                    element::FLOAT => MemberValue::Float(pool.float(index).ok_or(bad("Float"))?),
                    element::DOUBLE => {
                        MemberValue::Double(pool.double(index).ok_or(bad("Double"))?)
                    }
                    element::STRING => MemberValue::String(utf8(pool, index)?.to_string()),
                    other => return Err(CodecError::NotAConstantTag(other as char)),
                }
            }
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                let descriptor = utf8(pool, *type_name_index)?;
                MemberValue::Enum {
                    type_name: binary_from_descriptor(descriptor)
                        .unwrap_or_else(|| descriptor.to_string()),
                    constant: utf8(pool, *const_name_index)?.to_string(),
                }
            }
            ElementValue::Class { descriptor_index } => {
                let descriptor = utf8(pool, *descriptor_index)?;
                MemberValue::Class(
                    binary_from_descriptor(descriptor).unwrap_or_else(|| descriptor.to_string()),
                )
            }
            ElementValue::Annotation(info) => {
                MemberValue::Annotation(Box::new(Annotation::from_info(pool, info)?))
            }
            ElementValue::Array(values) => MemberValue::Array(
                values
                    .iter()
                    .map(|v| MemberValue::from_element(pool, v))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl fmt::Display for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberValue::Byte(v) => write!(f, "(byte){}", v),
            MemberValue::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(c) => write!(f, "'{}'", c.escape_default()),
                None => write!(f, "'\\u{:04X}'", c),
            },
            MemberValue::Short(v) => write!(f, "(short){}", v),
            MemberValue::Int(v) => write!(f, "{}", v),
            MemberValue::Long(v) => write!(f, "{}L", v),
            MemberValue::Float(v) => write!(f, "{}f", v),
            MemberValue::Double(v) => write!(f, "{}", v),
            MemberValue::Boolean(b) => write!(f, "{}", b),
            MemberValue::String(s) => write!(f, "\"{}\"", s.escape_default()),
            MemberValue::Enum {
                type_name,
                constant,
            } => write!(f, "{}.{}", type_name, constant),
            MemberValue::Class(name) => write!(f, "{}.class", name),
            MemberValue::Annotation(a) => write!(f, "{}", a),
            MemberValue::Array(values) => {
                f.write_str("{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// A named member value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Member name
    pub name: String,
    /// Value
    pub value: MemberValue,
}

/// An annotation instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Marker type
    pub marker: MarkerType,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Annotation {
    /// Annotation with no members
    pub fn new(marker: impl Into<MarkerType>) -> Self {
        Self {
            marker: marker.into(),
            members: Vec::new(),
        }
    }

    /// Append a member
    pub fn with(mut self, name: impl Into<String>, value: MemberValue) -> Self {
        self.members.push(Member {
            name: name.into(),
            value,
        });
        self
    }

    /// Look up a member by name
    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.value)
    }

    /// The conventional `value` member
    pub fn value(&self) -> Option<&MemberValue> {
        self.member("value")
    }

    /// Write this annotation into `pool`
    pub fn to_info(&self, pool: &mut ConstantPool) -> Result<AnnotationInfo, CodecError> {
        let mut info = AnnotationInfo::new(pool.add_utf8(&self.marker.descriptor())?);
        for member in &self.members {
            let name_index = pool.add_utf8(&member.name)?;
            info.members.push((name_index, member.value.to_element(pool)?));
        }
        Ok(info)
    }

    /// Read an annotation out of `pool`
    pub fn from_info(pool: &ConstantPool, info: &AnnotationInfo) -> Result<Self, CodecError> {
        let descriptor = utf8(pool, info.type_index)?;
        let marker = MarkerType::from_descriptor(descriptor).ok_or(CodecError::BadConstant {
            index: info.type_index,
            expected: "reference type descriptor",
        })?;
        let mut members = Vec::with_capacity(info.members.len());
        for (name_index, value) in &info.members {
            members.push(Member {
                name: utf8(pool, *name_index)?.to_string(),
                value: MemberValue::from_element(pool, value)?,
            });
        }
        Ok(Self { marker, members })
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.marker)?;
        if self.members.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", member.name, member.value)?;
        }
        f.write_str(")")
    }
}

/// Declared member of a marker type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDecl {
    /// Member name
    pub name: String,
    /// Default value, if the declaration has one
    #[serde(default)]
    pub default: Option<MemberValue>,
}

/// Declared shape of a marker type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDecl {
    /// Marker type
    pub marker: MarkerType,
    /// Members in declaration order
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

impl MarkerDecl {
    /// Declaration with no members
    pub fn new(marker: impl Into<MarkerType>) -> Self {
        Self {
            marker: marker.into(),
            members: Vec::new(),
        }
    }

    /// Declare a member without a default
    pub fn member(mut self, name: impl Into<String>) -> Self {
        self.members.push(MemberDecl {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare a member with a default
    pub fn member_with_default(mut self, name: impl Into<String>, default: MemberValue) -> Self {
        self.members.push(MemberDecl {
            name: name.into(),
            default: Some(default),
        });
        self
    }
}

/// Build a `RuntimeVisibleAnnotations` attribute holding `annotations`
pub fn annotations_attribute(annotations: &[Annotation]) -> Result<AnnotationsAttribute, CodecError> {
    let mut pool = ConstantPool::new();
    let infos = annotations
        .iter()
        .map(|a| a.to_info(&mut pool))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AnnotationsAttribute::new(Arc::new(pool), infos))
}

/// Build a `RuntimeVisibleParameterAnnotations` attribute, one entry per parameter
pub fn parameter_annotations_attribute(
    parameters: &[Vec<Annotation>],
) -> Result<ParameterAnnotationsAttribute, CodecError> {
    let mut pool = ConstantPool::new();
    let mut infos = Vec::with_capacity(parameters.len());
    for annotations in parameters {
        infos.push(
            annotations
                .iter()
                .map(|a| a.to_info(&mut pool))
                .collect::<Result<Vec<_>, _>>()?,
        );
    }
    Ok(ParameterAnnotationsAttribute::new(Arc::new(pool), infos))
}
