//! Annotation attributes
//!
//! `RuntimeVisibleAnnotations` and `RuntimeVisibleParameterAnnotations`
//! bodies are sequences of constant-pool-relative structures. An attribute
//! is only meaningful together with the pool its indices point into, so the
//! parsed forms here keep a shared handle to that pool. Copying an attribute
//! into another class re-points every index into the destination pool.

use std::sync::Arc;

use thiserror::Error;

use crate::constants::{tag, ConstantPool};
use crate::encoder::{ClassReader, ClassWriter, DecodeError};

/// Errors raised while transcoding attributes between constant pools
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An index did not resolve to the expected kind of constant
    #[error("Constant #{index} is missing or is not a {expected} entry")]
    BadConstant {
        /// Offending index in the source pool
        index: u16,
        /// Kind of entry the element required
        expected: &'static str,
    },

    /// A constant element used a tag that is not a constant kind
    #[error("Element tag {0:?} does not denote a constant value")]
    NotAConstantTag(char),

    /// The destination pool is full
    #[error("Constant pool exceeds 65535 entries")]
    PoolOverflow,

    /// More parameters than the attribute format can express
    #[error("Too many parameters: {0} (max 255)")]
    TooManyParameters(usize),

    /// A string or count exceeds its u16 field
    #[error("{what} is too long: {len} (max 65535)")]
    TooLong {
        /// What was being written
        what: &'static str,
        /// Actual length
        len: usize,
    },

    /// Element values nested past [`MAX_NESTING_DEPTH`]
    #[error("Element values nested deeper than {}", MAX_NESTING_DEPTH)]
    NestingTooDeep,
}

/// Deepest element value nesting accepted when reading or writing
pub const MAX_NESTING_DEPTH: usize = 256;

/// Element value tags
pub mod element {
    /// byte
    pub const BYTE: u8 = b'B';
    /// char
    pub const CHAR: u8 = b'C';
    /// double
    pub const DOUBLE: u8 = b'D';
    /// float
    pub const FLOAT: u8 = b'F';
    /// int
    pub const INT: u8 = b'I';
    /// long
    pub const LONG: u8 = b'J';
    /// short
    pub const SHORT: u8 = b'S';
    /// boolean
    pub const BOOLEAN: u8 = b'Z';
    /// String
    pub const STRING: u8 = b's';
    /// enum constant
    pub const ENUM: u8 = b'e';
    /// class literal
    pub const CLASS: u8 = b'c';
    /// nested annotation
    pub const ANNOTATION: u8 = b'@';
    /// array
    pub const ARRAY: u8 = b'[';
}

/// Pool tag a constant element value must point at
pub fn constant_kind(element_tag: u8) -> Option<u8> {
    match element_tag {
        element::BYTE | element::CHAR | element::INT | element::SHORT | element::BOOLEAN => {
            Some(tag::INTEGER)
        }
        element::DOUBLE => Some(tag::DOUBLE),
        element::FLOAT => Some(tag::FLOAT),
        element::LONG => Some(tag::LONG),
        element::STRING => Some(tag::UTF8),
        _ => None,
    }
}

fn kind_name(pool_tag: u8) -> &'static str {
    match pool_tag {
        tag::UTF8 => "Utf8",
        tag::INTEGER => "Integer",
        tag::FLOAT => "Float",
        tag::LONG => "Long",
        tag::DOUBLE => "Double",
        tag::CLASS => "Class",
        tag::STRING => "String",
        _ => "unknown",
    }
}

/// Copy one constant from `src` to `dest`, returning its new index
fn copy_constant(
    src: &ConstantPool,
    dest: &mut ConstantPool,
    index: u16,
    pool_tag: u8,
) -> Result<u16, CodecError> {
    let bad = || CodecError::BadConstant {
        index,
        expected: kind_name(pool_tag),
    };
    match pool_tag {
        tag::UTF8 => dest.add_utf8(src.utf8(index).ok_or_else(bad)?),
        tag::INTEGER => dest.add_integer(src.integer(index).ok_or_else(bad)?),
        tag::FLOAT => dest.add_float(src.float(index).ok_or_else(bad)?),
        tag::LONG => dest.add_long(src.long(index).ok_or_else(bad)?),
        tag::DOUBLE => dest.add_double(src.double(index).ok_or_else(bad)?),
        _ => Err(bad()),
    }
}

/// An `element_value` structure
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant; `tag` is one of `B C D F I J S Z s`
    Const {
        /// Element tag
        tag: u8,
        /// Index of the constant
        index: u16,
    },
    /// Enum constant
    Enum {
        /// Utf8 field descriptor of the enum type
        type_name_index: u16,
        /// Utf8 simple name of the constant
        const_name_index: u16,
    },
    /// Class literal; the Utf8 entry holds a return descriptor
    Class {
        /// Utf8 descriptor index
        descriptor_index: u16,
    },
    /// Nested annotation
    Annotation(AnnotationInfo),
    /// Array of element values
    Array(Vec<ElementValue>),
}

impl ElementValue {
    /// Element tag as written in the attribute
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Const { tag, .. } => *tag,
            ElementValue::Enum { .. } => element::ENUM,
            ElementValue::Class { .. } => element::CLASS,
            ElementValue::Annotation(_) => element::ANNOTATION,
            ElementValue::Array(_) => element::ARRAY,
        }
    }

    fn encode(&self, writer: &mut ClassWriter, depth: usize) -> Result<(), CodecError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep);
        }
        writer.emit_u8(self.tag());
        match self {
            ElementValue::Const { index, .. } => writer.emit_u16(*index),
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                writer.emit_u16(*type_name_index);
                writer.emit_u16(*const_name_index);
            }
            ElementValue::Class { descriptor_index } => writer.emit_u16(*descriptor_index),
            ElementValue::Annotation(info) => info.encode(writer, depth + 1)?,
            ElementValue::Array(values) => {
                writer.emit_len_u16("Array element count", values.len())?;
                for value in values {
                    value.encode(writer, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn decode(reader: &mut ClassReader<'_>, depth: usize) -> Result<Self, DecodeError> {
        let offset = reader.position();
        if depth >= MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep { offset });
        }
        let tag = reader.read_u8()?;
        if constant_kind(tag).is_some() {
            return Ok(ElementValue::Const {
                tag,
                index: reader.read_u16()?,
            });
        }
        match tag {
            element::ENUM => Ok(ElementValue::Enum {
                type_name_index: reader.read_u16()?,
                const_name_index: reader.read_u16()?,
            }),
            element::CLASS => Ok(ElementValue::Class {
                descriptor_index: reader.read_u16()?,
            }),
            element::ANNOTATION => Ok(ElementValue::Annotation(AnnotationInfo::decode(
                reader,
                depth + 1,
            )?)),
            element::ARRAY => {
                let count = reader.read_u16()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(ElementValue::decode(reader, depth + 1)?);
                }
                Ok(ElementValue::Array(values))
            }
            other => Err(DecodeError::InvalidElementTag {
                tag: other as char,
                offset,
            }),
        }
    }

    /// Re-point this value from `src` into `dest`
    pub fn copy_to(&self, src: &ConstantPool, dest: &mut ConstantPool) -> Result<Self, CodecError> {
        self.copy_nested(src, dest, 0)
    }

    fn copy_nested(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        depth: usize,
    ) -> Result<Self, CodecError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep);
        }
        Ok(match self {
            ElementValue::Const { tag, index } => {
                let kind = constant_kind(*tag).ok_or(CodecError::NotAConstantTag(*tag as char))?;
                ElementValue::Const {
                    tag: *tag,
                    index: copy_constant(src, dest, *index, kind)?,
                }
            }
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => ElementValue::Enum {
                type_name_index: copy_constant(src, dest, *type_name_index, tag::UTF8)?,
                const_name_index: copy_constant(src, dest, *const_name_index, tag::UTF8)?,
            },
            ElementValue::Class { descriptor_index } => ElementValue::Class {
                descriptor_index: copy_constant(src, dest, *descriptor_index, tag::UTF8)?,
            },
            ElementValue::Annotation(info) => {
                ElementValue::Annotation(info.copy_nested(src, dest, depth + 1)?)
            }
            ElementValue::Array(values) => ElementValue::Array(
                values
                    .iter()
                    .map(|v| v.copy_nested(src, dest, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// An `annotation` structure
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    /// Utf8 index of the marker type's field descriptor
    pub type_index: u16,
    /// (Utf8 member name index, value) pairs in attribute order
    pub members: Vec<(u16, ElementValue)>,
}

impl AnnotationInfo {
    /// Create an annotation with no members
    pub fn new(type_index: u16) -> Self {
        Self {
            type_index,
            members: Vec::new(),
        }
    }

    /// Marker type descriptor, e.g. `Lcom/example/Tag;`
    pub fn type_descriptor<'p>(&self, pool: &'p ConstantPool) -> Option<&'p str> {
        pool.utf8(self.type_index)
    }

    fn encode(&self, writer: &mut ClassWriter, depth: usize) -> Result<(), CodecError> {
        writer.emit_u16(self.type_index);
        writer.emit_len_u16("Annotation member count", self.members.len())?;
        for (name_index, value) in &self.members {
            writer.emit_u16(*name_index);
            value.encode(writer, depth)?;
        }
        Ok(())
    }

    fn decode(reader: &mut ClassReader<'_>, depth: usize) -> Result<Self, DecodeError> {
        let type_index = reader.read_u16()?;
        let count = reader.read_u16()? as usize;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let name_index = reader.read_u16()?;
            members.push((name_index, ElementValue::decode(reader, depth)?));
        }
        Ok(Self {
            type_index,
            members,
        })
    }

    /// Re-point this annotation from `src` into `dest`
    pub fn copy_to(&self, src: &ConstantPool, dest: &mut ConstantPool) -> Result<Self, CodecError> {
        self.copy_nested(src, dest, 0)
    }

    fn copy_nested(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        depth: usize,
    ) -> Result<Self, CodecError> {
        let type_index = copy_constant(src, dest, self.type_index, tag::UTF8)?;
        let mut members = Vec::with_capacity(self.members.len());
        for (name_index, value) in &self.members {
            members.push((
                copy_constant(src, dest, *name_index, tag::UTF8)?,
                value.copy_nested(src, dest, depth)?,
            ));
        }
        Ok(Self {
            type_index,
            members,
        })
    }
}

fn encode_annotations(
    annotations: &[AnnotationInfo],
    writer: &mut ClassWriter,
) -> Result<(), CodecError> {
    writer.emit_len_u16("Annotation count", annotations.len())?;
    for annotation in annotations {
        annotation.encode(writer, 0)?;
    }
    Ok(())
}

fn decode_annotations(reader: &mut ClassReader<'_>) -> Result<Vec<AnnotationInfo>, DecodeError> {
    let count = reader.read_u16()? as usize;
    let mut annotations = Vec::with_capacity(count);
    for _ in 0..count {
        annotations.push(AnnotationInfo::decode(reader, 0)?);
    }
    Ok(annotations)
}

/// Parsed `RuntimeVisibleAnnotations` attribute
#[derive(Debug, Clone)]
pub struct AnnotationsAttribute {
    /// Pool the indices below refer to
    pub pool: Arc<ConstantPool>,
    /// Annotations in attribute order
    pub annotations: Vec<AnnotationInfo>,
}

impl AnnotationsAttribute {
    /// Attribute name
    pub const NAME: &'static str = "RuntimeVisibleAnnotations";

    /// Create an attribute over an existing pool
    pub fn new(pool: Arc<ConstantPool>, annotations: Vec<AnnotationInfo>) -> Self {
        Self { pool, annotations }
    }

    /// Parse an attribute body
    pub fn parse(pool: Arc<ConstantPool>, body: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ClassReader::new(body);
        let annotations = decode_annotations(&mut reader)?;
        reader.expect_end()?;
        Ok(Self { pool, annotations })
    }

    /// Number of annotations
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Check if there are no annotations
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Encode the body against this attribute's own pool
    pub fn encode_body(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = ClassWriter::new();
        encode_annotations(&self.annotations, &mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Encode the body with every index re-pointed into `dest`
    pub fn copy_body_to(&self, dest: &mut ConstantPool) -> Result<Vec<u8>, CodecError> {
        let copied = self
            .annotations
            .iter()
            .map(|a| a.copy_to(&self.pool, dest))
            .collect::<Result<Vec<_>, _>>()?;
        let mut writer = ClassWriter::new();
        encode_annotations(&copied, &mut writer)?;
        Ok(writer.into_bytes())
    }
}

/// Parsed `RuntimeVisibleParameterAnnotations` attribute
#[derive(Debug, Clone)]
pub struct ParameterAnnotationsAttribute {
    /// Pool the indices below refer to
    pub pool: Arc<ConstantPool>,
    /// Annotations per parameter position
    pub parameters: Vec<Vec<AnnotationInfo>>,
}

impl ParameterAnnotationsAttribute {
    /// Attribute name
    pub const NAME: &'static str = "RuntimeVisibleParameterAnnotations";

    /// Create an attribute over an existing pool
    pub fn new(pool: Arc<ConstantPool>, parameters: Vec<Vec<AnnotationInfo>>) -> Self {
        Self { pool, parameters }
    }

    /// Parse an attribute body
    pub fn parse(pool: Arc<ConstantPool>, body: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ClassReader::new(body);
        let count = reader.read_u8()? as usize;
        let mut parameters = Vec::with_capacity(count);
        for _ in 0..count {
            parameters.push(decode_annotations(&mut reader)?);
        }
        reader.expect_end()?;
        Ok(Self { pool, parameters })
    }

    /// Number of parameter positions
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Encode the body against this attribute's own pool
    pub fn encode_body(&self) -> Result<Vec<u8>, CodecError> {
        Self::write_body(&self.parameters)
    }

    /// Encode the body with every index re-pointed into `dest`
    pub fn copy_body_to(&self, dest: &mut ConstantPool) -> Result<Vec<u8>, CodecError> {
        let mut copied = Vec::with_capacity(self.parameters.len());
        for annotations in &self.parameters {
            copied.push(
                annotations
                    .iter()
                    .map(|a| a.copy_to(&self.pool, dest))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        Self::write_body(&copied)
    }

    fn write_body(parameters: &[Vec<AnnotationInfo>]) -> Result<Vec<u8>, CodecError> {
        let count =
            u8::try_from(parameters.len()).map_err(|_| CodecError::TooManyParameters(parameters.len()))?;
        let mut writer = ClassWriter::new();
        writer.emit_u8(count);
        for annotations in parameters {
            encode_annotations(annotations, &mut writer)?;
        }
        Ok(writer.into_bytes())
    }
}
