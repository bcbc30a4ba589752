//! Class-file format
//!
//! Only the structure needed to carry attributes is modelled: attribute
//! payloads stay opaque bytes and are interpreted on demand.

use std::sync::Arc;

use crate::annotation::{AnnotationsAttribute, CodecError, ParameterAnnotationsAttribute};
use crate::constants::ConstantPool;
use crate::encoder::{ClassReader, ClassWriter, DecodeError};

/// Magic number for class files
pub const MAGIC: u32 = 0xCAFE_BABE;

/// First major version that defines runtime-visible annotations
pub const MIN_ANNOTATION_MAJOR: u16 = 49;

/// Access flags
pub mod access {
    /// ACC_PUBLIC
    pub const PUBLIC: u16 = 0x0001;
    /// ACC_STATIC
    pub const STATIC: u16 = 0x0008;
    /// ACC_SUPER (classes) / ACC_SYNCHRONIZED (methods)
    pub const SUPER: u16 = 0x0020;
    /// ACC_ABSTRACT
    pub const ABSTRACT: u16 = 0x0400;
    /// ACC_SYNTHETIC
    pub const SYNTHETIC: u16 = 0x1000;
}

/// A raw attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Utf8 index of the attribute name
    pub name_index: u16,
    /// Attribute body
    pub info: Vec<u8>,
}

impl Attribute {
    fn encode(&self, writer: &mut ClassWriter) -> Result<(), CodecError> {
        let len = u32::try_from(self.info.len()).map_err(|_| CodecError::TooLong {
            what: "Attribute body",
            len: self.info.len(),
        })?;
        writer.emit_u16(self.name_index);
        writer.emit_u32(len);
        writer.emit_bytes(&self.info);
        Ok(())
    }

    fn decode(reader: &mut ClassReader<'_>) -> Result<Self, DecodeError> {
        let name_index = reader.read_u16()?;
        let len = reader.read_u32()? as usize;
        let info = reader.read_bytes(len)?;
        Ok(Self { name_index, info })
    }
}

fn encode_attributes(attributes: &[Attribute], writer: &mut ClassWriter) -> Result<(), CodecError> {
    writer.emit_len_u16("Attribute count", attributes.len())?;
    for attribute in attributes {
        attribute.encode(writer)?;
    }
    Ok(())
}

fn decode_attributes(reader: &mut ClassReader<'_>) -> Result<Vec<Attribute>, DecodeError> {
    let count = reader.read_u16()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        attributes.push(Attribute::decode(reader)?);
    }
    Ok(attributes)
}

fn find_attribute<'a>(
    attributes: &'a [Attribute],
    pool: &ConstantPool,
    name: &str,
) -> Option<&'a Attribute> {
    attributes
        .iter()
        .find(|a| pool.utf8(a.name_index) == Some(name))
}

/// A field or method entry
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    /// Access flags
    pub access_flags: u16,
    /// Utf8 index of the simple name
    pub name_index: u16,
    /// Utf8 index of the descriptor
    pub descriptor_index: u16,
    /// Member attributes
    pub attributes: Vec<Attribute>,
}

impl MemberInfo {
    fn encode(&self, writer: &mut ClassWriter) -> Result<(), CodecError> {
        writer.emit_u16(self.access_flags);
        writer.emit_u16(self.name_index);
        writer.emit_u16(self.descriptor_index);
        encode_attributes(&self.attributes, writer)
    }

    fn decode(reader: &mut ClassReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            access_flags: reader.read_u16()?,
            name_index: reader.read_u16()?,
            descriptor_index: reader.read_u16()?,
            attributes: decode_attributes(reader)?,
        })
    }
}

/// A decoded or assembled class file
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// Constant pool
    pub pool: Arc<ConstantPool>,
    /// Class access flags
    pub access_flags: u16,
    /// Class index of this class
    pub this_class: u16,
    /// Class index of the superclass (0 only for the root type)
    pub super_class: u16,
    /// Class indices of direct superinterfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<MemberInfo>,
    /// Declared methods
    pub methods: Vec<MemberInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Internal name of this class
    pub fn name(&self) -> Option<&str> {
        self.pool.class_name(self.this_class)
    }

    /// Internal name of the superclass
    pub fn super_name(&self) -> Option<&str> {
        self.pool.class_name(self.super_class)
    }

    /// Find a class attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, &self.pool, name)
    }

    /// Find a method by simple name
    pub fn method(&self, name: &str) -> Option<&MemberInfo> {
        self.methods
            .iter()
            .find(|m| self.pool.utf8(m.name_index) == Some(name))
    }

    /// Class-level `RuntimeVisibleAnnotations`, if present
    pub fn annotations(&self) -> Result<Option<AnnotationsAttribute>, DecodeError> {
        self.attribute(AnnotationsAttribute::NAME)
            .map(|a| AnnotationsAttribute::parse(self.pool.clone(), &a.info))
            .transpose()
    }

    /// `RuntimeVisibleParameterAnnotations` of the named method, if present
    pub fn parameter_annotations(
        &self,
        method: &str,
    ) -> Result<Option<ParameterAnnotationsAttribute>, DecodeError> {
        self.method(method)
            .and_then(|m| {
                find_attribute(&m.attributes, &self.pool, ParameterAnnotationsAttribute::NAME)
            })
            .map(|a| ParameterAnnotationsAttribute::parse(self.pool.clone(), &a.info))
            .transpose()
    }

    /// Encode to class-file bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut writer = ClassWriter::with_capacity(128);
        writer.emit_u32(MAGIC);
        writer.emit_u16(self.minor_version);
        writer.emit_u16(self.major_version);
        self.pool.encode(&mut writer)?;
        writer.emit_u16(self.access_flags);
        writer.emit_u16(self.this_class);
        writer.emit_u16(self.super_class);

        writer.emit_len_u16("Interface count", self.interfaces.len())?;
        for interface in &self.interfaces {
            writer.emit_u16(*interface);
        }

        writer.emit_len_u16("Field count", self.fields.len())?;
        for field in &self.fields {
            field.encode(&mut writer)?;
        }

        writer.emit_len_u16("Method count", self.methods.len())?;
        for method in &self.methods {
            method.encode(&mut writer)?;
        }

        encode_attributes(&self.attributes, &mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode class-file bytes
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ClassReader::new(data);

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic(magic));
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        let pool = ConstantPool::decode(&mut reader)?;
        let access_flags = reader.read_u16()?;
        let this_class = reader.read_u16()?;
        let super_class = reader.read_u16()?;

        let interface_count = reader.read_u16()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(reader.read_u16()?);
        }

        let field_count = reader.read_u16()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(MemberInfo::decode(&mut reader)?);
        }

        let method_count = reader.read_u16()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(MemberInfo::decode(&mut reader)?);
        }

        let attributes = decode_attributes(&mut reader)?;
        reader.expect_end()?;

        Ok(Self {
            minor_version,
            major_version,
            pool: Arc::new(pool),
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
