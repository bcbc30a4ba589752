//! Constant pool
//!
//! Indices are 1-based as in the class-file format. Long and double entries
//! occupy two slots; the second slot is an unusable placeholder.

use rustc_hash::FxHashMap;

use crate::annotation::CodecError;
use crate::encoder::{modified_utf8_len, ClassReader, ClassWriter, DecodeError};

/// Constant pool tags
pub mod tag {
    /// CONSTANT_Utf8
    pub const UTF8: u8 = 1;
    /// CONSTANT_Integer
    pub const INTEGER: u8 = 3;
    /// CONSTANT_Float
    pub const FLOAT: u8 = 4;
    /// CONSTANT_Long
    pub const LONG: u8 = 5;
    /// CONSTANT_Double
    pub const DOUBLE: u8 = 6;
    /// CONSTANT_Class
    pub const CLASS: u8 = 7;
    /// CONSTANT_String
    pub const STRING: u8 = 8;
}

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Modified UTF-8 text
    Utf8(String),
    /// 32-bit integer (also carries byte, char, short and boolean values)
    Integer(i32),
    /// 32-bit float
    Float(f32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// Class reference, pointing at a Utf8 internal name
    Class(u16),
    /// String literal, pointing at a Utf8 entry
    String(u16),
    /// Second slot of a long or double
    Unusable,
}

impl Constant {
    /// Class-file tag of this entry
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => tag::UTF8,
            Constant::Integer(_) => tag::INTEGER,
            Constant::Float(_) => tag::FLOAT,
            Constant::Long(_) => tag::LONG,
            Constant::Double(_) => tag::DOUBLE,
            Constant::Class(_) => tag::CLASS,
            Constant::String(_) => tag::STRING,
            Constant::Unusable => 0,
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// Hashable identity of an entry, used for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
}

/// Class-file constant pool
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// Entries by index minus one
    entries: Vec<Constant>,
    /// Deduplication index
    lookup: FxHashMap<ConstantKey, u16>,
}

impl ConstantPool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots used, not counting the reserved slot 0
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value written as `constant_pool_count`
    pub fn count(&self) -> u16 {
        (self.entries.len() + 1) as u16
    }

    /// Get an entry by 1-based index
    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize - 1)
    }

    /// Iterate over (index, entry) pairs, skipping placeholder slots
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| ((i + 1) as u16, c))
    }

    fn push(&mut self, key: ConstantKey, constant: Constant) -> Result<u16, CodecError> {
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let slots = if constant.is_wide() { 2 } else { 1 };
        // constant_pool_count itself must fit in a u16
        if self.entries.len() + slots + 1 > u16::MAX as usize {
            return Err(CodecError::PoolOverflow);
        }
        let index = (self.entries.len() + 1) as u16;
        self.entries.push(constant.clone());
        if constant.is_wide() {
            self.entries.push(Constant::Unusable);
        }
        self.lookup.insert(key, index);
        Ok(index)
    }

    // ===== Adding =====

    /// Add a Utf8 entry
    ///
    /// Fails if the modified UTF-8 form is longer than a u16 length allows.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16, CodecError> {
        let len = modified_utf8_len(value);
        if len > u16::MAX as usize {
            return Err(CodecError::TooLong {
                what: "Utf8 constant",
                len,
            });
        }
        self.push(ConstantKey::Utf8(value.to_string()), Constant::Utf8(value.to_string()))
    }

    /// Add an Integer entry
    pub fn add_integer(&mut self, value: i32) -> Result<u16, CodecError> {
        self.push(ConstantKey::Integer(value), Constant::Integer(value))
    }

    /// Add a Float entry
    pub fn add_float(&mut self, value: f32) -> Result<u16, CodecError> {
        self.push(ConstantKey::Float(value.to_bits()), Constant::Float(value))
    }

    /// Add a Long entry
    pub fn add_long(&mut self, value: i64) -> Result<u16, CodecError> {
        self.push(ConstantKey::Long(value), Constant::Long(value))
    }

    /// Add a Double entry
    pub fn add_double(&mut self, value: f64) -> Result<u16, CodecError> {
        self.push(ConstantKey::Double(value.to_bits()), Constant::Double(value))
    }

    /// Add a Class entry for an internal name like `java/lang/Object`
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16, CodecError> {
        let name_index = self.add_utf8(internal_name)?;
        self.push(ConstantKey::Class(name_index), Constant::Class(name_index))
    }

    /// Add a String entry
    pub fn add_string(&mut self, value: &str) -> Result<u16, CodecError> {
        let utf8_index = self.add_utf8(value)?;
        self.push(ConstantKey::String(utf8_index), Constant::String(utf8_index))
    }

    // ===== Lookup =====

    /// Get a Utf8 entry
    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Some(s),
            _ => None,
        }
    }

    /// Get an Integer entry
    pub fn integer(&self, index: u16) -> Option<i32> {
        match self.get(index)? {
            Constant::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a Float entry
    pub fn float(&self, index: u16) -> Option<f32> {
        match self.get(index)? {
            Constant::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a Long entry
    pub fn long(&self, index: u16) -> Option<i64> {
        match self.get(index)? {
            Constant::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a Double entry
    pub fn double(&self, index: u16) -> Option<f64> {
        match self.get(index)? {
            Constant::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the internal name a Class entry refers to
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => None,
        }
    }

    // ===== Binary form =====

    /// Encode the pool, including its leading count
    pub fn encode(&self, writer: &mut ClassWriter) -> Result<(), CodecError> {
        writer.emit_u16(self.count());
        for constant in &self.entries {
            match constant {
                Constant::Utf8(s) => {
                    writer.emit_u8(tag::UTF8);
                    writer.emit_utf8(s)?;
                }
                Constant::Integer(v) => {
                    writer.emit_u8(tag::INTEGER);
                    writer.emit_i32(*v);
                }
                Constant::Float(v) => {
                    writer.emit_u8(tag::FLOAT);
                    writer.emit_u32(v.to_bits());
                }
                Constant::Long(v) => {
                    writer.emit_u8(tag::LONG);
                    writer.emit_i64(*v);
                }
                Constant::Double(v) => {
                    writer.emit_u8(tag::DOUBLE);
                    writer.emit_i64(v.to_bits() as i64);
                }
                Constant::Class(i) => {
                    writer.emit_u8(tag::CLASS);
                    writer.emit_u16(*i);
                }
                Constant::String(i) => {
                    writer.emit_u8(tag::STRING);
                    writer.emit_u16(*i);
                }
                Constant::Unusable => {}
            }
        }
        Ok(())
    }

    /// Decode a pool, including its leading count
    pub fn decode(reader: &mut ClassReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u16()?;
        let mut pool = ConstantPool::new();
        while pool.count() < count {
            let offset = reader.position();
            let constant = match reader.read_u8()? {
                tag::UTF8 => Constant::Utf8(reader.read_utf8()?),
                tag::INTEGER => Constant::Integer(reader.read_i32()?),
                tag::FLOAT => Constant::Float(f32::from_bits(reader.read_u32()?)),
                tag::LONG => Constant::Long(reader.read_i64()?),
                tag::DOUBLE => Constant::Double(f64::from_bits(reader.read_i64()? as u64)),
                tag::CLASS => Constant::Class(reader.read_u16()?),
                tag::STRING => Constant::String(reader.read_u16()?),
                other => {
                    return Err(DecodeError::InvalidConstantTag { tag: other, offset });
                }
            };
            pool.insert_decoded(constant);
        }
        Ok(pool)
    }

    /// Append a decoded entry verbatim, keeping its slot position
    fn insert_decoded(&mut self, constant: Constant) {
        let index = (self.entries.len() + 1) as u16;
        let key = match &constant {
            Constant::Utf8(s) => Some(ConstantKey::Utf8(s.clone())),
            Constant::Integer(v) => Some(ConstantKey::Integer(*v)),
            Constant::Float(v) => Some(ConstantKey::Float(v.to_bits())),
            Constant::Long(v) => Some(ConstantKey::Long(*v)),
            Constant::Double(v) => Some(ConstantKey::Double(v.to_bits())),
            Constant::Class(i) => Some(ConstantKey::Class(*i)),
            Constant::String(i) => Some(ConstantKey::String(*i)),
            Constant::Unusable => None,
        };
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        if let Some(key) = key {
            self.lookup.entry(key).or_insert(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_start_at_one() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_utf8("first").unwrap(), 1);
        assert_eq!(pool.add_utf8("second").unwrap(), 2);
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.get(0), None);
    }

    #[test]
    fn test_deduplication() {
        let mut pool = ConstantPool::new();
        let a = pool.add_utf8("value").unwrap();
        let b = pool.add_utf8("value").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);

        let c1 = pool.add_class("java/lang/Object").unwrap();
        let c2 = pool.add_class("java/lang/Object").unwrap();
        assert_eq!(c1, c2);
        assert_eq!(pool.class_name(c1), Some("java/lang/Object"));
    }

    #[test]
    fn test_wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.add_long(1 << 40).unwrap();
        let after = pool.add_integer(7).unwrap();
        assert_eq!(long, 1);
        assert_eq!(after, 3);
        assert_eq!(pool.get(2), Some(&Constant::Unusable));
        assert_eq!(pool.iter().count(), 2);
    }

    #[test]
    fn test_typed_lookup_rejects_wrong_tag() {
        let mut pool = ConstantPool::new();
        let int = pool.add_integer(42).unwrap();
        assert_eq!(pool.integer(int), Some(42));
        assert_eq!(pool.utf8(int), None);
        assert_eq!(pool.long(int), None);
        assert_eq!(pool.integer(99), None);
    }

    #[test]
    fn test_float_dedup_by_bits() {
        let mut pool = ConstantPool::new();
        let pos = pool.add_float(0.0).unwrap();
        let neg = pool.add_float(-0.0).unwrap();
        assert_ne!(pos, neg);
        let nan1 = pool.add_double(f64::NAN).unwrap();
        let nan2 = pool.add_double(f64::NAN).unwrap();
        assert_eq!(nan1, nan2);
    }

    #[test]
    fn test_pool_encode_decode() {
        let mut pool = ConstantPool::new();
        pool.add_string("hello").unwrap();
        pool.add_double(2.5).unwrap();
        pool.add_class("com/example/Tag").unwrap();

        let mut writer = ClassWriter::new();
        pool.encode(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ClassReader::new(&bytes);
        let decoded = ConstantPool::decode(&mut reader).unwrap();
        assert_eq!(decoded.len(), pool.len());
        assert_eq!(decoded.utf8(1), Some("hello"));
        assert_eq!(decoded.double(3), Some(2.5));
        assert_eq!(decoded.class_name(6), Some("com/example/Tag"));
        assert!(!reader.has_more());
    }

    #[test]
    fn test_decode_invalid_tag() {
        let bytes = [0x00, 0x02, 0x63];
        let mut reader = ClassReader::new(&bytes);
        assert_eq!(
            ConstantPool::decode(&mut reader).unwrap_err(),
            DecodeError::InvalidConstantTag { tag: 0x63, offset: 2 }
        );
    }

    #[test]
    fn test_oversized_utf8_rejected() {
        let mut pool = ConstantPool::new();
        assert!(pool.add_utf8(&"a".repeat(65_535)).is_ok());
        assert_eq!(
            pool.add_utf8(&"a".repeat(65_541)),
            Err(CodecError::TooLong {
                what: "Utf8 constant",
                len: 65_541
            })
        );
        // NUL takes two bytes in modified UTF-8
        assert!(pool.add_utf8(&"\0".repeat(32_768)).is_err());
        assert_eq!(pool.len(), 1);
    }
}
