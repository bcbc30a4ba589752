//! Class-file encoding and decoding utilities
//!
//! Class files are big-endian throughout, and strings in the constant pool
//! use the "modified UTF-8" form: NUL is written as two bytes and characters
//! outside the basic plane are written as surrogate pairs.

use thiserror::Error;

use crate::annotation::CodecError;

/// Errors that can occur during class-file decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of input
    #[error("Unexpected end of class data at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid modified UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid magic number
    #[error("Invalid magic number: expected 0xCAFEBABE, got {0:#010x}")]
    InvalidMagic(u32),

    /// Unknown constant pool tag
    #[error("Invalid constant tag {tag} at offset {offset}")]
    InvalidConstantTag {
        /// The tag byte that was read
        tag: u8,
        /// Offset of the tag byte
        offset: usize,
    },

    /// Unknown annotation element tag
    #[error("Invalid element value tag {tag:?} at offset {offset}")]
    InvalidElementTag {
        /// The tag byte that was read
        tag: char,
        /// Offset of the tag byte
        offset: usize,
    },

    /// Bytes left over after a complete structure
    #[error("{0} trailing bytes after end of structure")]
    TrailingBytes(usize),

    /// Element values nested past the supported depth
    #[error("Element values nested too deeply at offset {offset}")]
    NestingTooDeep {
        /// Offset of the element that crossed the limit
        offset: usize,
    },
}

/// Class-file writer
///
/// Provides methods for emitting big-endian values into a binary buffer.
#[derive(Debug)]
pub struct ClassWriter {
    buffer: Vec<u8>,
}

impl ClassWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the current buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of output)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // Fixed-width big-endian writes

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 32-bit signed integer
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 64-bit signed integer
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a u16 count or length, failing if `len` does not fit
    pub fn emit_len_u16(&mut self, what: &'static str, len: usize) -> Result<(), CodecError> {
        let value = u16::try_from(len).map_err(|_| CodecError::TooLong { what, len })?;
        self.emit_u16(value);
        Ok(())
    }

    /// Emit a length-prefixed modified UTF-8 string
    pub fn emit_utf8(&mut self, value: &str) -> Result<(), CodecError> {
        let encoded = encode_modified_utf8(value);
        self.emit_len_u16("Utf8 constant", encoded.len())?;
        self.buffer.extend_from_slice(&encoded);
        Ok(())
    }

    // Attribute length back-patching

    /// Reserve space for a u32 value (returns offset for later patching)
    pub fn reserve_u32(&mut self) -> usize {
        let offset = self.offset();
        self.emit_u32(0);
        offset
    }

    /// Patch a previously emitted u32 value at the given offset
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }
}

impl Default for ClassWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Class-file reader
///
/// Provides methods for reading big-endian values from a binary buffer.
#[derive(Debug)]
pub struct ClassReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ClassReader<'a> {
    /// Create a new reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the remaining bytes in the buffer
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < count {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let slice = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    // Fixed-width big-endian reads

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read a 16-bit unsigned integer
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.take_array().map(u16::from_be_bytes)
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take_array().map(u32::from_be_bytes)
    }

    /// Read a 32-bit signed integer
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.take_array().map(i32::from_be_bytes)
    }

    /// Read a 64-bit signed integer
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.take_array().map(i64::from_be_bytes)
    }

    /// Read a number of raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        self.take(count).map(<[u8]>::to_vec)
    }

    /// Read a length-prefixed modified UTF-8 string
    pub fn read_utf8(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let start = self.position;
        let bytes = self.take(len)?;
        decode_modified_utf8(bytes).ok_or(DecodeError::InvalidUtf8(start))
    }

    /// Fail if any input is left unread
    pub fn expect_end(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

/// Encode a string as modified UTF-8
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Length in bytes of `value` once encoded as modified UTF-8
pub fn modified_utf8_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Decode modified UTF-8, returning `None` on malformed input
///
/// Unpaired surrogates are legal in class files but not in a Rust `String`;
/// they decode to U+FFFD.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != 0 && b < 0x80 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push(
                (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return None;
        }
    }
    Some(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_emission() {
        let mut writer = ClassWriter::new();
        writer.emit_u16(0x1234);
        writer.emit_u32(0xCAFE_BABE);
        assert_eq!(writer.buffer(), &[0x12, 0x34, 0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn test_reader_unexpected_end() {
        let bytes = [0x00, 0x01, 0x02];
        let mut reader = ClassReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u16(), Err(DecodeError::UnexpectedEnd(2)));
    }

    #[test]
    fn test_patch_reserved_length() {
        let mut writer = ClassWriter::new();
        let at = writer.reserve_u32();
        writer.emit_u8(7);
        writer.patch_u32(at, 1);
        assert_eq!(writer.into_bytes(), vec![0, 0, 0, 1, 7]);
    }

    #[test]
    fn test_modified_utf8_nul_and_supplementary() {
        let encoded = encode_modified_utf8("a\0\u{1F600}");
        // 'a', two-byte NUL, two three-byte surrogates
        assert_eq!(encoded.len(), 1 + 2 + 6);
        assert_eq!(&encoded[1..3], &[0xC0, 0x80]);
        assert_eq!(decode_modified_utf8(&encoded).as_deref(), Some("a\0\u{1F600}"));
    }

    #[test]
    fn test_encoded_length_matches() {
        for s in ["", "plain", "a\0b", "\u{e9}\u{4e2d}", "\u{1F600}"] {
            assert_eq!(modified_utf8_len(s), encode_modified_utf8(s).len(), "{:?}", s);
        }
    }

    #[test]
    fn test_oversized_string_rejected() {
        let mut writer = ClassWriter::new();
        let long = "\u{4e2d}".repeat(21_846);
        assert_eq!(
            writer.emit_utf8(&long),
            Err(CodecError::TooLong {
                what: "Utf8 constant",
                len: 65_538
            })
        );
        assert!(writer.buffer().is_empty());
    }

    #[test]
    fn test_lone_surrogate_is_replaced() {
        // ED A0 80 is a lone high surrogate U+D800
        let decoded = decode_modified_utf8(&[b'a', 0xED, 0xA0, 0x80]);
        assert_eq!(decoded.as_deref(), Some("a\u{FFFD}"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [0x00, 0x02, 0xC3, 0x28];
        let mut reader = ClassReader::new(&bytes);
        assert_eq!(reader.read_utf8(), Err(DecodeError::InvalidUtf8(2)));
    }

    #[test]
    fn test_trailing_bytes() {
        let bytes = [1, 2, 3];
        let mut reader = ClassReader::new(&bytes);
        reader.read_u8().unwrap();
        assert_eq!(reader.expect_end(), Err(DecodeError::TrailingBytes(2)));
    }
}
