//! Canonical CBOR decoder.

use crate::encoder::{TAG_KEY_REF, TAG_TIMESTAMP};
use crate::error::{CodecError, CodecResult};
use crate::key::{Key, KeyId, PathElement};
use crate::value::PropertyValue;
use chrono::{TimeZone, Utc};

/// Decode a property value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or contain constructs
/// that are not property values (maps, nested lists, unknown tags,
/// indefinite-length items).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<PropertyValue> {
    let mut decoder = CanonicalDecoder::new(bytes);
    decoder.value()
}

/// Maximum allowed element count for arrays.
/// Prevents allocation-based DoS from untrusted input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
/// Prevents allocation-based DoS from untrusted input.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// A canonical CBOR decoder.
///
/// Reads the subset of CBOR that ArborDB's encoder produces and rejects
/// everything else.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decode the next property value.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed CBOR or non-value constructs.
    pub fn value(&mut self) -> CodecResult<PropertyValue> {
        self.value_inner(false)
    }

    fn value_inner(&mut self, inside_list: bool) -> CodecResult<PropertyValue> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(PropertyValue::Integer(n))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                // Negative integer: value is -(n+1)
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(PropertyValue::Integer(-n - 1))
            }
            3 => {
                let text = self.decode_text(additional_info)?;
                Ok(PropertyValue::Text(text))
            }
            4 => {
                if inside_list {
                    return Err(CodecError::NestedList);
                }
                let len = self.container_len(additional_info)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.value_inner(true)?);
                }
                Ok(PropertyValue::List(items))
            }
            6 => {
                let tag = self.decode_unsigned(additional_info)?;
                match tag {
                    TAG_TIMESTAMP => self.timestamp(),
                    TAG_KEY_REF => {
                        let path = self.key_path()?;
                        let key = Key::from_path(path)
                            .map_err(|e| CodecError::invalid_structure(e.to_string()))?;
                        Ok(PropertyValue::KeyRef(key))
                    }
                    other => Err(CodecError::invalid_structure(format!(
                        "unknown tag: {other}"
                    ))),
                }
            }
            7 => self.decode_simple(additional_info),
            2 => Err(CodecError::invalid_structure(
                "byte strings are not property values",
            )),
            5 => Err(CodecError::invalid_structure(
                "maps are not property values",
            )),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Decode a key path array of `[kind, id]` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the array structure does not match the key
    /// path encoding.
    pub fn key_path(&mut self) -> CodecResult<Vec<PathElement>> {
        let len = self.array_len()?;
        let mut path = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            let pair_len = self.array_len()?;
            if pair_len != 2 {
                return Err(CodecError::invalid_structure(
                    "key path element is not a [kind, id] pair",
                ));
            }
            let kind = self.text()?;
            let id = self.key_id()?;
            path.push(PathElement::new(kind, id));
        }
        Ok(path)
    }

    fn key_id(&mut self) -> CodecResult<KeyId> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match (major_type, additional_info) {
            (7, 22) => Ok(KeyId::Unassigned),
            (0, _) => {
                let n = self.decode_unsigned(additional_info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(KeyId::Numeric(n))
            }
            (3, _) => {
                let name = self.decode_text(additional_info)?;
                Ok(KeyId::Named(name))
            }
            _ => Err(CodecError::invalid_structure(
                "key identifier must be null, unsigned, or text",
            )),
        }
    }

    fn timestamp(&mut self) -> CodecResult<PropertyValue> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        let millis = match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                let n = i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?;
                -n - 1
            }
            _ => {
                return Err(CodecError::invalid_structure(
                    "timestamp payload must be integer milliseconds",
                ))
            }
        };

        match Utc.timestamp_millis_opt(millis) {
            chrono::LocalResult::Single(t) => Ok(PropertyValue::Timestamp(t)),
            _ => Err(CodecError::invalid_structure(format!(
                "timestamp out of range: {millis}"
            ))),
        }
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<PropertyValue> {
        match additional_info {
            20 => Ok(PropertyValue::Bool(false)),
            21 => Ok(PropertyValue::Bool(true)),
            22 => Ok(PropertyValue::Null),
            27 => {
                let bits = self.read_slice(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bits);
                Ok(PropertyValue::Float(f64::from_be_bytes(raw)))
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure(
                "unsupported simple value",
            )),
        }
    }

    /// Read an array header and return its element count.
    ///
    /// # Errors
    ///
    /// Fails if the next item is not a definite-length array.
    pub fn array_len(&mut self) -> CodecResult<usize> {
        let initial_byte = self.read_byte()?;
        if initial_byte >> 5 != 4 {
            return Err(CodecError::invalid_structure("expected array"));
        }
        self.container_len(initial_byte & 0x1f)
    }

    /// Read a text string.
    ///
    /// # Errors
    ///
    /// Fails if the next item is not a definite-length text string.
    pub fn text(&mut self) -> CodecResult<String> {
        let initial_byte = self.read_byte()?;
        if initial_byte >> 5 != 3 {
            return Err(CodecError::invalid_structure("expected text string"));
        }
        self.decode_text(initial_byte & 0x1f)
    }

    /// Read a byte string.
    ///
    /// # Errors
    ///
    /// Fails if the next item is not a definite-length byte string.
    pub fn bytes(&mut self) -> CodecResult<Vec<u8>> {
        let initial_byte = self.read_byte()?;
        if initial_byte >> 5 != 2 {
            return Err(CodecError::invalid_structure("expected byte string"));
        }
        let len = self.decode_unsigned(initial_byte & 0x1f)?;
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::invalid_structure("byte string too large"));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.read_slice(len as usize)?.to_vec())
    }

    /// Read an unsigned integer.
    ///
    /// # Errors
    ///
    /// Fails if the next item is not an unsigned integer.
    pub fn uint(&mut self) -> CodecResult<u64> {
        let initial_byte = self.read_byte()?;
        if initial_byte >> 5 != 0 {
            return Err(CodecError::invalid_structure("expected unsigned integer"));
        }
        self.decode_unsigned(initial_byte & 0x1f)
    }

    fn container_len(&mut self, additional_info: u8) -> CodecResult<usize> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::invalid_structure("container too large"));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(len as usize)
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::invalid_structure("text string too large"));
        }
        #[allow(clippy::cast_possible_truncation)]
        let raw = self.read_slice(len as usize)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => {
                let raw = self.read_slice(2)?;
                Ok(u64::from(u16::from_be_bytes([raw[0], raw[1]])))
            }
            26 => {
                let raw = self.read_slice(4)?;
                Ok(u64::from(u32::from_be_bytes([
                    raw[0], raw[1], raw[2], raw[3],
                ])))
            }
            27 => {
                let raw = self.read_slice(8)?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(raw);
                Ok(u64::from_be_bytes(bytes))
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure(
                "reserved additional information",
            )),
        }
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}
