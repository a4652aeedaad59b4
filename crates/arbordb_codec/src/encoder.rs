//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::key::{KeyId, PathElement};
use crate::value::PropertyValue;

/// Encode a property value to canonical CBOR bytes.
///
/// The output is deterministic per RFC 8949 Section 4.2.1: integers use the
/// shortest possible encoding, floats are always 8-byte doubles, and no
/// indefinite-length items are produced. Identical values always produce
/// identical bytes, which the store relies on for row keys and query-shape
/// fingerprints.
///
/// # Errors
///
/// Returns an error for NaN floats and for lists nested inside lists.
pub fn to_canonical_cbor(value: &PropertyValue) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.value(value)?;
    Ok(encoder.into_bytes())
}

/// CBOR tag marking a timestamp (epoch milliseconds).
pub(crate) const TAG_TIMESTAMP: u64 = 1;

/// CBOR tag marking an embedded key path (tag 39, "identifier").
pub(crate) const TAG_KEY_REF: u64 = 39;

/// A canonical CBOR encoder.
///
/// Produces deterministic output suitable for hashing, row keys, and the
/// durable journal.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Consume this encoder and return the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Encode a property value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NaNForbidden`] for NaN floats and
    /// [`CodecError::NestedList`] for a list inside a list.
    pub fn value(&mut self, value: &PropertyValue) -> CodecResult<()> {
        match value {
            PropertyValue::Null => {
                self.null();
                Ok(())
            }
            PropertyValue::Bool(b) => {
                self.bool(*b);
                Ok(())
            }
            PropertyValue::Integer(n) => {
                self.integer(*n);
                Ok(())
            }
            PropertyValue::Float(f) => self.float(*f),
            PropertyValue::Timestamp(t) => {
                self.tag(TAG_TIMESTAMP);
                self.integer(t.timestamp_millis());
                Ok(())
            }
            PropertyValue::Text(s) => {
                self.text(s);
                Ok(())
            }
            PropertyValue::KeyRef(key) => {
                self.tag(TAG_KEY_REF);
                self.key_path(key.path());
                Ok(())
            }
            PropertyValue::List(items) => {
                self.unsigned(4, items.len() as u64);
                for item in items {
                    if matches!(item, PropertyValue::List(_)) {
                        return Err(CodecError::NestedList);
                    }
                    self.value(item)?;
                }
                Ok(())
            }
        }
    }

    /// Encode a key path as an array of `[kind, id]` pairs.
    ///
    /// Numeric identifiers encode as unsigned integers, names as text, and
    /// an unassigned identifier as null.
    pub fn key_path(&mut self, path: &[PathElement]) {
        self.unsigned(4, path.len() as u64);
        for element in path {
            self.unsigned(4, 2);
            self.text(&element.kind);
            match &element.id {
                KeyId::Unassigned => self.null(),
                #[allow(clippy::cast_sign_loss)]
                KeyId::Numeric(id) => self.unsigned(0, *id as u64),
                KeyId::Named(name) => self.text(name),
            }
        }
    }

    pub(crate) fn null(&mut self) {
        // CBOR null is simple value 22 (0xf6)
        self.buffer.push(0xf6);
    }

    pub(crate) fn bool(&mut self, b: bool) {
        // CBOR false is 0xf4, true is 0xf5
        self.buffer.push(if b { 0xf5 } else { 0xf4 });
    }

    #[allow(clippy::cast_sign_loss)]
    pub(crate) fn integer(&mut self, n: i64) {
        if n >= 0 {
            self.unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1); safe for all i64.
            let abs_minus_one = (-(n + 1)) as u64;
            self.unsigned(1, abs_minus_one);
        }
    }

    fn float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        // Always a full-width double (major type 7, additional info 27) so
        // that equal values have one encoding.
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_be_bytes());
        Ok(())
    }

    /// Encode a text string.
    pub fn text(&mut self, text: &str) {
        self.unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    /// Encode a byte string.
    pub fn bytes(&mut self, bytes: &[u8]) {
        self.unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Encode an array header for `len` following items.
    pub fn array_header(&mut self, len: usize) {
        self.unsigned(4, len as u64);
    }

    /// Encode an unsigned integer.
    pub fn uint(&mut self, value: u64) {
        self.unsigned(0, value);
    }

    fn tag(&mut self, tag: u64) {
        self.unsigned(6, tag);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn encode_null() {
        let bytes = to_canonical_cbor(&PropertyValue::Null).unwrap();
        assert_eq!(bytes, vec![0xf6]);
    }

    #[test]
    fn encode_bool() {
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Bool(false)).unwrap(),
            vec![0xf4]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Bool(true)).unwrap(),
            vec![0xf5]
        );
    }

    #[test]
    fn encode_small_positive_integers() {
        // 0-23 encode in one byte
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(0)).unwrap(),
            vec![0x00]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(23)).unwrap(),
            vec![0x17]
        );
    }

    #[test]
    fn encode_wider_integers() {
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(24)).unwrap(),
            vec![0x18, 24]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_negative_integers() {
        // -1 encodes as 0x20 (major type 1, value 0)
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(-1)).unwrap(),
            vec![0x20]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Integer(-100)).unwrap(),
            vec![0x38, 99]
        );
    }

    #[test]
    fn encode_float_is_always_eight_bytes() {
        let bytes = to_canonical_cbor(&PropertyValue::Float(1.5)).unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(&bytes[1..], &1.5f64.to_be_bytes());
    }

    #[test]
    fn encode_nan_is_rejected() {
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Float(f64::NAN)),
            Err(CodecError::NaNForbidden)
        );
    }

    #[test]
    fn encode_text() {
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Text(String::new())).unwrap(),
            vec![0x60]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::Text("hello".into())).unwrap(),
            vec![0x65, b'h', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn encode_timestamp_is_tagged() {
        let t = Utc.timestamp_millis_opt(1_000).unwrap();
        let bytes = to_canonical_cbor(&PropertyValue::Timestamp(t)).unwrap();
        // Tag 1 (0xc1), then the integer 1000
        assert_eq!(bytes, vec![0xc1, 0x19, 0x03, 0xe8]);
    }

    #[test]
    fn encode_key_ref_is_tagged() {
        let key = Key::with_id("K", 1);
        let bytes = to_canonical_cbor(&PropertyValue::KeyRef(key)).unwrap();
        // Tag 39 (0xd8 0x27), array(1), array(2), "K", 1
        assert_eq!(bytes, vec![0xd8, 0x27, 0x81, 0x82, 0x61, b'K', 0x01]);
    }

    #[test]
    fn encode_list() {
        assert_eq!(
            to_canonical_cbor(&PropertyValue::List(vec![])).unwrap(),
            vec![0x80]
        );
        assert_eq!(
            to_canonical_cbor(&PropertyValue::from(vec![1i64, 2])).unwrap(),
            vec![0x82, 0x01, 0x02]
        );
    }

    #[test]
    fn nested_list_is_rejected() {
        let nested = PropertyValue::List(vec![PropertyValue::List(vec![])]);
        assert_eq!(to_canonical_cbor(&nested), Err(CodecError::NestedList));
    }

    #[test]
    fn deterministic_encoding() {
        let value = PropertyValue::from(vec!["a", "b", "c"]);
        assert_eq!(
            to_canonical_cbor(&value).unwrap(),
            to_canonical_cbor(&value).unwrap()
        );
    }
}
