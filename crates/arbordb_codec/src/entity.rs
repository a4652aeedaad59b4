//! Schema-less entities.

use crate::decoder::CanonicalDecoder;
use crate::encoder::CanonicalEncoder;
use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};

/// A schema-less entity: a key plus an ordered property bag.
///
/// The entity's kind is always the kind of its key's final path element.
/// Property order is insertion order and survives the wire encoding; the
/// store returns a fresh copy of an entity on every read.
///
/// # Example
///
/// ```
/// use arbordb_codec::{Entity, Key, PropertyValue};
///
/// let mut entity = Entity::new(Key::with_id("Person", 1));
/// entity.set("name", "jim");
/// entity.set("age", 41i64);
///
/// assert_eq!(entity.kind(), "Person");
/// assert_eq!(entity.get("name"), Some(&PropertyValue::Text("jim".into())));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    key: Key,
    properties: Vec<(String, PropertyValue)>,
}

impl Entity {
    /// Creates an entity with an empty property bag.
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: Vec::new(),
        }
    }

    /// Returns this entity's key.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Returns this entity's kind (the final element of its key path).
    #[must_use]
    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    /// Returns this entity with a different key of the same kind.
    ///
    /// Used by the store when it assigns a numeric identifier to an
    /// incomplete key at first put.
    #[must_use]
    pub fn with_key(mut self, key: Key) -> Self {
        debug_assert_eq!(self.key.kind(), key.kind(), "key must keep the kind");
        self.key = key;
        self
    }

    /// Sets a property, replacing any existing value in place.
    ///
    /// A replaced property keeps its original position in the bag.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.properties.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.properties.push((name, value));
        }
    }

    /// Returns a property value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns the full ordered property bag.
    #[must_use]
    pub fn properties(&self) -> &[(String, PropertyValue)] {
        &self.properties
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if the entity has no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Encodes this entity for the durable journal.
    ///
    /// The encoding is a canonical CBOR pair of the key path and the
    /// property bag as an array of `[name, value]` pairs, preserving
    /// property order exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if a property value cannot be encoded.
    pub fn to_wire_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut encoder = CanonicalEncoder::new();
        encoder.array_header(2);
        encoder.key_path(self.key.path());
        encoder.array_header(self.properties.len());
        for (name, value) in &self.properties {
            encoder.array_header(2);
            encoder.text(name);
            encoder.value(value)?;
        }
        Ok(encoder.into_bytes())
    }

    /// Decodes an entity produced by [`Entity::to_wire_bytes`].
    ///
    /// # Errors
    ///
    /// Returns an error for malformed bytes or an invalid embedded key.
    pub fn from_wire_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let mut decoder = CanonicalDecoder::new(bytes);
        if decoder.array_len()? != 2 {
            return Err(CodecError::invalid_structure(
                "entity encoding is not a [key, properties] pair",
            ));
        }
        let key = Key::from_path(decoder.key_path()?)?;
        let count = decoder.array_len()?;
        let mut properties = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            if decoder.array_len()? != 2 {
                return Err(CodecError::invalid_structure(
                    "entity property is not a [name, value] pair",
                ));
            }
            let name = decoder.text()?;
            let value = decoder.value()?;
            properties.push((name, value));
        }
        if !decoder.is_empty() {
            return Err(CodecError::invalid_structure(
                "trailing bytes after entity",
            ));
        }
        Ok(Self { key, properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entity {
        let mut entity = Entity::new(Key::with_id("Parent", 1).child_name("Person", "jim"));
        entity.set("name", "jim");
        entity.set("age", 41i64);
        entity.set("scores", vec![1i64, 2, 3]);
        entity
    }

    #[test]
    fn kind_follows_key() {
        let entity = sample();
        assert_eq!(entity.kind(), "Person");
        assert_eq!(entity.key().kind(), entity.kind());
    }

    #[test]
    fn set_replaces_in_place() {
        let mut entity = sample();
        entity.set("name", "robert");

        assert_eq!(entity.len(), 3);
        assert_eq!(entity.properties()[0].0, "name");
        assert_eq!(entity.get("name"), Some(&PropertyValue::Text("robert".into())));
    }

    #[test]
    fn get_missing_property() {
        assert_eq!(sample().get("missing"), None);
    }

    #[test]
    fn wire_roundtrip_preserves_order() {
        let entity = sample();
        let bytes = entity.to_wire_bytes().unwrap();
        let decoded = Entity::from_wire_bytes(&bytes).unwrap();

        assert_eq!(decoded, entity);
        let names: Vec<_> = decoded.properties().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "scores"]);
    }

    #[test]
    fn wire_roundtrip_empty_bag() {
        let entity = Entity::new(Key::with_id("Person", 2));
        let decoded = Entity::from_wire_bytes(&entity.to_wire_bytes().unwrap()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.key(), entity.key());
    }

    #[test]
    fn truncated_wire_bytes_fail() {
        let bytes = sample().to_wire_bytes().unwrap();
        assert!(Entity::from_wire_bytes(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut bytes = sample().to_wire_bytes().unwrap();
        bytes.push(0x00);
        assert!(matches!(
            Entity::from_wire_bytes(&bytes),
            Err(CodecError::InvalidStructure { .. })
        ));
    }
}
