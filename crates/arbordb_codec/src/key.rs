//! Hierarchical entity keys.
//!
//! A [`Key`] is an immutable path of `(kind, identifier)` pairs. The path
//! encodes the full ancestor chain of an entity: every element before the
//! last names an ancestor, and the last element names the entity itself.
//! Keys are plain values - freely cloned, compared element-wise, and never
//! mutated after creation.

use crate::decoder::CanonicalDecoder;
use crate::encoder::CanonicalEncoder;
use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifier part of a key path element.
///
/// An identifier is either a positive integer assigned by the store, a
/// caller-chosen name, or still unassigned. Only the final element of a
/// path may be unassigned; such a key is "incomplete" and becomes complete
/// when the store assigns a numeric id at first write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyId {
    /// No identifier yet; the store assigns one on first put.
    Unassigned,
    /// A store- or caller-assigned positive integer.
    Numeric(i64),
    /// A caller-assigned name.
    Named(String),
}

impl KeyId {
    /// Returns true if an identifier has been assigned.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

/// One `(kind, identifier)` element of a key path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathElement {
    /// The entity kind this element addresses.
    pub kind: String,
    /// The identifier within that kind.
    pub id: KeyId,
}

impl PathElement {
    /// Creates a path element.
    pub fn new(kind: impl Into<String>, id: KeyId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// An immutable hierarchical key addressing a single entity.
///
/// # Example
///
/// ```
/// use arbordb_codec::Key;
///
/// let parent = Key::with_id("Project", 7);
/// let child = parent.child_name("Task", "cleanup");
///
/// assert_eq!(child.kind(), "Task");
/// assert!(parent.is_ancestor_of(&child));
///
/// let token = child.encode();
/// assert_eq!(Key::decode(&token).unwrap(), child);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    path: Vec<PathElement>,
}

impl Key {
    /// Creates an incomplete root key of the given kind.
    ///
    /// The store assigns a numeric identifier when the entity is first put.
    #[must_use]
    pub fn root(kind: impl Into<String>) -> Self {
        Self {
            path: vec![PathElement::new(kind, KeyId::Unassigned)],
        }
    }

    /// Creates a complete root key with a numeric identifier.
    #[must_use]
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            path: vec![PathElement::new(kind, KeyId::Numeric(id))],
        }
    }

    /// Creates a complete root key with a caller-assigned name.
    #[must_use]
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: vec![PathElement::new(kind, KeyId::Named(name.into()))],
        }
    }

    /// Creates a key from raw path elements.
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::InvalidKeyFormat`] if the path violates a
    /// key invariant (see [`Key::validate`]).
    pub fn from_path(path: Vec<PathElement>) -> CodecResult<Self> {
        let key = Self { path };
        key.validate()?;
        Ok(key)
    }

    /// Creates an incomplete child key under this key.
    ///
    /// The parent must be complete; the child's identifier is assigned by
    /// the store at first put.
    #[must_use]
    pub fn child(&self, kind: impl Into<String>) -> Self {
        self.child_with(kind, KeyId::Unassigned)
    }

    /// Creates a complete child key with a numeric identifier.
    #[must_use]
    pub fn child_id(&self, kind: impl Into<String>, id: i64) -> Self {
        self.child_with(kind, KeyId::Numeric(id))
    }

    /// Creates a complete child key with a caller-assigned name.
    #[must_use]
    pub fn child_name(&self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.child_with(kind, KeyId::Named(name.into()))
    }

    fn child_with(&self, kind: impl Into<String>, id: KeyId) -> Self {
        debug_assert!(self.is_complete(), "parent key must be complete");
        let mut path = self.path.clone();
        path.push(PathElement::new(kind, id));
        Self { path }
    }

    /// Returns this key re-rooted under `parent`.
    ///
    /// The parent's path is prepended to this key's path, so a root key
    /// built in isolation can be adopted into an ancestor chain. The
    /// parent must be complete.
    #[must_use]
    pub fn with_ancestor(&self, parent: &Self) -> Self {
        debug_assert!(parent.is_complete(), "parent key must be complete");
        let mut path = parent.path.clone();
        path.extend(self.path.iter().cloned());
        Self { path }
    }

    /// Returns a copy of this key with `id` assigned to the final element.
    ///
    /// Used by the store when it allocates a numeric identifier for an
    /// incomplete key.
    #[must_use]
    pub fn assigned(&self, id: i64) -> Self {
        let mut path = self.path.clone();
        if let Some(last) = path.last_mut() {
            last.id = KeyId::Numeric(id);
        }
        Self { path }
    }

    /// Returns the kind of the entity this key addresses (the final
    /// element's kind).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.last().kind
    }

    /// Returns the identifier of the final path element.
    #[must_use]
    pub fn id(&self) -> &KeyId {
        &self.last().id
    }

    /// Returns the numeric identifier of the final element, if it has one.
    #[must_use]
    pub fn numeric_id(&self) -> Option<i64> {
        match self.id() {
            KeyId::Numeric(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the name of the final element, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self.id() {
            KeyId::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the parent key, or `None` for a root key.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Returns the full path of this key.
    #[must_use]
    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    /// Returns the number of path elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Returns true if the final element has an assigned identifier.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last().id.is_assigned()
    }

    /// Returns true if this key's path is a strict prefix of `other`'s.
    ///
    /// A key is not its own ancestor; queries scoped to an ancestor return
    /// only strict descendants.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.path.len() > self.path.len() && other.path[..self.path.len()] == self.path[..]
    }

    /// Checks the key invariants.
    ///
    /// A well-formed key has a non-empty path, a non-empty kind in every
    /// element, strictly positive numeric identifiers, non-empty names,
    /// and at most the final element unassigned.
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::InvalidKeyFormat`] naming the violated
    /// invariant.
    pub fn validate(&self) -> CodecResult<()> {
        if self.path.is_empty() {
            return Err(CodecError::invalid_key_format("empty key path"));
        }
        for (i, element) in self.path.iter().enumerate() {
            if element.kind.is_empty() {
                return Err(CodecError::invalid_key_format("empty kind in key path"));
            }
            match &element.id {
                KeyId::Unassigned if i + 1 < self.path.len() => {
                    return Err(CodecError::invalid_key_format(
                        "ancestor element without an identifier",
                    ));
                }
                KeyId::Numeric(id) if *id <= 0 => {
                    return Err(CodecError::invalid_key_format(format!(
                        "non-positive numeric identifier: {id}"
                    )));
                }
                KeyId::Named(name) if name.is_empty() => {
                    return Err(CodecError::invalid_key_format("empty name identifier"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Encodes this key as a durable, URL-safe token.
    ///
    /// The token is the hex encoding of a canonical CBOR array of
    /// `[kind, id]` pairs, so it round-trips unambiguously even when a
    /// name contains separator-like characters.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut encoder = CanonicalEncoder::new();
        encoder.key_path(&self.path);
        hex::encode(encoder.into_bytes())
    }

    /// Decodes a key from a token produced by [`Key::encode`].
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::InvalidKeyFormat`] if the token is not
    /// valid hex, not a well-formed path array, or violates a key
    /// invariant.
    pub fn decode(token: &str) -> CodecResult<Self> {
        let bytes = hex::decode(token)
            .map_err(|e| CodecError::invalid_key_format(format!("invalid hex token: {e}")))?;
        let mut decoder = CanonicalDecoder::new(&bytes);
        let path = decoder
            .key_path()
            .map_err(|e| CodecError::invalid_key_format(e.to_string()))?;
        if !decoder.is_empty() {
            return Err(CodecError::invalid_key_format(
                "trailing bytes after key path",
            ));
        }
        Self::from_path(path)
    }

    /// Returns the canonical byte representation of this key.
    ///
    /// Stores use these bytes as the primary row key; byte order equals
    /// the key's `Ord` order within a kind.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut encoder = CanonicalEncoder::new();
        encoder.key_path(&self.path);
        encoder.into_bytes()
    }

    fn last(&self) -> &PathElement {
        // Invariant: path is non-empty for every constructible key.
        &self.path[self.path.len() - 1]
    }
}

impl fmt::Display for Key {
    /// Human-readable rendering for logs and errors; not reversible.
    /// Use [`Key::encode`] for the wire representation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match &element.id {
                KeyId::Unassigned => write!(f, "{}:?", element.kind)?,
                KeyId::Numeric(id) => write!(f, "{}:{}", element.kind, id)?,
                KeyId::Named(name) => write!(f, "{}:{}", element.kind, name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_key_is_incomplete() {
        let key = Key::root("Person");
        assert!(!key.is_complete());
        assert_eq!(key.kind(), "Person");
        assert_eq!(key.numeric_id(), None);
    }

    #[test]
    fn assigned_completes_key() {
        let key = Key::root("Person").assigned(42);
        assert!(key.is_complete());
        assert_eq!(key.numeric_id(), Some(42));
    }

    #[test]
    fn named_key() {
        let key = Key::with_name("Person", "xpto");
        assert!(key.is_complete());
        assert_eq!(key.name(), Some("xpto"));
        assert_eq!(key.numeric_id(), None);
    }

    #[test]
    fn child_keys_extend_path() {
        let parent = Key::with_id("Parent", 1);
        let child = parent.child_id("Person", 1);
        assert_eq!(child.depth(), 2);
        assert_eq!(child.kind(), "Person");
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn with_ancestor_prepends_parent_path() {
        let parent = Key::with_id("Project", 1);
        let task = Key::with_id("Task", 5);
        let adopted = task.with_ancestor(&parent);

        assert_eq!(adopted, parent.child_id("Task", 5));
        assert_eq!(adopted.parent(), Some(parent));
        // The original keys are untouched.
        assert_eq!(task.depth(), 1);
    }

    #[test]
    fn keys_equal_iff_paths_equal() {
        let a = Key::with_id("Parent", 1).child_id("Person", 1);
        let b = Key::with_id("Parent", 1).child_id("Person", 1);
        let c = Key::with_id("Parent", 2).child_id("Person", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ancestor_is_strict_prefix() {
        let parent = Key::with_id("Parent", 1);
        let child = parent.child_id("Child", 1);
        let grandchild = child.child_id("Person", 1);

        assert!(parent.is_ancestor_of(&child));
        assert!(parent.is_ancestor_of(&grandchild));
        assert!(child.is_ancestor_of(&grandchild));
        assert!(!parent.is_ancestor_of(&parent));
        assert!(!child.is_ancestor_of(&parent));
    }

    #[test]
    fn divergent_parent_is_not_ancestor() {
        let child = Key::with_id("Parent", 1).child_id("Person", 1);
        let other_parent = Key::with_id("Parent", 2);
        assert!(!other_parent.is_ancestor_of(&child));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let key = Key::with_id("Parent", 1).child_name("Person", "jim");
        let token = key.encode();
        assert_eq!(Key::decode(&token).unwrap(), key);
    }

    #[test]
    fn roundtrip_with_separator_characters_in_name() {
        let key = Key::with_name("Person", "a/b:c/d?");
        let decoded = Key::decode(&key.encode()).unwrap();
        assert_eq!(decoded.name(), Some("a/b:c/d?"));
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Key::decode("not hex!"),
            Err(CodecError::InvalidKeyFormat { .. })
        ));
        assert!(matches!(
            Key::decode("deadbeef"),
            Err(CodecError::InvalidKeyFormat { .. })
        ));
    }

    #[test]
    fn validate_rejects_incomplete_ancestor() {
        let path = vec![
            PathElement::new("Parent", KeyId::Unassigned),
            PathElement::new("Person", KeyId::Numeric(1)),
        ];
        assert!(matches!(
            Key::from_path(path),
            Err(CodecError::InvalidKeyFormat { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_positive_id() {
        assert!(Key::with_id("Person", 0).validate().is_err());
        assert!(Key::with_id("Person", -3).validate().is_err());
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let key = Key::with_id("Person", 9).child_name("Pet", "rex");
        assert_eq!(key.canonical_bytes(), key.canonical_bytes());
        let other = Key::with_id("Person", 9).child_name("Pet", "re");
        assert_ne!(key.canonical_bytes(), other.canonical_bytes());
    }

    #[test]
    fn display_is_readable() {
        let key = Key::with_id("Parent", 1).child_name("Person", "jim");
        assert_eq!(format!("{key}"), "Parent:1/Person:jim");
        assert_eq!(format!("{}", Key::root("Person")), "Person:?");
    }
}
