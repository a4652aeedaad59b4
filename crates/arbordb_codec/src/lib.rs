//! # ArborDB Codec
//!
//! Data model and canonical wire encodings for ArborDB.
//!
//! This crate provides:
//! - [`Key`] - immutable hierarchical keys encoding an ancestor path
//! - [`Entity`] - a key plus an ordered, typed property bag
//! - [`PropertyValue`] - the scalar/list value model with one total order
//! - [`CursorToken`] - opaque query resumption tokens
//! - Canonical CBOR encoding/decoding for all of the above
//!
//! ## Canonical encoding rules
//!
//! - Integers use the shortest encoding
//! - Floats are always 8-byte doubles; NaN is rejected
//! - No indefinite-length items
//! - Strings must be UTF-8
//! - Timestamps are tag 1 with integer epoch milliseconds
//! - Key references are tag 39 with the key path array
//!
//! Identical values always encode to identical bytes, so encoded keys can
//! serve as row keys and encoded query shapes can be fingerprinted.
//!
//! ## Usage
//!
//! ```
//! use arbordb_codec::{from_cbor, to_canonical_cbor, Key, PropertyValue};
//!
//! let value = PropertyValue::Integer(42);
//! let bytes = to_canonical_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//!
//! let key = Key::with_id("Person", 7).child_name("Pet", "rex");
//! assert_eq!(Key::decode(&key.encode()).unwrap(), key);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod decoder;
mod encoder;
mod entity;
mod error;
mod key;
mod value;

pub use cursor::CursorToken;
pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use entity::Entity;
pub use error::{CodecError, CodecResult};
pub use key::{Key, KeyId, PathElement};
pub use value::PropertyValue;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            Just(PropertyValue::Null),
            any::<bool>().prop_map(PropertyValue::Bool),
            any::<i64>().prop_map(PropertyValue::Integer),
            // Finite floats only; the encoder rejects NaN by design.
            (-1.0e12f64..1.0e12).prop_map(PropertyValue::Float),
            ".*".prop_map(PropertyValue::Text),
        ]
    }

    fn arb_value() -> impl Strategy<Value = PropertyValue> {
        prop_oneof![
            arb_scalar(),
            proptest::collection::vec(arb_scalar(), 0..8).prop_map(PropertyValue::List),
        ]
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        let element = ("[A-Za-z][A-Za-z0-9]{0,8}", arb_key_id());
        proptest::collection::vec(element, 1..4).prop_map(|elements| {
            let mut iter = elements.into_iter();
            let (kind, id) = iter.next().unwrap();
            let mut key = match id {
                KeyId::Numeric(n) => Key::with_id(kind, n),
                KeyId::Named(name) => Key::with_name(kind, name),
                KeyId::Unassigned => unreachable!(),
            };
            for (kind, id) in iter {
                key = match id {
                    KeyId::Numeric(n) => key.child_id(kind, n),
                    KeyId::Named(name) => key.child_name(kind, name),
                    KeyId::Unassigned => unreachable!(),
                };
            }
            key
        })
    }

    fn arb_key_id() -> impl Strategy<Value = KeyId> {
        prop_oneof![
            (1i64..1_000_000).prop_map(KeyId::Numeric),
            "[^\u{0}]{1,12}".prop_map(KeyId::Named),
        ]
    }

    proptest! {
        #[test]
        fn value_roundtrips(value in arb_value()) {
            let bytes = to_canonical_cbor(&value).unwrap();
            prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
        }

        #[test]
        fn key_token_roundtrips(key in arb_key()) {
            prop_assert_eq!(Key::decode(&key.encode()).unwrap(), key);
        }

        #[test]
        fn entity_wire_roundtrips(
            key in arb_key(),
            props in proptest::collection::vec(("[a-z]{1,8}", arb_value()), 0..6)
        ) {
            let mut entity = Entity::new(key);
            for (name, value) in props {
                entity.set(name, value);
            }
            let bytes = entity.to_wire_bytes().unwrap();
            prop_assert_eq!(Entity::from_wire_bytes(&bytes).unwrap(), entity);
        }

        #[test]
        fn cursor_roundtrips(shape in any::<[u8; 8]>(), offset in any::<u64>()) {
            let cursor = CursorToken { shape, offset };
            prop_assert_eq!(CursorToken::decode(&cursor.encode()).unwrap(), cursor);
        }

        #[test]
        fn total_order_is_consistent(a in arb_value(), b in arb_value(), c in arb_value()) {
            use std::cmp::Ordering;
            // Antisymmetry
            prop_assert_eq!(a.cmp_total(&b), b.cmp_total(&a).reverse());
            // Transitivity of <=
            if a.cmp_total(&b) != Ordering::Greater && b.cmp_total(&c) != Ordering::Greater {
                prop_assert_ne!(a.cmp_total(&c), Ordering::Greater);
            }
        }
    }
}
