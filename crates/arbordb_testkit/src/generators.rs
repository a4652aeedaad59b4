//! Proptest generators for ArborDB values, keys, and entities.

use arbordb_codec::{Entity, Key, KeyId, PropertyValue};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

/// Strategy producing scalar property values.
///
/// Floats are finite; the canonical encoder rejects NaN.
pub fn arb_scalar() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        Just(PropertyValue::Null),
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Integer),
        (-1.0e12f64..1.0e12).prop_map(PropertyValue::Float),
        "\\PC{0,24}".prop_map(PropertyValue::Text),
        (0i64..4_102_444_800_000).prop_map(|millis| {
            PropertyValue::Timestamp(Utc.timestamp_millis_opt(millis).unwrap())
        }),
        arb_key().prop_map(PropertyValue::KeyRef),
    ]
}

/// Strategy producing scalar or list property values.
pub fn arb_value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        4 => arb_scalar(),
        1 => proptest::collection::vec(arb_scalar(), 0..6).prop_map(PropertyValue::List),
    ]
}

/// Strategy producing complete keys with one to three path elements.
pub fn arb_key() -> impl Strategy<Value = Key> {
    let element = (arb_kind(), arb_key_id());
    proptest::collection::vec(element, 1..4).prop_map(|elements| {
        let mut iter = elements.into_iter();
        let (kind, id) = iter.next().unwrap();
        let mut key = match id {
            KeyId::Numeric(n) => Key::with_id(kind, n),
            KeyId::Named(name) => Key::with_name(kind, name),
            KeyId::Unassigned => unreachable!("generator only yields assigned ids"),
        };
        for (kind, id) in iter {
            key = match id {
                KeyId::Numeric(n) => key.child_id(kind, n),
                KeyId::Named(name) => key.child_name(kind, name),
                KeyId::Unassigned => unreachable!("generator only yields assigned ids"),
            };
        }
        key
    })
}

/// Strategy producing entity kind names.
pub fn arb_kind() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9]{0,11}"
}

/// Strategy producing assigned key identifiers.
pub fn arb_key_id() -> impl Strategy<Value = KeyId> {
    prop_oneof![
        (1i64..1_000_000).prop_map(KeyId::Numeric),
        "[a-z0-9_./:-]{1,16}".prop_map(KeyId::Named),
    ]
}

/// Strategy producing entities with up to eight properties.
pub fn arb_entity() -> impl Strategy<Value = Entity> {
    (
        arb_key(),
        proptest::collection::vec(("[a-z][a-z0-9_]{0,11}", arb_value()), 0..8),
    )
        .prop_map(|(key, properties)| {
            let mut entity = Entity::new(key);
            for (name, value) in properties {
                entity.set(name, value);
            }
            entity
        })
}
