//! The schema trait mapping application types to entities.

use crate::error::{CoreError, CoreResult};
use crate::query::ChildLoader;
use arbordb_codec::{Entity, Key, PropertyValue};
use arbordb_store::Namespace;

/// Maps an application type onto the entity store.
///
/// This trait is the whole object/entity conversion boundary: the kind
/// name, the key slot, the property bag conversion, the logical-to-stored
/// property name mapping, value coercions, and declared child-list
/// relations are all resolved here, at compile time, rather than by any
/// runtime reflection.
///
/// # Example
///
/// ```
/// use arbordb_codec::{Entity, Key, PropertyValue};
/// use arbordb_core::{CoreError, CoreResult, EntityModel};
///
/// struct Person {
///     key: Option<Key>,
///     name: String,
/// }
///
/// impl EntityModel for Person {
///     const KIND: &'static str = "Person";
///
///     fn key(&self) -> Option<Key> {
///         self.key.clone()
///     }
///
///     fn set_key(&mut self, key: Key) {
///         self.key = Some(key);
///     }
///
///     fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
///         Ok(vec![("name".into(), self.name.clone().into())])
///     }
///
///     fn from_entity(entity: &Entity) -> CoreResult<Self> {
///         let name = entity
///             .get("name")
///             .and_then(|v| v.as_text())
///             .ok_or_else(|| CoreError::conversion("missing name"))?;
///         Ok(Person {
///             key: Some(entity.key().clone()),
///             name: name.to_string(),
///         })
///     }
/// }
/// ```
pub trait EntityModel: Sized {
    /// The storage kind for this type, analogous to a table name.
    const KIND: &'static str;

    /// Returns this object's key, or `None` if it has never been saved.
    fn key(&self) -> Option<Key>;

    /// Stores the key assigned at save time back onto the object.
    fn set_key(&mut self, key: Key);

    /// Converts this object's fields to an ordered property bag.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Conversion`] when a field cannot be
    /// represented as a property value.
    fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>>;

    /// Reconstructs an object from a stored entity.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Conversion`] when the entity's bag does
    /// not match this type's fields.
    fn from_entity(entity: &Entity) -> CoreResult<Self>;

    /// Maps a logical property name to its stored, indexable name.
    ///
    /// The default is the identity mapping.
    #[must_use]
    fn index_property(property: &str) -> String {
        property.to_string()
    }

    /// Coerces a filter operand to the stored representation of a
    /// property.
    ///
    /// The default passes the value through unchanged; implementations
    /// override this for denormalized or width-coerced fields.
    #[must_use]
    fn index_value(property: &str, value: PropertyValue) -> PropertyValue {
        let _ = property;
        value
    }

    /// Returns the tenant namespace for this type.
    ///
    /// Derived deterministically from the kind by default.
    #[must_use]
    fn namespace() -> Namespace {
        Namespace::for_kind(Self::KIND)
    }

    /// Populates declared child-list relations after a direct key lookup.
    ///
    /// Implementations fetch each declared child collection through the
    /// loader and attach the results. The default declares no relations.
    ///
    /// # Errors
    ///
    /// Propagates query failures from the loader.
    fn load_children(&mut self, loader: &ChildLoader<'_>) -> CoreResult<()> {
        let _ = loader;
        Ok(())
    }

    /// Converts this object to an entity ready for the store.
    ///
    /// An object without a key gets an incomplete root key of its kind;
    /// the store assigns the identifier at put time.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Conversion`] if the object's key has a
    /// different kind, or if a field cannot be converted.
    fn to_entity(&self) -> CoreResult<Entity> {
        let key = self.key().unwrap_or_else(|| Key::root(Self::KIND));
        if key.kind() != Self::KIND {
            return Err(CoreError::conversion(format!(
                "key kind {:?} does not match model kind {:?}",
                key.kind(),
                Self::KIND
            )));
        }
        let mut entity = Entity::new(key);
        for (name, value) in self.to_properties()? {
            entity.set(name, value);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        key: Option<Key>,
        count: i64,
    }

    impl EntityModel for Widget {
        const KIND: &'static str = "Widget";

        fn key(&self) -> Option<Key> {
            self.key.clone()
        }

        fn set_key(&mut self, key: Key) {
            self.key = Some(key);
        }

        fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
            Ok(vec![("count".into(), self.count.into())])
        }

        fn from_entity(entity: &Entity) -> CoreResult<Self> {
            let count = entity
                .get("count")
                .and_then(|v| v.as_integer())
                .ok_or_else(|| CoreError::conversion("missing count"))?;
            Ok(Self {
                key: Some(entity.key().clone()),
                count,
            })
        }
    }

    #[test]
    fn unsaved_model_gets_incomplete_root_key() {
        let widget = Widget {
            key: None,
            count: 3,
        };
        let entity = widget.to_entity().unwrap();
        assert_eq!(entity.kind(), "Widget");
        assert!(!entity.key().is_complete());
        assert_eq!(entity.get("count"), Some(&PropertyValue::Integer(3)));
    }

    #[test]
    fn saved_model_keeps_its_key() {
        let widget = Widget {
            key: Some(Key::with_id("Widget", 5)),
            count: 1,
        };
        let entity = widget.to_entity().unwrap();
        assert_eq!(entity.key(), &Key::with_id("Widget", 5));
    }

    #[test]
    fn mismatched_key_kind_is_rejected() {
        let widget = Widget {
            key: Some(Key::with_id("Gadget", 5)),
            count: 1,
        };
        assert!(matches!(
            widget.to_entity(),
            Err(CoreError::Conversion { .. })
        ));
    }

    #[test]
    fn entity_roundtrip() {
        let widget = Widget {
            key: Some(Key::with_id("Widget", 5)),
            count: 9,
        };
        let restored = Widget::from_entity(&widget.to_entity().unwrap()).unwrap();
        assert_eq!(restored.count, 9);
        assert_eq!(restored.key, widget.key);
    }

    #[test]
    fn default_namespace_derives_from_kind() {
        assert_eq!(Widget::namespace(), Namespace::for_kind("Widget"));
    }

    #[test]
    fn default_index_mapping_is_identity() {
        assert_eq!(Widget::index_property("count"), "count");
        assert_eq!(
            Widget::index_value("count", PropertyValue::Integer(1)),
            PropertyValue::Integer(1)
        );
    }
}
