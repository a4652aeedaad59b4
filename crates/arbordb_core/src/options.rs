//! Query options documents.
//!
//! A query can be configured from a structured JSON document instead of
//! fluent calls - the form the HTTP layer hands through:
//!
//! ```json
//! {
//!   "where": ["age", "=", 30, "name", "=", "jim"],
//!   "order": [{"p": "name", "d": "desc"}],
//!   "limit": 2
//! }
//! ```
//!
//! Absent keys stay absent - they map to `None`, never to defaults.

use crate::error::{CoreError, CoreResult};
use arbordb_codec::PropertyValue;
use arbordb_store::{Direction, PropertyOrder};
use serde_json::Value as JsonValue;

/// One `(property, operator token, value)` where-triple.
pub type WhereTriple = (String, String, PropertyValue);

/// Parsed query options.
///
/// Apply to a builder with [`crate::Query::options`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    wheres: Option<Vec<WhereTriple>>,
    orders: Option<Vec<PropertyOrder>>,
    limit: Option<usize>,
}

impl QueryOptions {
    /// Parses an options document.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOptions`] if the document is not a
    /// JSON object, the `where` array's length is not a multiple of 3,
    /// a direction token is unrecognized, or a value has no property
    /// representation. Operator tokens are kept verbatim; the builder
    /// validates them before execution.
    pub fn parse(document: &str) -> CoreResult<Self> {
        let root: JsonValue = serde_json::from_str(document)
            .map_err(|e| CoreError::invalid_options(format!("not valid JSON: {e}")))?;
        let JsonValue::Object(fields) = root else {
            return Err(CoreError::invalid_options("document must be an object"));
        };

        let wheres = match fields.get("where") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Array(items)) => Some(Self::parse_where(items)?),
            Some(_) => {
                return Err(CoreError::invalid_options("where must be an array"));
            }
        };

        let orders = match fields.get("order") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Array(items)) => Some(Self::parse_orders(items)?),
            Some(_) => {
                return Err(CoreError::invalid_options("order must be an array"));
            }
        };

        let limit = match fields.get("limit") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Number(n)) => {
                let limit = n
                    .as_u64()
                    .ok_or_else(|| CoreError::invalid_options("limit must be a non-negative integer"))?;
                Some(usize::try_from(limit).map_err(|_| {
                    CoreError::invalid_options("limit out of range")
                })?)
            }
            Some(_) => {
                return Err(CoreError::invalid_options("limit must be an integer"));
            }
        };

        Ok(Self {
            wheres,
            orders,
            limit,
        })
    }

    /// Returns the parsed where-triples, if the document declared any.
    #[must_use]
    pub fn wheres(&self) -> Option<&[WhereTriple]> {
        self.wheres.as_deref()
    }

    /// Returns the parsed orders, if the document declared any.
    #[must_use]
    pub fn orders(&self) -> Option<&[PropertyOrder]> {
        self.orders.as_deref()
    }

    /// Returns the parsed limit, if the document declared one.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn parse_where(items: &[JsonValue]) -> CoreResult<Vec<WhereTriple>> {
        if items.len() % 3 != 0 {
            return Err(CoreError::invalid_options(format!(
                "where length must be a multiple of 3, got {}",
                items.len()
            )));
        }

        let mut triples = Vec::with_capacity(items.len() / 3);
        for chunk in items.chunks_exact(3) {
            let property = chunk[0]
                .as_str()
                .ok_or_else(|| CoreError::invalid_options("where property must be a string"))?;
            let operator = chunk[1]
                .as_str()
                .ok_or_else(|| CoreError::invalid_options("where operator must be a string"))?;
            let value = Self::to_property_value(&chunk[2])?;
            triples.push((property.to_string(), operator.to_string(), value));
        }
        Ok(triples)
    }

    fn parse_orders(items: &[JsonValue]) -> CoreResult<Vec<PropertyOrder>> {
        let mut orders = Vec::with_capacity(items.len());
        for item in items {
            let JsonValue::Object(fields) = item else {
                return Err(CoreError::invalid_options("order entry must be an object"));
            };
            let property = fields
                .get("p")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| CoreError::invalid_options("order entry needs a property p"))?;
            let direction = match fields.get("d") {
                None | Some(JsonValue::Null) => Direction::Ascending,
                Some(JsonValue::String(token)) => Direction::from_token(token).ok_or_else(|| {
                    CoreError::invalid_options(format!("unknown direction: {token:?}"))
                })?,
                Some(_) => {
                    return Err(CoreError::invalid_options("direction d must be a string"));
                }
            };
            orders.push(PropertyOrder::new(property, direction));
        }
        Ok(orders)
    }

    /// Converts a JSON scalar or array to a property value.
    ///
    /// Whole numbers become integers, other numbers become floats -
    /// matching the widening the original wire format applied to numeric
    /// literals.
    fn to_property_value(value: &JsonValue) -> CoreResult<PropertyValue> {
        match value {
            JsonValue::Null => Ok(PropertyValue::Null),
            JsonValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(PropertyValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(PropertyValue::Float(f))
                } else {
                    Err(CoreError::invalid_options(format!(
                        "number out of range: {n}"
                    )))
                }
            }
            JsonValue::String(s) => Ok(PropertyValue::Text(s.clone())),
            JsonValue::Array(items) => {
                let values = items
                    .iter()
                    .map(Self::to_property_value)
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(PropertyValue::List(values))
            }
            JsonValue::Object(_) => Err(CoreError::invalid_options(
                "objects are not valid filter values",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_has_no_options() {
        let options = QueryOptions::parse("{}").unwrap();
        assert!(options.wheres().is_none());
        assert!(options.orders().is_none());
        assert!(options.limit().is_none());
    }

    #[test]
    fn full_document() {
        let options = QueryOptions::parse(
            r#"{"where": ["aLong", "=", 1, "aInt", "=", 3, "aDouble", "=", 4.3],
                "order": [{"p": "aString", "d": "desc"}],
                "limit": 2}"#,
        )
        .unwrap();

        let wheres = options.wheres().unwrap();
        assert_eq!(
            wheres,
            &[
                ("aLong".into(), "=".into(), PropertyValue::Integer(1)),
                ("aInt".into(), "=".into(), PropertyValue::Integer(3)),
                ("aDouble".into(), "=".into(), PropertyValue::Float(4.3)),
            ]
        );

        let orders = options.orders().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].property, "aString");
        assert_eq!(orders[0].direction, Direction::Descending);

        assert_eq!(options.limit(), Some(2));
    }

    #[test]
    fn order_direction_defaults_to_ascending() {
        let options = QueryOptions::parse(r#"{"order": [{"p": "name"}]}"#).unwrap();
        assert_eq!(options.orders().unwrap()[0].direction, Direction::Ascending);
    }

    #[test]
    fn list_values_parse_for_in_filters() {
        let options =
            QueryOptions::parse(r#"{"where": ["age", "in", [1, 2, 3]]}"#).unwrap();
        let wheres = options.wheres().unwrap();
        assert_eq!(wheres[0].2, PropertyValue::from(vec![1i64, 2, 3]));
    }

    #[test]
    fn ragged_where_is_rejected() {
        assert!(matches!(
            QueryOptions::parse(r#"{"where": ["age", "="]}"#),
            Err(CoreError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn unknown_direction_is_rejected() {
        assert!(matches!(
            QueryOptions::parse(r#"{"order": [{"p": "name", "d": "sideways"}]}"#),
            Err(CoreError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn negative_limit_is_rejected() {
        assert!(matches!(
            QueryOptions::parse(r#"{"limit": -1}"#),
            Err(CoreError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            QueryOptions::parse("[1, 2]"),
            Err(CoreError::InvalidOptions { .. })
        ));
        assert!(matches!(
            QueryOptions::parse("not json"),
            Err(CoreError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn operator_tokens_pass_through_unvalidated() {
        // Operator validation is the builder's job, before execution.
        let options = QueryOptions::parse(r#"{"where": ["age", "~", 1]}"#).unwrap();
        assert_eq!(options.wheres().unwrap()[0].1, "~");
    }
}
