//! Native query representation.

use crate::datastore::Namespace;
use arbordb_codec::{CanonicalEncoder, CodecResult, CursorToken, Entity, Key, PropertyValue};
use sha2::{Digest, Sha256};
use std::fmt;

/// A comparison operator in a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// `=`
    Equal,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `!=`
    NotEqual,
    /// `in` - the operand is a list of candidate values.
    In,
}

impl FilterOperator {
    /// Parses an operator token.
    ///
    /// Recognizes `=`, `>`, `>=`, `<`, `<=`, `!=` exactly and `in` in any
    /// case. Returns `None` for anything else.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Equal),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqual),
            "!=" => Some(Self::NotEqual),
            _ if token.eq_ignore_ascii_case("in") => Some(Self::In),
            _ => None,
        }
    }

    /// Returns the canonical token for this operator.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::NotEqual => "!=",
            Self::In => "in",
        }
    }

    /// Returns true for operators that constrain a property range.
    ///
    /// The engine supports range constraints on at most one property per
    /// query, like the native index it models.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        matches!(
            self,
            Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::NotEqual
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl Direction {
    /// Parses a direction token (`asc` or `desc`, any case).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") {
            Some(Self::Ascending)
        } else if token.eq_ignore_ascii_case("desc") {
            Some(Self::Descending)
        } else {
            None
        }
    }

    /// Returns the canonical token for this direction.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    /// Applies this direction to an ascending comparison result.
    ///
    /// Descending reverses the comparison only; it never changes
    /// tie-break precedence.
    #[must_use]
    pub fn apply(self, ord: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Ascending => ord,
            Self::Descending => ord.reverse(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// One property filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    /// The stored property name to test.
    pub property: String,
    /// The comparison operator.
    pub operator: FilterOperator,
    /// The comparison operand.
    pub value: PropertyValue,
}

/// One `(property, direction)` sort declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyOrder {
    /// The property to sort by.
    pub property: String,
    /// The sort direction.
    pub direction: Direction,
}

impl PropertyOrder {
    /// Creates a sort declaration.
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }
}

/// A single-kind query the storage engine executes natively.
///
/// Filters combine with logical AND. Orders apply in declaration order
/// with the entity's canonical key bytes as the final tiebreak, which
/// makes the result ordering - and therefore cursor positions - fully
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    /// The entity kind to query.
    pub kind: String,
    /// Restrict results to strict descendants of this key.
    pub ancestor: Option<Key>,
    /// Property filter predicates, ANDed together.
    pub filters: Vec<PropertyFilter>,
    /// Native sort declarations.
    pub orders: Vec<PropertyOrder>,
    /// Maximum number of entities to return.
    pub limit: Option<usize>,
    /// Resume after the position this cursor marks.
    pub start_cursor: Option<CursorToken>,
}

impl NativeQuery {
    /// Creates an unconstrained query over a kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ancestor: None,
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            start_cursor: None,
        }
    }

    /// Fingerprints this query's shape within a namespace.
    ///
    /// The shape covers everything that determines the result ordering -
    /// namespace, kind, ancestor, filters, and orders - but not the limit
    /// or cursor, so pages of the same logical query share a fingerprint.
    /// Cursors are valid only against the shape that produced them.
    ///
    /// # Errors
    ///
    /// Fails if a filter operand cannot be canonically encoded (NaN).
    pub fn shape_fingerprint(&self, ns: &Namespace) -> CodecResult<[u8; 8]> {
        let mut encoder = CanonicalEncoder::new();
        encoder.array_header(5);
        encoder.text(ns.as_str());
        encoder.text(&self.kind);
        match &self.ancestor {
            Some(key) => encoder.key_path(key.path()),
            None => encoder.array_header(0),
        }
        encoder.array_header(self.filters.len());
        for filter in &self.filters {
            encoder.array_header(3);
            encoder.text(&filter.property);
            encoder.text(filter.operator.as_token());
            encoder.value(&filter.value)?;
        }
        encoder.array_header(self.orders.len());
        for order in &self.orders {
            encoder.array_header(2);
            encoder.text(&order.property);
            encoder.text(order.direction.as_token());
        }

        let digest = Sha256::digest(encoder.into_bytes());
        let mut shape = [0u8; 8];
        shape.copy_from_slice(&digest[..8]);
        Ok(shape)
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    /// The entities on this page, in result order.
    pub entities: Vec<Entity>,
    /// Cursor resuming immediately after the last entity on this page.
    pub next_cursor: CursorToken,
}
