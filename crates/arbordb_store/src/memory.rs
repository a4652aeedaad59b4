//! In-memory storage engine.

use crate::datastore::{Datastore, Namespace};
use crate::error::{StoreError, StoreResult};
use crate::query::{FilterOperator, NativeQuery, PropertyFilter, QueryResponse};
use arbordb_codec::{CursorToken, Entity, Key, KeyId, PropertyValue};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One namespace's entity table.
#[derive(Debug, Default)]
struct Table {
    /// Rows keyed by the canonical key bytes.
    rows: BTreeMap<Vec<u8>, Entity>,
    /// High-water mark for assigned numeric identifiers.
    last_id: i64,
}

impl Table {
    /// Allocates the next numeric identifier.
    fn allocate_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Raises the high-water mark past a caller-forced identifier so a
    /// later allocation can never collide with it.
    fn observe_id(&mut self, id: i64) {
        self.last_id = self.last_id.max(id);
    }
}

/// An in-memory storage engine.
///
/// Entities live in namespace-partitioned tables keyed by their canonical
/// key bytes. This engine is the semantics reference for the [`Datastore`]
/// contract and backs [`crate::JournalDatastore`] after replay.
///
/// # Thread Safety
///
/// All tables sit behind a single `RwLock`; individual puts and deletes
/// are atomic per key, and conflicting writes to the same key serialize on
/// the table lock.
///
/// # Example
///
/// ```
/// use arbordb_codec::{Entity, Key};
/// use arbordb_store::{Datastore, MemoryDatastore, Namespace};
///
/// let store = MemoryDatastore::new();
/// let ns = Namespace::for_kind("Person");
///
/// let mut entity = Entity::new(Key::root("Person"));
/// entity.set("name", "jim");
///
/// let key = store.put(&ns, entity).unwrap();
/// assert!(store.get(&ns, &key).unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    tables: RwLock<HashMap<Namespace, Table>>,
}

impl MemoryDatastore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total entity count across all namespaces.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.tables.read().values().map(|t| t.rows.len()).sum()
    }

    /// Completes an incomplete key without writing anything.
    ///
    /// The identifier is consumed either way; the journal store uses this
    /// to know the final key before it appends the write-ahead record.
    pub(crate) fn complete_key(&self, ns: &Namespace, key: &Key) -> Key {
        if key.is_complete() {
            return key.clone();
        }
        let mut tables = self.tables.write();
        let table = tables.entry(ns.clone()).or_default();
        key.assigned(table.allocate_id())
    }

    /// Validates a query against the engine's native capabilities.
    ///
    /// The native index supports a range constraint on at most one
    /// property, and when both a range constraint and orders are present
    /// the first order must name the constrained property. Queries
    /// outside that envelope fail deterministically instead of returning
    /// a wrong result.
    fn validate_query(query: &NativeQuery) -> StoreResult<()> {
        let mut inequality_property: Option<&str> = None;
        for filter in &query.filters {
            if filter.operator.is_inequality() {
                match inequality_property {
                    None => inequality_property = Some(&filter.property),
                    Some(existing) if existing == filter.property => {}
                    Some(existing) => {
                        return Err(StoreError::invalid_query(format!(
                            "inequality filters on multiple properties: {existing} and {}",
                            filter.property
                        )));
                    }
                }
            }
            if filter.operator == FilterOperator::In {
                match &filter.value {
                    PropertyValue::List(items) if items.is_empty() => {
                        return Err(StoreError::invalid_query(
                            "in filter requires a non-empty list operand",
                        ));
                    }
                    PropertyValue::List(_) => {}
                    _ => {
                        return Err(StoreError::invalid_query(
                            "in filter requires a list operand",
                        ));
                    }
                }
            }
        }

        if let (Some(property), Some(first_order)) = (inequality_property, query.orders.first()) {
            if first_order.property != property {
                return Err(StoreError::invalid_query(format!(
                    "first order must be on the inequality property {property}, \
                     found {}",
                    first_order.property
                )));
            }
        }

        Ok(())
    }

    /// Tests a single filter against an entity.
    ///
    /// An entity without the filtered property never matches. A
    /// list-valued property matches when any element does.
    fn filter_matches(filter: &PropertyFilter, entity: &Entity) -> bool {
        let Some(actual) = entity.get(&filter.property) else {
            return false;
        };

        match filter.operator {
            FilterOperator::In => match &filter.value {
                PropertyValue::List(candidates) => candidates
                    .iter()
                    .any(|candidate| Self::scalar_matches(actual, FilterOperator::Equal, candidate)),
                _ => false,
            },
            operator => Self::scalar_matches(actual, operator, &filter.value),
        }
    }

    fn scalar_matches(actual: &PropertyValue, operator: FilterOperator, expected: &PropertyValue) -> bool {
        if let PropertyValue::List(elements) = actual {
            return elements
                .iter()
                .any(|element| Self::compare(element, operator, expected));
        }
        Self::compare(actual, operator, expected)
    }

    fn compare(actual: &PropertyValue, operator: FilterOperator, expected: &PropertyValue) -> bool {
        let ord = actual.cmp_total(expected);
        match operator {
            FilterOperator::Equal => ord == Ordering::Equal,
            FilterOperator::NotEqual => ord != Ordering::Equal,
            FilterOperator::GreaterThan => ord == Ordering::Greater,
            FilterOperator::GreaterThanOrEqual => ord != Ordering::Less,
            FilterOperator::LessThan => ord == Ordering::Less,
            FilterOperator::LessThanOrEqual => ord != Ordering::Greater,
            FilterOperator::In => false,
        }
    }

    /// Orders two entities under a query's native orders.
    ///
    /// Ties fall through to the next order; a missing property sorts as
    /// null. The canonical key bytes break any remaining tie, so the
    /// result ordering is total and cursor positions are stable.
    fn order_entities(query: &NativeQuery, a: &Entity, b: &Entity) -> Ordering {
        for order in &query.orders {
            let av = a.get(&order.property).unwrap_or(&PropertyValue::Null);
            let bv = b.get(&order.property).unwrap_or(&PropertyValue::Null);
            let ord = av.cmp_total(bv);
            if ord != Ordering::Equal {
                return order.direction.apply(ord);
            }
        }
        a.key().canonical_bytes().cmp(&b.key().canonical_bytes())
    }
}

impl Datastore for MemoryDatastore {
    fn put(&self, ns: &Namespace, entity: Entity) -> StoreResult<Key> {
        entity.key().validate()?;

        let mut tables = self.tables.write();
        let table = tables.entry(ns.clone()).or_default();

        let key = if entity.key().is_complete() {
            if let KeyId::Numeric(id) = entity.key().id() {
                table.observe_id(*id);
            }
            entity.key().clone()
        } else {
            entity.key().assigned(table.allocate_id())
        };

        let entity = entity.with_key(key.clone());
        table.rows.insert(key.canonical_bytes(), entity);
        Ok(key)
    }

    fn get(&self, ns: &Namespace, key: &Key) -> StoreResult<Option<Entity>> {
        key.validate()?;
        let tables = self.tables.read();
        Ok(tables
            .get(ns)
            .and_then(|table| table.rows.get(&key.canonical_bytes()))
            .cloned())
    }

    fn delete(&self, ns: &Namespace, key: &Key) -> StoreResult<()> {
        key.validate()?;
        let mut tables = self.tables.write();
        if let Some(table) = tables.get_mut(ns) {
            table.rows.remove(&key.canonical_bytes());
        }
        Ok(())
    }

    fn run_query(&self, ns: &Namespace, query: &NativeQuery) -> StoreResult<QueryResponse> {
        Self::validate_query(query)?;
        let shape = query.shape_fingerprint(ns)?;

        let offset = match &query.start_cursor {
            Some(cursor) if cursor.shape != shape => {
                return Err(StoreError::invalid_query(
                    "cursor does not match this query's shape",
                ));
            }
            #[allow(clippy::cast_possible_truncation)]
            Some(cursor) => cursor.offset as usize,
            None => 0,
        };

        let tables = self.tables.read();
        let mut matches: Vec<Entity> = tables
            .get(ns)
            .map(|table| {
                table
                    .rows
                    .values()
                    .filter(|entity| entity.kind() == query.kind)
                    .filter(|entity| match &query.ancestor {
                        Some(ancestor) => ancestor.is_ancestor_of(entity.key()),
                        None => true,
                    })
                    .filter(|entity| {
                        query
                            .filters
                            .iter()
                            .all(|filter| Self::filter_matches(filter, entity))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        matches.sort_by(|a, b| Self::order_entities(query, a, b));

        let total = matches.len();
        let start = offset.min(total);
        let end = match query.limit {
            Some(limit) => (start + limit).min(total),
            None => total,
        };
        let entities: Vec<Entity> = matches[start..end].to_vec();

        debug!(
            kind = %query.kind,
            matched = total,
            returned = entities.len(),
            offset = start,
            "executed query"
        );

        Ok(QueryResponse {
            next_cursor: CursorToken {
                shape,
                offset: end as u64,
            },
            entities,
        })
    }
}
