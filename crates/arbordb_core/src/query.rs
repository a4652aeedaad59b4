//! The fluent query builder.

use crate::error::{CoreError, CoreResult};
use crate::model::EntityModel;
use crate::options::QueryOptions;
use crate::repository::Repository;
use arbordb_codec::{CursorToken, Entity, Key, PropertyValue};
use arbordb_store::{Direction, FilterOperator, NativeQuery, PropertyFilter, PropertyOrder};
use std::cmp::Ordering;
use std::marker::PhantomData;

/// A fluent, single-kind query over an entity store.
///
/// A builder accumulates filters, an ancestor scope, native and
/// post-fetch orders, a limit, and a cursor, then executes with
/// [`Query::list`]. The cursor returned by each execution is stored back
/// on the builder, so calling `list` again on the same builder pages
/// forward through the results.
///
/// Builders are one-logical-caller state machines: use one per call
/// sequence, reuse it sequentially for pagination, and drop it.
///
/// # Example
///
/// ```no_run
/// # use arbordb_core::{CoreResult, Repository, EntityModel};
/// # use arbordb_codec::{Entity, Key, PropertyValue};
/// # struct Person { key: Option<Key>, age: i64 }
/// # impl EntityModel for Person {
/// #     const KIND: &'static str = "Person";
/// #     fn key(&self) -> Option<Key> { self.key.clone() }
/// #     fn set_key(&mut self, key: Key) { self.key = Some(key); }
/// #     fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
/// #         Ok(vec![("age".into(), self.age.into())])
/// #     }
/// #     fn from_entity(entity: &Entity) -> CoreResult<Self> {
/// #         Ok(Person { key: Some(entity.key().clone()), age: 0 })
/// #     }
/// # }
/// # fn demo(repository: &Repository) -> CoreResult<()> {
/// use arbordb_store::Direction;
///
/// let mut query = repository
///     .query::<Person>()
///     .filter("age", ">=", 18)
///     .order("age", Direction::Descending)
///     .limit(10);
///
/// let first_page = query.list()?;
/// let second_page = query.list()?;
/// # Ok(())
/// # }
/// ```
pub struct Query<'r, T: EntityModel> {
    repository: &'r Repository,
    wheres: Vec<(String, String, PropertyValue)>,
    ancestor: Option<Key>,
    orders: Vec<PropertyOrder>,
    sorts: Vec<PropertyOrder>,
    limit: Option<usize>,
    cursor: Option<String>,
    _marker: PhantomData<T>,
}

impl<'r, T: EntityModel> Query<'r, T> {
    pub(crate) fn new(repository: &'r Repository) -> Self {
        Self {
            repository,
            wheres: Vec::new(),
            ancestor: None,
            orders: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            cursor: None,
            _marker: PhantomData,
        }
    }

    /// Adds a property filter; chained filters combine with logical AND.
    ///
    /// The operator token is one of `=`, `>`, `>=`, `<`, `<=`, `!=`, or
    /// `in` (any case). An unrecognized token fails the query with
    /// [`CoreError::InvalidOperator`] at execution, before any store
    /// call.
    #[must_use]
    pub fn filter(
        mut self,
        property: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.wheres
            .push((property.into(), operator.into(), value.into()));
        self
    }

    /// Scopes results to strict descendants of `parent`.
    #[must_use]
    pub fn parent(mut self, parent: Key) -> Self {
        self.ancestor = Some(parent);
        self
    }

    /// Adds a native order, applied by the storage engine.
    ///
    /// Native orders determine fetch order and therefore pagination
    /// boundaries.
    #[must_use]
    pub fn order(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(PropertyOrder::new(property, direction));
        self
    }

    /// Adds a post-fetch order, applied in memory after execution.
    ///
    /// Post-fetch orders exist for sort keys the native engine cannot
    /// index; they reorder only the page already fetched and never move
    /// pagination boundaries.
    #[must_use]
    pub fn sort(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.sorts.push(PropertyOrder::new(property, direction));
        self
    }

    /// Limits the number of entities per execution.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resumes from a cursor produced by an earlier execution of a query
    /// with the same shape.
    #[must_use]
    pub fn cursor(mut self, token: impl Into<String>) -> Self {
        self.cursor = Some(token.into());
        self
    }

    /// Returns the cursor after the most recent execution, if any.
    #[must_use]
    pub fn current_cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Applies a parsed options document to this builder.
    ///
    /// Where-triples and orders append to any already declared; a limit
    /// replaces the current one. Absent options leave the builder
    /// untouched.
    #[must_use]
    pub fn options(mut self, options: &QueryOptions) -> Self {
        if let Some(wheres) = options.wheres() {
            self.wheres.extend(wheres.iter().cloned());
        }
        if let Some(orders) = options.orders() {
            self.orders.extend(orders.iter().cloned());
        }
        if let Some(limit) = options.limit() {
            self.limit = Some(limit);
        }
        self
    }

    /// Executes the query and returns one page of results.
    ///
    /// The returned cursor is stored on the builder, so a repeated call
    /// returns the next page. The tenant scope entered for the target
    /// kind is released on every exit path.
    ///
    /// # Errors
    ///
    /// Fails fast with [`CoreError::InvalidOperator`] or a cursor decode
    /// error before any store call; otherwise propagates store errors.
    pub fn list(&mut self) -> CoreResult<Vec<T>> {
        let namespace = T::namespace();
        let _scope = self.repository.scopes().enter(namespace.clone());

        let native = self.build_native()?;
        let response = self.repository.datastore().run_query(&namespace, &native)?;
        self.cursor = Some(response.next_cursor.encode());

        let mut entities = response.entities;
        self.apply_sorts(&mut entities);

        entities.iter().map(T::from_entity).collect()
    }

    /// Executes with `limit(1)` and returns the sole result, if any.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Query::list`].
    pub fn first(&mut self) -> CoreResult<Option<T>> {
        self.limit = Some(1);
        let mut results = self.list()?;
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(Some(results.remove(0)))
        }
    }

    /// Fetches a root entity of this kind by numeric identifier.
    ///
    /// Bypasses the query engine entirely: a direct key lookup, `None`
    /// when absent, and declared child collections populated on success.
    ///
    /// # Errors
    ///
    /// Propagates store and conversion failures; absence is `Ok(None)`.
    pub fn by_id(&self, id: i64) -> CoreResult<Option<T>> {
        self.by_key(&Key::with_id(T::KIND, id))
    }

    /// Fetches a root entity of this kind by name.
    ///
    /// # Errors
    ///
    /// Propagates store and conversion failures; absence is `Ok(None)`.
    pub fn by_name(&self, name: &str) -> CoreResult<Option<T>> {
        self.by_key(&Key::with_name(T::KIND, name))
    }

    /// Fetches an entity by full key.
    ///
    /// # Errors
    ///
    /// Propagates store and conversion failures; absence is `Ok(None)`.
    pub fn by_key(&self, key: &Key) -> CoreResult<Option<T>> {
        let namespace = T::namespace();
        let _scope = self.repository.scopes().enter(namespace.clone());

        let Some(entity) = self.repository.datastore().get(&namespace, key)? else {
            return Ok(None);
        };
        let mut model = T::from_entity(&entity)?;

        let loader = ChildLoader {
            repository: self.repository,
        };
        model.load_children(&loader)?;
        Ok(Some(model))
    }

    /// Builds the native query from the accumulated state.
    ///
    /// All caller-input validation happens here, before the store sees
    /// anything.
    fn build_native(&self) -> CoreResult<NativeQuery> {
        let mut query = NativeQuery::new(T::KIND);
        query.ancestor = self.ancestor.clone();

        for (property, token, value) in &self.wheres {
            let operator = FilterOperator::from_token(token)
                .ok_or_else(|| CoreError::invalid_operator(token.clone()))?;
            query.filters.push(PropertyFilter {
                property: T::index_property(property),
                operator,
                value: T::index_value(property, value.clone()),
            });
        }

        for order in &self.orders {
            query.orders.push(PropertyOrder::new(
                T::index_property(&order.property),
                order.direction,
            ));
        }

        query.limit = self.limit;
        query.start_cursor = match &self.cursor {
            Some(token) => Some(CursorToken::decode(token)?),
            None => None,
        };
        Ok(query)
    }

    /// Applies post-fetch orders as one stable multi-key sort.
    ///
    /// Ties on the first sort key fall through to the next; a descending
    /// direction reverses the comparison only, never the tie-break
    /// precedence. Entities tying on every key keep their fetch order.
    fn apply_sorts(&self, entities: &mut [Entity]) {
        if self.sorts.is_empty() {
            return;
        }
        entities.sort_by(|a, b| {
            for sort in &self.sorts {
                let property = T::index_property(&sort.property);
                let av = a.get(&property).unwrap_or(&PropertyValue::Null);
                let bv = b.get(&property).unwrap_or(&PropertyValue::Null);
                let ord = av.cmp_total(bv);
                if ord != Ordering::Equal {
                    return sort.direction.apply(ord);
                }
            }
            Ordering::Equal
        });
    }
}

/// Fetches declared child collections for a just-loaded entity.
///
/// Handed to [`EntityModel::load_children`] after a direct key lookup.
/// Each call issues a fresh ancestor-scoped query for one child kind;
/// loading is one level deep - a child's own declared relations populate
/// when that child is itself fetched by key.
pub struct ChildLoader<'r> {
    repository: &'r Repository,
}

impl ChildLoader<'_> {
    /// Lists the children of `parent` with kind `C`.
    ///
    /// Returns exactly the entities whose key path strictly extends the
    /// parent's key.
    ///
    /// # Errors
    ///
    /// Propagates query failures.
    pub fn children_of<C: EntityModel>(&self, parent: &Key) -> CoreResult<Vec<C>> {
        self.repository
            .query::<C>()
            .parent(parent.clone())
            .list()
    }
}
