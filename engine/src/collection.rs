//! In-memory view of one ordered collection.
//!
//! Ordering rules:
//! 1. Reads are sorted by `order`, ties broken by id (insertion order).
//! 2. A new record gets `max(order in its scope) + 1`, or 1 in an empty scope.
//! 3. A reorder assigns each listed id its 0-based position. Ids that are
//!    unknown or belong to another scope are skipped.

use crate::{schema::Entity, LocalId, Order};
use std::collections::BTreeMap;

/// Records of one entity type keyed by local id.
#[derive(Debug, Clone)]
pub struct Collection<T: Entity> {
    records: BTreeMap<LocalId, T>,
    next_id: LocalId,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Collection<T> {
    /// Create an empty collection whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an empty collection handing out ids from `next_id`.
    pub fn starting_at(next_id: LocalId) -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: next_id.max(1),
        }
    }

    /// Build a collection from stored records.
    ///
    /// `next_id` never goes below one past the highest stored id.
    pub fn from_records(records: impl IntoIterator<Item = T>, next_id: LocalId) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.id(), r)).collect();
        let floor = records.keys().next_back().map_or(1, |id| id + 1);
        Self {
            records,
            next_id: next_id.max(floor),
        }
    }

    pub fn get(&self, id: LocalId) -> Option<&T> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: LocalId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The id the next inserted record will get.
    pub fn next_id(&self) -> LocalId {
        self.next_id
    }

    /// Order value for a new record in `scope`.
    pub fn next_order(&self, scope: Option<LocalId>) -> Order {
        self.in_scope(scope)
            .map(Entity::order)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Records in `scope`, unsorted.
    pub fn in_scope(&self, scope: Option<LocalId>) -> impl Iterator<Item = &T> {
        self.records.values().filter(move |r| r.scope() == scope)
    }

    /// All records regardless of scope, unsorted.
    pub fn all(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    /// Records in `scope`, ascending by order then id.
    pub fn sorted(&self, scope: Option<LocalId>) -> Vec<T> {
        let mut records: Vec<T> = self.in_scope(scope).cloned().collect();
        sort_by_order(&mut records);
        records
    }

    /// Copies of the records a reorder touches, with their new order set.
    pub fn reorder_plan(&self, ids: &[LocalId], scope: Option<LocalId>) -> Vec<T> {
        let mut planned: BTreeMap<LocalId, T> = BTreeMap::new();
        for (position, id) in ids.iter().enumerate() {
            let Some(record) = self.records.get(id) else {
                continue;
            };
            if record.scope() != scope {
                continue;
            }
            let mut record = record.clone();
            record.set_order(position as Order);
            planned.insert(*id, record);
        }
        planned.into_values().collect()
    }

    /// Insert or replace a record, advancing the id sequence past it.
    pub fn insert(&mut self, record: T) {
        self.next_id = self.next_id.max(record.id() + 1);
        self.records.insert(record.id(), record);
    }

    pub fn remove(&mut self, id: LocalId) -> Option<T> {
        self.records.remove(&id)
    }

    /// Drop every record. The id sequence keeps counting.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Sort records ascending by order, ties broken by id.
pub fn sort_by_order<T: Entity>(records: &mut [T]) {
    records.sort_by_key(|r| (r.order(), r.id()));
}
