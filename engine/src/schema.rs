//! Persisted local schema.
//!
//! The store is a closed set of typed collections. [`CollectionKind`] names
//! them (and doubles as the table name in the storage backend), while the
//! [`Entity`] trait gives every ordered collection the same id/order/scope
//! surface so CRUD and reordering are written once.

use crate::{LocalId, Order, SchemaVersion};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version tag written into exports and checked on import.
pub const SCHEMA_VERSION: SchemaVersion = 1;

/// Table holding bookkeeping values such as id sequences.
pub const META_TABLE: &str = "meta";

/// The collections of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Assets,
    Albums,
    Photos,
    Essays,
    Videos,
}

impl CollectionKind {
    /// All collections, in import replay order.
    pub const ALL: [CollectionKind; 5] = [
        CollectionKind::Assets,
        CollectionKind::Albums,
        CollectionKind::Photos,
        CollectionKind::Essays,
        CollectionKind::Videos,
    ];

    /// Table name in the storage backend.
    pub fn table(self) -> &'static str {
        match self {
            CollectionKind::Assets => "assets",
            CollectionKind::Albums => "albums",
            CollectionKind::Photos => "photos",
            CollectionKind::Essays => "essays",
            CollectionKind::Videos => "videos",
        }
    }

    /// Whether records in this collection carry an `order` field.
    pub fn is_ordered(self) -> bool {
        !matches!(self, CollectionKind::Assets)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.table() == s)
            .ok_or_else(|| format!("unknown collection: {s}"))
    }
}

/// A record living in an ordered collection.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection this entity type is stored in.
    const KIND: CollectionKind;

    fn id(&self) -> LocalId;

    fn order(&self) -> Order;

    fn set_order(&mut self, order: Order);

    /// The parent scope `order` is unique within. `None` means the whole
    /// collection is one scope.
    fn scope(&self) -> Option<LocalId> {
        None
    }
}
