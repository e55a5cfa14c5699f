//! Storage backends for the local store.
//!
//! A backend is a set of named tables mapping string keys to opaque byte
//! values. All writes go through a [`WriteBatch`], which a backend applies
//! atomically: either every put and delete lands, or none does.
//!
//! Two backends ship with the engine:
//! - [`MemoryBackend`] keeps tables in memory (tests, ephemeral sessions).
//! - [`RedbBackend`] keeps one redb table per collection in a single
//!   database file. Each batch is one write transaction.
//!
//! Both enforce an optional byte quota. A batch that would push the stored
//! size past the quota fails with [`Error::QuotaExceeded`] and changes
//! nothing.

use crate::{error::Result, Error};
use redb::{
    Database, ReadableTable, TableDefinition, TableError, TableHandle, WriteTransaction,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        table: String,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        table: String,
        key: String,
    },
    Clear {
        table: String,
    },
}

/// An ordered list of mutations committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, table: &str, key: impl Into<String>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put {
            table: table.to_string(),
            key: key.into(),
            value,
        });
    }

    /// Serialize `value` as JSON and queue a put.
    pub fn put_json<T: Serialize>(
        &mut self,
        table: &str,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::Storage(e.to_string()))?;
        self.put(table, key, bytes);
        Ok(())
    }

    pub fn delete(&mut self, table: &str, key: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            table: table.to_string(),
            key: key.into(),
        });
    }

    pub fn clear(&mut self, table: &str) {
        self.ops.push(WriteOp::Clear {
            table: table.to_string(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Key-value storage the local store persists into.
pub trait Backend: Send + Sync {
    /// Read a single value.
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Read every entry of a table, in key order.
    fn scan(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Apply a batch atomically.
    fn commit(&mut self, batch: WriteBatch) -> Result<()>;

    /// Bytes currently stored (keys plus values).
    fn size(&self) -> usize;
}

/// Decode a JSON value read from a backend.
pub fn decode_json<T: serde::de::DeserializeOwned>(
    table: &str,
    key: &str,
    bytes: &[u8],
) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Storage(format!("corrupt entry {table}/{key}: {e}")))
}

type Table = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tables {
    tables: BTreeMap<String, Table>,
    size: usize,
}

impl Tables {
    fn get(&self, table: &str, key: &str) -> Option<Vec<u8>> {
        self.tables.get(table)?.get(key).cloned()
    }

    fn scan(&self, table: &str) -> Vec<(String, Vec<u8>)> {
        self.tables
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn apply(&mut self, batch: WriteBatch) {
        for op in batch.ops {
            match op {
                WriteOp::Put { table, key, value } => {
                    let added = key.len() + value.len();
                    let entries = self.tables.entry(table).or_default();
                    if let Some(old) = entries.get(&key) {
                        self.size -= key.len() + old.len();
                    }
                    entries.insert(key, value);
                    self.size += added;
                }
                WriteOp::Delete { table, key } => {
                    if let Some(old) = self.tables.get_mut(&table).and_then(|t| t.remove(&key)) {
                        self.size -= key.len() + old.len();
                    }
                }
                WriteOp::Clear { table } => {
                    if let Some(entries) = self.tables.remove(&table) {
                        self.size -= entries.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>();
                    }
                }
            }
        }
    }
}

fn check_quota(quota: Option<usize>, required: usize) -> Result<()> {
    match quota {
        Some(limit) if required > limit => Err(Error::QuotaExceeded { limit, required }),
        _ => Ok(()),
    }
}

/// Tables held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Tables,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that rejects commits growing past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            tables: Tables::default(),
            quota: Some(bytes),
        }
    }
}

impl Backend for MemoryBackend {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.get(table, key))
    }

    fn scan(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self.tables.scan(table))
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<()> {
        let mut next = self.tables.clone();
        next.apply(batch);
        check_quota(self.quota, next.size)?;
        self.tables = next;
        Ok(())
    }

    fn size(&self) -> usize {
        self.tables.size
    }
}

fn definition(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn storage_error(err: impl Into<redb::Error>) -> Error {
    Error::Storage(err.into().to_string())
}

/// Bytes held by one table (keys plus values).
fn table_size(table: &impl ReadableTable<&'static str, &'static [u8]>) -> Result<usize> {
    let mut size = 0;
    for entry in table.iter().map_err(storage_error)? {
        let (key, value) = entry.map_err(storage_error)?;
        size += key.value().len() + value.value().len();
    }
    Ok(size)
}

/// Tables persisted in a redb database file.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
    size: usize,
    quota: Option<usize>,
}

impl RedbBackend {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_quota(path, None)
    }

    pub fn open_with_quota(path: impl AsRef<Path>, quota: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("{}: {e}", parent.display())))?;
        }

        let db = Database::create(&path)
            .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?;
        let size = stored_size(&db)?;

        Ok(Self {
            db,
            path,
            size,
            quota,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn stored_size(db: &Database) -> Result<usize> {
    let txn = db.begin_read().map_err(storage_error)?;
    let mut size = 0;
    for handle in txn.list_tables().map_err(storage_error)? {
        let table = txn.open_table(definition(handle.name())).map_err(storage_error)?;
        size += table_size(&table)?;
    }
    Ok(size)
}

/// Apply every op inside `txn` and return the stored size afterwards.
fn apply_ops(txn: &WriteTransaction, ops: Vec<WriteOp>, mut size: usize) -> Result<usize> {
    for op in ops {
        match op {
            WriteOp::Put { table, key, value } => {
                let mut entries = txn.open_table(definition(&table)).map_err(storage_error)?;
                let old = entries
                    .insert(key.as_str(), value.as_slice())
                    .map_err(storage_error)?
                    .map(|old| key.len() + old.value().len());
                size = (size + key.len() + value.len()).saturating_sub(old.unwrap_or(0));
            }
            WriteOp::Delete { table, key } => {
                let mut entries = txn.open_table(definition(&table)).map_err(storage_error)?;
                let old = entries
                    .remove(key.as_str())
                    .map_err(storage_error)?
                    .map(|old| key.len() + old.value().len());
                size = size.saturating_sub(old.unwrap_or(0));
            }
            WriteOp::Clear { table } => {
                let removed = {
                    let entries = txn.open_table(definition(&table)).map_err(storage_error)?;
                    table_size(&entries)?
                };
                txn.delete_table(definition(&table)).map_err(storage_error)?;
                size = size.saturating_sub(removed);
            }
        }
    }
    Ok(size)
}

impl Backend for RedbBackend {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(storage_error)?;
        let entries = match txn.open_table(definition(table)) {
            Ok(entries) => entries,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        let value = entries
            .get(key)
            .map_err(storage_error)?
            .map(|v| v.value().to_vec());
        Ok(value)
    }

    fn scan(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(storage_error)?;
        let entries = match txn.open_table(definition(table)) {
            Ok(entries) => entries,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(e)),
        };

        let mut rows = Vec::new();
        for entry in entries.iter().map_err(storage_error)? {
            let (key, value) = entry.map_err(storage_error)?;
            rows.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(rows)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<()> {
        let txn = self.db.begin_write().map_err(storage_error)?;

        let size = match apply_ops(&txn, batch.ops, self.size)
            .and_then(|size| check_quota(self.quota, size).map(|()| size))
        {
            Ok(size) => size,
            Err(e) => {
                txn.abort().map_err(storage_error)?;
                return Err(e);
            }
        };

        txn.commit().map_err(storage_error)?;
        self.size = size;
        Ok(())
    }

    fn size(&self) -> usize {
        self.size
    }
}
