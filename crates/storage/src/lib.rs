//! Table-scoped key-value storage.
//!
//! The data room core depends only on [`KvStore`]: `get` by `(table, key)`
//! plus atomic application of a [`WriteBatch`]. Every operation of the core
//! stages its writes in one batch and commits it once, so a failing
//! operation never leaves partial state behind.

use serde::de::DeserializeOwned;
use serde::Serialize;

mod memory;
mod sled_store;

pub use memory::MemoryKvStore;
pub use sled_store::SledKvStore;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),
    #[error("Transaction aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A single staged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set {
        table: String,
        key: String,
        value: Vec<u8>,
    },
    Unset {
        table: String,
        key: String,
    },
}

impl WriteOp {
    pub fn table(&self) -> &str {
        match self {
            WriteOp::Set { table, .. } | WriteOp::Unset { table, .. } => table,
        }
    }
}

/// Ordered set of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, table: &str, key: &str, value: Vec<u8>) {
        self.ops.push(WriteOp::Set {
            table: table.to_string(),
            key: key.to_string(),
            value,
        });
    }

    /// Stage `value` encoded as JSON.
    pub fn set_json<T: Serialize>(&mut self, table: &str, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(table, key, bytes);
        Ok(())
    }

    pub fn unset(&mut self, table: &str, key: &str) {
        self.ops.push(WriteOp::Unset {
            table: table.to_string(),
            key: key.to_string(),
        });
    }

    /// Append every op of `other` after the ops already staged.
    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Distinct table names touched, in first-use order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for op in &self.ops {
            if !tables.contains(&op.table()) {
                tables.push(op.table());
            }
        }
        tables
    }
}

/// Abstract key-value store with named tables.
pub trait KvStore: Send + Sync {
    /// Read a value; `None` when the key is absent.
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Apply every op in `batch` atomically, in order.
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    fn set(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(table, key, value);
        self.apply(batch)
    }

    fn unset(&self, table: &str, key: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.unset(table, key);
        self.apply(batch)
    }

    /// Read and decode a JSON value.
    fn get_json<T: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        self.get(table, key)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(table, key)
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        (**self).apply(batch)
    }
}

pub(crate) fn validate_table(table: &str) -> Result<()> {
    if table.is_empty() || table.contains('\0') {
        return Err(StorageError::InvalidTable(table.to_string()));
    }
    Ok(())
}
