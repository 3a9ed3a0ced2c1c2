//! In-memory store (for testing and single-process deployments).

use crate::{validate_table, KvStore, Result, WriteBatch, WriteOp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryKvStore {
    tables: Arc<RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held in `table`.
    pub fn table_len(&self, table: &str) -> usize {
        self.tables.read().get(table).map(BTreeMap::len).unwrap_or(0)
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        validate_table(table)?;
        let tables = self.tables.read();
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        for table in batch.tables() {
            validate_table(table)?;
        }

        // Readers never observe a partially applied batch.
        let mut tables = self.tables.write();
        for op in batch.ops() {
            match op {
                WriteOp::Set { table, key, value } => {
                    tables
                        .entry(table.clone())
                        .or_default()
                        .insert(key.clone(), value.clone());
                }
                WriteOp::Unset { table, key } => {
                    if let Some(t) = tables.get_mut(table) {
                        t.remove(key);
                    }
                }
            }
        }
        Ok(())
    }
}
