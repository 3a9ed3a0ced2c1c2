//! Sled-backed store. Each table maps to its own sled tree; batches run as a
//! multi-tree transaction.

use crate::{validate_table, KvStore, Result, StorageError, WriteBatch, WriteOp};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::path::Path;

pub struct SledKvStore {
    db: Db,
}

impl SledKvStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        tracing::debug!(trees = db.tree_names().len(), "opened sled store");
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, table: &str) -> Result<Tree> {
        validate_table(table)?;
        Ok(self.db.open_tree(table)?)
    }
}

impl KvStore for SledKvStore {
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tree(table)?.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let names = batch.tables();
        let trees = names
            .iter()
            .map(|name| self.tree(name))
            .collect::<Result<Vec<Tree>>>()?;
        let slots: Vec<usize> = batch
            .ops()
            .iter()
            .map(|op| names.iter().position(|n| *n == op.table()).unwrap_or(0))
            .collect();

        let result = trees
            .as_slice()
            .transaction(|txs: &Vec<TransactionalTree>| {
                for (op, slot) in batch.ops().iter().zip(&slots) {
                    let tx = &txs[*slot];
                    match op {
                        WriteOp::Set { key, value, .. } => {
                            tx.insert(key.as_bytes(), value.as_slice())?;
                        }
                        WriteOp::Unset { key, .. } => {
                            tx.remove(key.as_bytes())?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Storage(e)) => Err(StorageError::Database(e)),
            Err(TransactionError::Abort(())) => Err(StorageError::Aborted),
        }
    }
}
