//! Key vault: holds key material behind opaque handle names.
//!
//! The rest of the core only stores handle names. Material is never deleted
//! from the vault, so forgetting a handle does not revoke the key.

use crate::errors::{DataRoomError, Result};
use dataroom_crypto::{EcdsaKey, StoredKey};
use dataroom_storage::{KvStore, WriteBatch};
use dataroom_types::random_id;

pub const KEY_VAULT_TABLE: &str = "KeyVaultTable";

pub struct KeyVault<'a, S: KvStore> {
    store: &'a S,
}

impl<'a, S: KvStore> KeyVault<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stage `key` under a fresh handle and return the handle.
    pub fn stage_insert(&self, key: &EcdsaKey, batch: &mut WriteBatch) -> Result<String> {
        let handle = random_id();
        batch.set_json(KEY_VAULT_TABLE, &handle, &key.to_stored()?)?;
        Ok(handle)
    }

    /// Resolve a handle. `None` when the vault has no entry for it.
    pub fn resolve(&self, handle: &str) -> Result<Option<EcdsaKey>> {
        let stored: Option<StoredKey> = self.store.get_json(KEY_VAULT_TABLE, handle)?;
        stored
            .map(|s| EcdsaKey::from_stored(&s))
            .transpose()
            .map_err(|e| DataRoomError::CryptoFailure(format!("cannot load key {handle}: {e}")))
    }
}
