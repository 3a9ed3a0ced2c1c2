//! Operation façade over the data room core.
//!
//! Every public operation loads what it needs, stages all writes into one
//! [`WriteBatch`] and commits it once. An error anywhere before the commit
//! leaves the store untouched.

use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::errors::{DataRoomError, Result};
use crate::file;
use crate::keys::KeyStore;
use crate::registry::DataRoomRegistry;
use crate::room::DataRoom;
use crate::token::TokenVerifier;
use crate::vault::KeyVault;
use dataroom_crypto::EcdsaKey;
use dataroom_storage::{KvStore, WriteBatch};
use dataroom_types::{
    AuthorizedKey, FileInput, FileRecord, KeyIdentities, KeyInput, RoomOperation,
    UpdateDataRoomInput,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct DataRoomService<S: KvStore> {
    store: S,
    verifier: TokenVerifier,
    clock: Arc<dyn Clock>,
}

impl<S: KvStore> DataRoomService<S> {
    pub fn new(store: S, config: &ServiceConfig) -> Self {
        Self {
            store,
            verifier: TokenVerifier::new(config.token_policy()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for token freshness.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        debug!(ops = batch.len(), tables = ?batch.tables(), "committing batch");
        self.store.apply(batch)?;
        Ok(())
    }

    // Keys

    pub fn set_backend_signing_key(&self) -> Result<()> {
        let vault = KeyVault::new(&self.store);
        let mut keys = KeyStore::load(&self.store)?;
        let mut batch = WriteBatch::new();
        keys.generate_backend_signing_key(&vault, &mut batch)?;
        keys.stage_save(&mut batch)?;
        self.commit(batch)
    }

    pub fn set_webserver_verification_key(&self, spki_public_key: &str) -> Result<()> {
        let vault = KeyVault::new(&self.store);
        let mut keys = KeyStore::load(&self.store)?;
        let mut batch = WriteBatch::new();
        keys.import_webserver_verification_key(&vault, spki_public_key, &mut batch)?;
        keys.stage_save(&mut batch)?;
        self.commit(batch)
    }

    pub fn get_key_identities(&self) -> Result<KeyIdentities> {
        let vault = KeyVault::new(&self.store);
        KeyStore::load(&self.store)?.list(&vault)
    }

    /// Forget both key handles so they can be provisioned again.
    pub fn clear_keys(&self) -> Result<()> {
        let mut keys = KeyStore::load(&self.store)?;
        keys.clear();
        let mut batch = WriteBatch::new();
        keys.stage_save(&mut batch)?;
        self.commit(batch)
    }

    /// The backend key pair, if provisioned.
    pub fn backend_signing_key(&self) -> Result<Option<EcdsaKey>> {
        let vault = KeyVault::new(&self.store);
        KeyStore::load(&self.store)?.backend_signing_key(&vault)
    }

    // Rooms

    /// Create a room. `None` or an empty id gets a random id.
    pub fn create_data_room(&self, requested_id: Option<&str>) -> Result<String> {
        let mut registry = DataRoomRegistry::load(&self.store)?;
        let mut batch = WriteBatch::new();
        let id = registry.create(&self.store, requested_id.unwrap_or_default(), &mut batch)?;
        self.commit(batch)?;
        Ok(id)
    }

    pub fn remove_data_room(&self, room_id: &str) -> Result<()> {
        let mut registry = DataRoomRegistry::load(&self.store)?;
        let mut batch = WriteBatch::new();
        registry.remove(&self.store, room_id, &mut batch)?;
        self.commit(batch)
    }

    pub fn list_data_rooms(&self) -> Result<Vec<String>> {
        Ok(DataRoomRegistry::load(&self.store)?.list().to_vec())
    }

    /// Apply one mutation to a room.
    ///
    /// A locked room rejects everything but `lock` before the payload is
    /// looked at, so a locked room reports `InvalidState` even for a
    /// request missing its `file` or `key`.
    pub fn update_data_room(&self, input: &UpdateDataRoomInput) -> Result<()> {
        let mut room = DataRoom::require(&self.store, &input.data_room_id)?;
        if input.operation != RoomOperation::Lock {
            room.ensure_open()?;
        }

        let mut batch = WriteBatch::new();
        match input.operation {
            RoomOperation::AddFile => {
                let file = required_file(input)?;
                let vault = KeyVault::new(&self.store);
                let trusted = KeyStore::load(&self.store)?.webserver_verification_key(&vault)?;
                room.add_file(
                    file,
                    trusted.as_ref(),
                    &self.verifier,
                    self.clock.now_ms(),
                    &mut batch,
                )?;
            }
            RoomOperation::RemoveFile => {
                room.remove_file(required_file(input)?, &mut batch)?;
            }
            RoomOperation::Lock => {
                if room.is_locked() {
                    debug!(room_id = %room.id(), "data room already locked");
                    return Ok(());
                }
                room.lock();
            }
            RoomOperation::AuthorizeKey => {
                room.authorize_key(required_key(input)?)?;
            }
            RoomOperation::RevokeKey => {
                room.revoke_key(&required_key(input)?.key_id)?;
            }
        }

        room.stage_save(&mut batch)?;
        self.commit(batch)?;
        info!(room_id = %room.id(), operation = %input.operation, "data room updated");
        Ok(())
    }

    pub fn list_files(&self, room_id: &str) -> Result<Vec<String>> {
        Ok(DataRoom::require(&self.store, room_id)?.files().to_vec())
    }

    pub fn list_public_keys(&self, room_id: &str) -> Result<Vec<AuthorizedKey>> {
        Ok(DataRoom::require(&self.store, room_id)?
            .authorized_keys()
            .to_vec())
    }

    /// Key id authorized on `room_id` for `spki_public_key`, if any.
    pub fn authorized_key_id(&self, room_id: &str, spki_public_key: &str) -> Result<Option<String>> {
        let room = DataRoom::require(&self.store, room_id)?;
        Ok(room.key_id_for(spki_public_key).map(str::to_string))
    }

    pub fn get_file(&self, room_id: &str, name: &str) -> Result<FileRecord> {
        let room = DataRoom::require(&self.store, room_id)?;
        if !room.contains_file(name) {
            return Err(DataRoomError::NotFound(format!(
                "file {name} in data room {room_id}"
            )));
        }
        file::load(&self.store, room_id, name)?.ok_or_else(|| {
            DataRoomError::NotFound(format!("record for file {name} in data room {room_id}"))
        })
    }
}

fn required_file(input: &UpdateDataRoomInput) -> Result<&FileInput> {
    input.file.as_ref().ok_or_else(|| {
        DataRoomError::ValidationFailure(format!("operation {} requires a file", input.operation))
    })
}

fn required_key(input: &UpdateDataRoomInput) -> Result<&KeyInput> {
    input.key.as_ref().ok_or_else(|| {
        DataRoomError::ValidationFailure(format!("operation {} requires a key", input.operation))
    })
}
