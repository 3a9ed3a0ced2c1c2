//! Data room state machine.
//!
//! A room starts Open and may move to Locked; nothing leaves Locked. While
//! locked, the file list and the authorized keys are frozen: every mutation
//! fails with `InvalidState` and stages nothing. Locking again is a no-op.
//!
//! Methods mutate the in-memory record and stage their writes into a
//! [`WriteBatch`]; the caller commits the batch only if the whole operation
//! succeeded.

use crate::errors::{DataRoomError, Result};
use crate::file;
use crate::token::TokenVerifier;
use dataroom_crypto::EcdsaKey;
use dataroom_storage::{KvStore, WriteBatch};
use dataroom_types::{AuthorizedKey, DataRoomRecord, FileInput, FileRecord, KeyInput};
use tracing::{debug, info, warn};

pub const DATA_ROOMS_TABLE: &str = "DataRoomsTable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoom {
    record: DataRoomRecord,
}

impl DataRoom {
    /// A new open room; an empty `id` gets a random one.
    pub fn new(id: &str) -> Self {
        Self {
            record: DataRoomRecord::new(id),
        }
    }

    /// Load a room. Absent rooms and tombstones both yield `None`.
    pub fn load<S: KvStore>(store: &S, id: &str) -> Result<Option<Self>> {
        let record: Option<DataRoomRecord> = store.get_json(DATA_ROOMS_TABLE, id)?;
        let room = record
            .filter(|r| !r.is_tombstone())
            .map(|record| Self { record });
        debug!(room_id = id, found = room.is_some(), "data room lookup");
        Ok(room)
    }

    /// Load a room or fail with `NotFound`.
    pub fn require<S: KvStore>(store: &S, id: &str) -> Result<Self> {
        Self::load(store, id)?
            .ok_or_else(|| DataRoomError::NotFound(format!("data room {id} does not exist")))
    }

    pub fn stage_save(&self, batch: &mut WriteBatch) -> Result<()> {
        batch.set_json(DATA_ROOMS_TABLE, &self.record.id, &self.record)?;
        Ok(())
    }

    /// Stage the tombstone that replaces this room, plus deletion of its file
    /// records.
    pub fn stage_tombstone(&self, batch: &mut WriteBatch) -> Result<()> {
        for name in &self.record.files {
            file::stage_delete(&self.record.id, name, batch);
        }
        batch.set_json(
            DATA_ROOMS_TABLE,
            &self.record.id,
            &DataRoomRecord::tombstone(),
        )?;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn is_locked(&self) -> bool {
        self.record.locked
    }

    pub fn files(&self) -> &[String] {
        &self.record.files
    }

    pub fn authorized_keys(&self) -> &[AuthorizedKey] {
        &self.record.authorized_keys
    }

    pub fn contains_file(&self, name: &str) -> bool {
        self.record.files.iter().any(|f| f == name)
    }

    /// Key id authorized for `spki`, if any. PEM and base64 DER renderings
    /// of the same key match; an unparsable `spki` matches nothing.
    pub fn key_id_for(&self, spki: &str) -> Option<&str> {
        let canonical = canonical_spki(spki).ok()?;
        self.find_key(&canonical)
    }

    fn find_key(&self, canonical_spki: &str) -> Option<&str> {
        self.record
            .authorized_keys
            .iter()
            .find(|k| k.spki_public_key == canonical_spki)
            .map(|k| k.key_id.as_str())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.record.locked {
            return Err(DataRoomError::InvalidState(format!(
                "data room {} is locked",
                self.record.id
            )));
        }
        Ok(())
    }

    /// Admit a file whose upload token verifies under `trusted`.
    ///
    /// On any failure the room is left untouched and nothing is staged.
    pub fn add_file(
        &mut self,
        input: &FileInput,
        trusted: Option<&EcdsaKey>,
        verifier: &TokenVerifier,
        now_ms: u64,
        batch: &mut WriteBatch,
    ) -> Result<FileRecord> {
        self.ensure_open()?;
        if input.name.is_empty() {
            return Err(DataRoomError::ValidationFailure(
                "file name must not be empty".to_string(),
            ));
        }
        if self.contains_file(&input.name) {
            return Err(DataRoomError::AlreadyExists(format!(
                "file {} in data room {}",
                input.name, self.record.id
            )));
        }

        let candidate = file::candidate_from_input(&self.record.id, input)?;
        let trusted = trusted.ok_or_else(|| {
            DataRoomError::NotFound("no trusted issuer key configured".to_string())
        })?;

        if let Err(e) = verifier.verify(&candidate.digest, &candidate.token, trusted, now_ms) {
            warn!(room_id = %self.record.id, file = %input.name, error = %e, "file admission rejected");
            return Err(e);
        }

        file::stage_save(&candidate, batch)?;
        self.record.files.push(candidate.name.clone());
        info!(room_id = %self.record.id, file = %candidate.name, "file admitted");
        Ok(candidate)
    }

    /// Drop `input.name` from the room and delete its record.
    pub fn remove_file(&mut self, input: &FileInput, batch: &mut WriteBatch) -> Result<()> {
        self.ensure_open()?;
        let Some(index) = self.record.files.iter().position(|f| *f == input.name) else {
            return Err(DataRoomError::NotFound(format!(
                "file {} in data room {}",
                input.name, self.record.id
            )));
        };

        self.record.files.remove(index);
        file::stage_delete(&self.record.id, &input.name, batch);
        info!(room_id = %self.record.id, file = %input.name, "file removed");
        Ok(())
    }

    /// Seal the room. Locking an already locked room succeeds without effect.
    pub fn lock(&mut self) {
        if !self.record.locked {
            self.record.locked = true;
            info!(room_id = %self.record.id, "data room locked");
        }
    }

    /// Authorize a public key on the room. The SPKI must parse.
    pub fn authorize_key(&mut self, key: &KeyInput) -> Result<()> {
        self.ensure_open()?;
        if key.key_id.is_empty() {
            return Err(DataRoomError::ValidationFailure(
                "key id must not be empty".to_string(),
            ));
        }
        if self.record.authorized_keys.iter().any(|k| k.key_id == key.key_id) {
            return Err(DataRoomError::AlreadyExists(format!("key {}", key.key_id)));
        }

        let canonical = canonical_spki(&key.spki_public_key)?;
        if let Some(existing) = self.find_key(&canonical) {
            return Err(DataRoomError::AlreadyExists(format!(
                "public key already authorized as {existing}"
            )));
        }

        self.record
            .authorized_keys
            .push(AuthorizedKey::new(key.key_id.as_str(), canonical));
        info!(room_id = %self.record.id, key_id = %key.key_id, "key authorized");
        Ok(())
    }

    pub fn revoke_key(&mut self, key_id: &str) -> Result<()> {
        self.ensure_open()?;
        let Some(index) = self
            .record
            .authorized_keys
            .iter()
            .position(|k| k.key_id == key_id)
        else {
            return Err(DataRoomError::NotFound(format!(
                "key {key_id} in data room {}",
                self.record.id
            )));
        };
        self.record.authorized_keys.remove(index);
        info!(room_id = %self.record.id, key_id, "key revoked");
        Ok(())
    }
}

/// SPKI PEM re-exported from the parsed key, so every encoding of one key
/// yields the same string.
fn canonical_spki(spki: &str) -> Result<String> {
    Ok(EcdsaKey::import_spki(spki)?.export_public_pem()?)
}
