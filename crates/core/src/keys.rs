//! Backend signing key and trusted webserver verification key.
//!
//! Both are one-shot: once a handle is set it cannot be regenerated or
//! re-imported. [`KeyStore::clear`] forgets the handles but leaves the
//! material in the vault, so a later re-import of the same public key is
//! indistinguishable from a fresh one.

use crate::errors::{DataRoomError, Result};
use crate::vault::KeyVault;
use dataroom_crypto::EcdsaKey;
use dataroom_storage::{KvStore, WriteBatch};
use dataroom_types::{KeyIdentities, KeyStoreRecord};
use tracing::{debug, info};

pub const KEYS_TABLE: &str = "KeysTable";
const KEYS_RECORD_KEY: &str = "ALL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStore {
    record: KeyStoreRecord,
}

impl KeyStore {
    /// Load the singleton record; an absent record is an empty store.
    pub fn load<S: KvStore>(store: &S) -> Result<Self> {
        let record = store
            .get_json::<KeyStoreRecord>(KEYS_TABLE, KEYS_RECORD_KEY)?
            .unwrap_or_default();
        Ok(Self { record })
    }

    pub fn stage_save(&self, batch: &mut WriteBatch) -> Result<()> {
        batch.set_json(KEYS_TABLE, KEYS_RECORD_KEY, &self.record)?;
        Ok(())
    }

    pub fn record(&self) -> &KeyStoreRecord {
        &self.record
    }

    /// Create the backend P-256 key pair inside the vault.
    pub fn generate_backend_signing_key<S: KvStore>(
        &mut self,
        vault: &KeyVault<'_, S>,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if let Some(existing) = &self.record.backend_signing_key {
            return Err(DataRoomError::AlreadyExists(format!(
                "backend signing key {existing}"
            )));
        }

        let key = EcdsaKey::generate();
        let handle = vault.stage_insert(&key, batch)?;
        info!(fingerprint = %key.fingerprint()?, "backend signing key created");
        self.record.backend_signing_key = Some(handle);
        Ok(())
    }

    /// Import the trusted issuer's SPKI public key (PEM or base64 DER).
    pub fn import_webserver_verification_key<S: KvStore>(
        &mut self,
        vault: &KeyVault<'_, S>,
        spki_public_key: &str,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if let Some(existing) = &self.record.webserver_verification_key {
            return Err(DataRoomError::AlreadyExists(format!(
                "webserver verification key {existing}"
            )));
        }

        let key = EcdsaKey::import_spki(spki_public_key)?;
        let handle = vault.stage_insert(&key, batch)?;
        info!(fingerprint = %key.fingerprint()?, "webserver verification key imported");
        self.record.webserver_verification_key = Some(handle);
        Ok(())
    }

    /// Forget both handles. Vault material is left in place.
    pub fn clear(&mut self) {
        self.record = KeyStoreRecord::default();
        info!("backend and webserver key handles cleared");
    }

    /// Public identities of both keys as SPKI PEM.
    pub fn list<S: KvStore>(&self, vault: &KeyVault<'_, S>) -> Result<KeyIdentities> {
        let backend_public_key = self
            .record
            .backend_signing_key
            .as_deref()
            .map(|h| export_public_pem(vault, h))
            .transpose()?;
        let webserver_public_key = self
            .record
            .webserver_verification_key
            .as_deref()
            .map(|h| export_public_pem(vault, h))
            .transpose()?;

        let identities = KeyIdentities {
            backend_public_key,
            webserver_public_key,
        };
        if identities.is_empty() {
            info!("no keys have been set yet");
        }
        Ok(identities)
    }

    /// The backend key pair, if provisioned.
    pub fn backend_signing_key<S: KvStore>(
        &self,
        vault: &KeyVault<'_, S>,
    ) -> Result<Option<EcdsaKey>> {
        self.record
            .backend_signing_key
            .as_deref()
            .map(|h| resolve_required(vault, h))
            .transpose()
    }

    /// The trusted issuer key used to verify upload tokens.
    ///
    /// `Ok(None)` when no key was imported. A handle the vault cannot
    /// resolve is a crypto failure, not a missing configuration.
    pub fn webserver_verification_key<S: KvStore>(
        &self,
        vault: &KeyVault<'_, S>,
    ) -> Result<Option<EcdsaKey>> {
        let Some(handle) = self.record.webserver_verification_key.as_deref() else {
            return Ok(None);
        };
        match resolve_required(vault, handle) {
            Ok(key) => Ok(Some(key)),
            Err(DataRoomError::NotFound(what)) => Err(DataRoomError::CryptoFailure(format!(
                "issue retrieving the key: {what}"
            ))),
            Err(e) => Err(e),
        }
    }
}

fn export_public_pem<S: KvStore>(vault: &KeyVault<'_, S>, handle: &str) -> Result<String> {
    Ok(resolve_required(vault, handle)?.export_public_pem()?)
}

fn resolve_required<S: KvStore>(vault: &KeyVault<'_, S>, handle: &str) -> Result<EcdsaKey> {
    debug!(handle, "resolving key handle");
    vault
        .resolve(handle)?
        .ok_or_else(|| DataRoomError::NotFound(format!("key handle {handle}")))
}
