//! Persisted record shapes.

use crate::encoding::serde_b64;
use crate::ids::random_id;
use serde::{Deserialize, Serialize};

/// A public key authorized on a data room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedKey {
    pub key_id: String,
    /// SPKI public key as supplied (PEM or base64 DER).
    pub spki_public_key: String,
}

impl AuthorizedKey {
    pub fn new(key_id: impl Into<String>, spki_public_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            spki_public_key: spki_public_key.into(),
        }
    }
}

/// Stored state of a single data room.
///
/// A removed room is persisted as a tombstone: every field cleared, the id
/// included. Loaders treat a tombstone as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRoomRecord {
    pub id: String,
    #[serde(default)]
    pub authorized_keys: Vec<AuthorizedKey>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub locked: bool,
}

impl DataRoomRecord {
    /// Create an open, empty room. An empty `id` is replaced by a random one.
    pub fn new(id: &str) -> Self {
        let id = if id.is_empty() {
            random_id()
        } else {
            id.to_string()
        };
        Self {
            id,
            ..Default::default()
        }
    }

    /// The cleared form written in place of a removed room.
    pub fn tombstone() -> Self {
        Self::default()
    }

    pub fn is_tombstone(&self) -> bool {
        self.id.is_empty()
    }
}

/// Metadata of a file admitted into a room.
///
/// Created once on admission and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub data_room_id: String,
    pub name: String,
    #[serde(with = "serde_b64::array32")]
    pub digest: [u8; 32],
    #[serde(rename = "type")]
    pub file_type: String,
    /// Opaque reference to the content encryption key; never interpreted here.
    pub key: String,
    #[serde(with = "serde_b64::bytes")]
    pub token: Vec<u8>,
}

impl FileRecord {
    pub fn new(
        data_room_id: impl Into<String>,
        name: impl Into<String>,
        digest: [u8; 32],
        file_type: impl Into<String>,
        key: impl Into<String>,
        token: Vec<u8>,
    ) -> Self {
        Self {
            id: random_id(),
            data_room_id: data_room_id.into(),
            name: name.into(),
            digest,
            file_type: file_type.into(),
            key: key.into(),
            token,
        }
    }
}

/// Singleton record holding the two key handles.
///
/// Each handle goes from `None` to `Some` once; there is no rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreRecord {
    #[serde(default)]
    pub backend_signing_key: Option<String>,
    #[serde(default)]
    pub webserver_verification_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_generates_id_when_empty() {
        let room = DataRoomRecord::new("");
        assert!(!room.id.is_empty());
        assert!(!room.locked);
        assert!(room.files.is_empty());
        assert!(room.authorized_keys.is_empty());

        let named = DataRoomRecord::new("board-2024");
        assert_eq!(named.id, "board-2024");
    }

    #[test]
    fn tombstone_is_recognised() {
        assert!(DataRoomRecord::tombstone().is_tombstone());
        assert!(!DataRoomRecord::new("r").is_tombstone());
    }

    #[test]
    fn file_record_json_uses_base64_and_type_field() {
        let record = FileRecord::new("room", "a.txt", [1u8; 32], "text/plain", "kref", vec![9u8; 104]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "text/plain");
        assert!(json["digest"].is_string());
        assert!(json["token"].is_string());

        let back: FileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
