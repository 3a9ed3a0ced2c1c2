//! Operation payloads as submitted by callers.
//!
//! Field names follow the camelCase wire convention (`dataRoomId`,
//! `digestB64`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// File metadata plus its upload token, both binary fields base64-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInput {
    pub name: String,
    pub digest_b64: String,
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default)]
    pub key: String,
    pub token_b64: String,
}

impl FileInput {
    /// Input naming a file only, as used by removal.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A public key to authorize on, or revoke from, a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInput {
    pub key_id: String,
    #[serde(default)]
    pub spki_public_key: String,
}

/// Mutations accepted by `updateDataRoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomOperation {
    AddFile,
    RemoveFile,
    Lock,
    AuthorizeKey,
    RevokeKey,
}

impl fmt::Display for RoomOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomOperation::AddFile => "addFile",
            RoomOperation::RemoveFile => "removeFile",
            RoomOperation::Lock => "lock",
            RoomOperation::AuthorizeKey => "authorizeKey",
            RoomOperation::RevokeKey => "revokeKey",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataRoomInput {
    pub data_room_id: String,
    pub operation: RoomOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyInput>,
}

impl UpdateDataRoomInput {
    pub fn add_file(data_room_id: impl Into<String>, file: FileInput) -> Self {
        Self {
            data_room_id: data_room_id.into(),
            operation: RoomOperation::AddFile,
            file: Some(file),
            key: None,
        }
    }

    pub fn remove_file(data_room_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            data_room_id: data_room_id.into(),
            operation: RoomOperation::RemoveFile,
            file: Some(FileInput::named(name)),
            key: None,
        }
    }

    pub fn lock(data_room_id: impl Into<String>) -> Self {
        Self {
            data_room_id: data_room_id.into(),
            operation: RoomOperation::Lock,
            file: None,
            key: None,
        }
    }

    pub fn authorize_key(data_room_id: impl Into<String>, key: KeyInput) -> Self {
        Self {
            data_room_id: data_room_id.into(),
            operation: RoomOperation::AuthorizeKey,
            file: None,
            key: Some(key),
        }
    }

    pub fn revoke_key(data_room_id: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            data_room_id: data_room_id.into(),
            operation: RoomOperation::RevokeKey,
            file: None,
            key: Some(KeyInput {
                key_id: key_id.into(),
                spki_public_key: String::new(),
            }),
        }
    }
}
