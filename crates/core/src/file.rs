//! File record persistence.
//!
//! Records are keyed by the owning room and the file name, so two rooms may
//! hold files with the same name without clobbering each other.

use crate::errors::Result;
use crate::token::DIGEST_LEN;
use dataroom_storage::{KvStore, WriteBatch};
use dataroom_types::{decode_b64, decode_b64_array, FileInput, FileRecord};
use tracing::debug;

pub const FILES_TABLE: &str = "FilesTable";

/// Storage key for `name` inside `room_id`. The room id is length-prefixed
/// so no (room, name) pair can collide with another.
pub fn file_key(room_id: &str, name: &str) -> String {
    format!("{}:{}/{}", room_id.len(), room_id, name)
}

/// Decode the base64 fields of `input` into a candidate record.
pub fn candidate_from_input(room_id: &str, input: &FileInput) -> Result<FileRecord> {
    let digest: [u8; DIGEST_LEN] = decode_b64_array("digestB64", &input.digest_b64)?;
    let token = decode_b64("tokenB64", &input.token_b64)?;
    Ok(FileRecord::new(
        room_id,
        input.name.as_str(),
        digest,
        input.file_type.as_str(),
        input.key.as_str(),
        token,
    ))
}

pub fn load<S: KvStore>(store: &S, room_id: &str, name: &str) -> Result<Option<FileRecord>> {
    let record = store.get_json(FILES_TABLE, &file_key(room_id, name))?;
    debug!(room_id, name, found = record.is_some(), "file record lookup");
    Ok(record)
}

pub fn stage_save(record: &FileRecord, batch: &mut WriteBatch) -> Result<()> {
    batch.set_json(
        FILES_TABLE,
        &file_key(&record.data_room_id, &record.name),
        record,
    )?;
    Ok(())
}

pub fn stage_delete(room_id: &str, name: &str, batch: &mut WriteBatch) {
    batch.unset(FILES_TABLE, &file_key(room_id, name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use dataroom_storage::MemoryKvStore;
    use dataroom_types::encode_b64;

    fn input(digest: &[u8], token: &[u8]) -> FileInput {
        FileInput {
            name: "a.txt".into(),
            digest_b64: encode_b64(digest),
            file_type: "text/plain".into(),
            key: "key-ref".into(),
            token_b64: encode_b64(token),
        }
    }

    #[test]
    fn keys_do_not_collide_across_rooms() {
        assert_ne!(file_key("a/b", "c"), file_key("a", "b/c"));
        assert_ne!(file_key("room", "x"), file_key("room2", "x"));
    }

    #[test]
    fn candidate_decodes_fields() {
        let record = candidate_from_input("room", &input(&[3u8; 32], &[4u8; 104])).unwrap();
        assert_eq!(record.digest, [3u8; 32]);
        assert_eq!(record.token, vec![4u8; 104]);
        assert_eq!(record.data_room_id, "room");
        assert_eq!(record.file_type, "text/plain");
        assert!(!record.id.is_empty());
    }

    #[test]
    fn candidate_rejects_short_digest_and_bad_base64() {
        let err = candidate_from_input("room", &input(&[3u8; 31], &[4u8; 104])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);

        let mut bad = input(&[3u8; 32], &[4u8; 104]);
        bad.token_b64 = "@@@".into();
        let err = candidate_from_input("room", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn save_load_delete() {
        let store = MemoryKvStore::new();
        let record = candidate_from_input("room", &input(&[1u8; 32], &[2u8; 104])).unwrap();

        let mut batch = WriteBatch::new();
        stage_save(&record, &mut batch).unwrap();
        store.apply(batch).unwrap();
        assert_eq!(load(&store, "room", "a.txt").unwrap(), Some(record));
        assert_eq!(load(&store, "other", "a.txt").unwrap(), None);

        let mut batch = WriteBatch::new();
        stage_delete("room", "a.txt", &mut batch);
        store.apply(batch).unwrap();
        assert_eq!(load(&store, "room", "a.txt").unwrap(), None);
    }
}
