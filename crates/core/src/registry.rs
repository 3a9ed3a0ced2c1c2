//! Registry of existing data room ids.
//!
//! The index lives in its own table so a room may be named `ALL` without
//! clashing with the index record.

use crate::errors::{DataRoomError, Result};
use crate::room::DataRoom;
use dataroom_storage::{KvStore, WriteBatch};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DATA_ROOM_INDEX_TABLE: &str = "DataRoomIndexTable";
const INDEX_KEY: &str = "ALL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRoomRegistry {
    #[serde(rename = "dataRooms")]
    ids: Vec<String>,
}

impl DataRoomRegistry {
    pub fn load<S: KvStore>(store: &S) -> Result<Self> {
        Ok(store
            .get_json(DATA_ROOM_INDEX_TABLE, INDEX_KEY)?
            .unwrap_or_default())
    }

    pub fn stage_save(&self, batch: &mut WriteBatch) -> Result<()> {
        batch.set_json(DATA_ROOM_INDEX_TABLE, INDEX_KEY, self)?;
        Ok(())
    }

    /// Create an empty room, staging both the room and the updated index.
    /// An empty `requested_id` gets a random id.
    pub fn create<S: KvStore>(
        &mut self,
        store: &S,
        requested_id: &str,
        batch: &mut WriteBatch,
    ) -> Result<String> {
        if !requested_id.is_empty() && DataRoom::load(store, requested_id)?.is_some() {
            return Err(DataRoomError::AlreadyExists(format!(
                "data room {requested_id}"
            )));
        }

        let room = DataRoom::new(requested_id);
        room.stage_save(batch)?;
        self.ids.push(room.id().to_string());
        self.stage_save(batch)?;
        info!(room_id = %room.id(), "data room created");
        Ok(room.id().to_string())
    }

    /// Tombstone a room and drop it from the index.
    pub fn remove<S: KvStore>(
        &mut self,
        store: &S,
        room_id: &str,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        let room = DataRoom::require(store, room_id)?;
        room.stage_tombstone(batch)?;
        self.ids.retain(|id| id != room_id);
        self.stage_save(batch)?;
        info!(room_id, "data room removed");
        Ok(())
    }

    /// Known room ids in creation order.
    pub fn list(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.ids.iter().any(|id| id == room_id)
    }
}
