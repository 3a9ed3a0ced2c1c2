//! Data room core: key provisioning, upload-token admission, room life cycle
//! and the registry of rooms.
//!
//! State lives in a [`dataroom_storage::KvStore`]; [`DataRoomService`] is the
//! entry point that turns each logical operation into one atomic batch.

pub mod clock;
pub mod config;
pub mod errors;
pub mod file;
pub mod keys;
pub mod registry;
pub mod room;
pub mod service;
pub mod token;
pub mod vault;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServiceConfig;
pub use errors::{DataRoomError, ErrorKind, Result};
pub use keys::KeyStore;
pub use registry::DataRoomRegistry;
pub use room::DataRoom;
pub use service::DataRoomService;
pub use token::{TokenPolicy, TokenVerifier, UploadToken, TOKEN_LEN};
pub use vault::KeyVault;
