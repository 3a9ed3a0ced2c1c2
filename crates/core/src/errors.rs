//! Error types for data room operations

use dataroom_crypto::CryptoError;
use dataroom_storage::StorageError;
use dataroom_types::EncodingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataRoomError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Coarse classification of a [`DataRoomError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidState,
    ValidationFailure,
    CryptoFailure,
    Storage,
}

impl DataRoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataRoomError::NotFound(_) => ErrorKind::NotFound,
            DataRoomError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DataRoomError::InvalidState(_) => ErrorKind::InvalidState,
            DataRoomError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            DataRoomError::CryptoFailure(_) => ErrorKind::CryptoFailure,
            DataRoomError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<CryptoError> for DataRoomError {
    fn from(err: CryptoError) -> Self {
        DataRoomError::CryptoFailure(err.to_string())
    }
}

impl From<EncodingError> for DataRoomError {
    fn from(err: EncodingError) -> Self {
        DataRoomError::ValidationFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataRoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_right_kind() {
        let crypto: DataRoomError = CryptoError::SigningUnavailable.into();
        assert_eq!(crypto.kind(), ErrorKind::CryptoFailure);

        let encoding: DataRoomError = EncodingError::InvalidLength {
            field: "digestB64",
            expected: 32,
            actual: 3,
        }
        .into();
        assert_eq!(encoding.kind(), ErrorKind::ValidationFailure);
        assert!(encoding.to_string().contains("digestB64"));

        let storage: DataRoomError = StorageError::Aborted.into();
        assert_eq!(storage.kind(), ErrorKind::Storage);
    }
}
