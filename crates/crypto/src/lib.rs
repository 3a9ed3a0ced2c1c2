//! Cryptographic primitives for data rooms
//!
//! * [`EcdsaKey`]: an ECDSA secp256r1 key capability exposing `sign`,
//!   `verify` and public export. Private scalars never leave the value.
//! * [`StoredKey`]: the serializable form a key vault persists.
//! * [`FileDigest`]: SHA-256 content digest bound into upload tokens.

pub mod ecdsa;
pub mod hash_functions;

pub use ecdsa::{EcdsaKey, StoredKey, StoredKeyKind, SIGNATURE_LEN};
pub use hash_functions::FileDigest;

use dataroom_types::EncodingError;
use thiserror::Error;

/// Errors raised at the cryptographic layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("key cannot sign: only the public half is held")]
    SigningUnavailable,
    #[error("key export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
