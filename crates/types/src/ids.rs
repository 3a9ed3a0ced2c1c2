//! Random identifier generation for rooms, files, and vault handles.

use crate::encoding::encode_b64;
use rand_core::{OsRng, RngCore};

/// Number of random bytes behind every generated identifier.
pub const RANDOM_ID_BYTES: usize = 64;

/// Generate a fresh identifier: 64 bytes from the OS CSPRNG, base64-encoded.
///
/// Collisions are not checked; the probability for 512 random bits is
/// treated as negligible.
pub fn random_id() -> String {
    let mut bytes = [0u8; RANDOM_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    encode_b64(&bytes)
}
