//! File upload tokens and their verification.
//!
//! Wire format, exactly 104 bytes:
//!
//! | bytes    | content                                   |
//! |----------|-------------------------------------------|
//! | 0..32    | SHA-256 digest of the file                |
//! | 32..40   | issue time, little-endian u64, ms since epoch |
//! | 40..104  | ECDSA P-256 signature (`r ‖ s`) over bytes 0..40 |
//!
//! A token is a capability: a valid signature from the trusted issuer over
//! `(digest, timestamp)` is the only authorization needed to admit a file.

use crate::errors::{DataRoomError, Result};
use dataroom_crypto::{EcdsaKey, SIGNATURE_LEN};
use dataroom_types::encode_b64;
use std::time::Duration;

pub const DIGEST_LEN: usize = 32;
pub const TIMESTAMP_LEN: usize = 8;
/// Length of the signed prefix (digest ‖ timestamp).
pub const SIGNED_LEN: usize = DIGEST_LEN + TIMESTAMP_LEN;
pub const TOKEN_LEN: usize = SIGNED_LEN + SIGNATURE_LEN;

/// Decoded upload token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken {
    pub digest: [u8; DIGEST_LEN],
    pub timestamp_ms: u64,
    pub signature: [u8; SIGNATURE_LEN],
}

impl UploadToken {
    /// Split raw token bytes into their fields. Only the length is checked.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TOKEN_LEN {
            return Err(DataRoomError::ValidationFailure(format!(
                "invalid token size: expected {TOKEN_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[..DIGEST_LEN]);
        let mut timestamp = [0u8; TIMESTAMP_LEN];
        timestamp.copy_from_slice(&bytes[DIGEST_LEN..SIGNED_LEN]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[SIGNED_LEN..]);

        Ok(Self {
            digest,
            timestamp_ms: u64::from_le_bytes(timestamp),
            signature,
        })
    }

    /// Issuer side: sign `digest ‖ timestamp` with `signer`.
    pub fn issue(digest: [u8; DIGEST_LEN], timestamp_ms: u64, signer: &EcdsaKey) -> Result<Self> {
        let message = signed_message(&digest, timestamp_ms);
        let signature = signer.sign(&message)?;
        Ok(Self {
            digest,
            timestamp_ms,
            signature,
        })
    }

    pub fn signed_message(&self) -> [u8; SIGNED_LEN] {
        signed_message(&self.digest, self.timestamp_ms)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TOKEN_LEN);
        out.extend_from_slice(&self.signed_message());
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn to_b64(&self) -> String {
        encode_b64(&self.to_bytes())
    }
}

fn signed_message(digest: &[u8; DIGEST_LEN], timestamp_ms: u64) -> [u8; SIGNED_LEN] {
    let mut message = [0u8; SIGNED_LEN];
    message[..DIGEST_LEN].copy_from_slice(digest);
    message[DIGEST_LEN..].copy_from_slice(&timestamp_ms.to_le_bytes());
    message
}

/// Token freshness rules. Disabled unless `max_age` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub max_age: Option<Duration>,
    /// Tolerance for tokens stamped ahead of the local clock.
    pub max_clock_skew: Duration,
}

impl TokenPolicy {
    pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(30);

    pub fn disabled() -> Self {
        Self {
            max_age: None,
            max_clock_skew: Self::DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn expiring(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            max_clock_skew: Self::DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }

    fn check(&self, timestamp_ms: u64, now_ms: u64) -> Result<()> {
        let Some(max_age) = self.max_age else {
            return Ok(());
        };

        let skew_ms = duration_ms(self.max_clock_skew);
        if timestamp_ms > now_ms.saturating_add(skew_ms) {
            return Err(DataRoomError::ValidationFailure(format!(
                "token issued in the future: {timestamp_ms} > {now_ms}"
            )));
        }
        if now_ms.saturating_sub(timestamp_ms) > duration_ms(max_age) {
            return Err(DataRoomError::ValidationFailure(format!(
                "token has expired: issued at {timestamp_ms}, now {now_ms}"
            )));
        }
        Ok(())
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

/// Admission check binding a token to a file digest and a trusted issuer key.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    policy: TokenPolicy,
}

impl TokenVerifier {
    pub fn new(policy: TokenPolicy) -> Self {
        Self { policy }
    }

    /// Verify `token` for `digest` under `trusted`. Checks run in order:
    /// size, digest binding, freshness (when enabled), signature.
    pub fn verify(
        &self,
        digest: &[u8; DIGEST_LEN],
        token: &[u8],
        trusted: &EcdsaKey,
        now_ms: u64,
    ) -> Result<UploadToken> {
        let parsed = UploadToken::parse(token)?;

        if parsed.digest != *digest {
            return Err(DataRoomError::ValidationFailure(format!(
                "token refers to a different file: {} != {}",
                encode_b64(digest),
                encode_b64(&parsed.digest)
            )));
        }

        self.policy.check(parsed.timestamp_ms, now_ms)?;

        if !trusted.verify(&token[..SIGNED_LEN], &parsed.signature) {
            return Err(DataRoomError::ValidationFailure(
                "invalid signature".to_string(),
            ));
        }

        Ok(parsed)
    }
}
