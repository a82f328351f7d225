//! Public-key commitment.
//!
//! The commitment is the SHA-256 digest of the long-term public key in DER
//! form. Centrals that already know the key can recompute it offline, which
//! is what makes the derived service UUID recognisable without broadcasting
//! the key itself.

use crate::error::{IdentityError, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a commitment in bytes.
pub const COMMITMENT_LEN: usize = 32;

/// A 32-byte commitment to a long-term public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment([u8; COMMITMENT_LEN]);

impl Commitment {
    /// Derive a commitment by hashing key material.
    pub fn digest(material: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(material);
        let hash = hasher.finalize();

        let mut bytes = [0u8; COMMITMENT_LEN];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Wrap an existing 32-byte commitment.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCommitment`] when `bytes` is not
    /// exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMMITMENT_LEN {
            return Err(IdentityError::InvalidCommitment {
                expected: COMMITMENT_LEN,
                got: bytes.len(),
            });
        }

        let mut fixed = [0u8; COMMITMENT_LEN];
        fixed.copy_from_slice(bytes);
        Ok(Self(fixed))
    }

    /// The raw commitment bytes.
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
