//! Submission Digests
//!
//! SHA-256 digests of target-data submissions. The authority keys its
//! replay cache on `(unique_id, digest)` so a legitimately resubmitted batch
//! gets the cached reply, while a different batch that reuses an id after
//! reconciliation is processed fresh.

use sha2::{Sha256, Digest};
use super::vec3::Vec3;

/// Digest output type (256 bits / 32 bytes)
pub type DigestBytes = [u8; 32];

/// Deterministic hasher for wire payloads.
///
/// Wraps SHA-256 with helpers for the crate's value types.
/// Order of updates is critical for determinism.
pub struct PayloadHasher {
    hasher: Sha256,
}

impl PayloadHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for target-data submissions.
    pub fn for_submission() -> Self {
        Self::new(b"RANGED_FIRE_SUBMISSION_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f32 by bit pattern.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// Update with a Vec3.
    #[inline]
    pub fn update_vec3(&mut self, value: Vec3) {
        self.update_f32(value.x);
        self.update_f32(value.y);
        self.update_f32(value.z);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> DigestBytes {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> DigestBytes {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
