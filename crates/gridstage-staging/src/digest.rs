//! Content fingerprints used to name staged files.
//!
//! The naming scheme is fixed (`{prefix}_{hex}`); the digest behind the hex
//! is pluggable so deployments can choose it and tests can force collisions.

use std::fmt::Write as _;
use std::sync::Arc;

use gridstage_config::DigestAlgorithm;
use sha2::{Digest as _, Sha256, Sha512};

/// Produces a lowercase hex fingerprint of byte content.
pub trait ContentDigest: Send + Sync {
    /// Short algorithm name for logs.
    fn name(&self) -> &'static str;

    /// Lowercase hex digest of `content`.
    fn hex_digest(&self, content: &[u8]) -> String;
}

/// SHA-256 fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl ContentDigest for Sha256Digest {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn hex_digest(&self, content: &[u8]) -> String {
        to_hex(&Sha256::digest(content))
    }
}

/// SHA-512 fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Digest;

impl ContentDigest for Sha512Digest {
    fn name(&self) -> &'static str {
        "sha512"
    }

    fn hex_digest(&self, content: &[u8]) -> String {
        to_hex(&Sha512::digest(content))
    }
}

/// BLAKE3 fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Digest;

impl ContentDigest for Blake3Digest {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn hex_digest(&self, content: &[u8]) -> String {
        blake3::hash(content).to_hex().to_string()
    }
}

/// Digest implementation for a configured algorithm.
#[must_use]
pub fn digest_for(algorithm: DigestAlgorithm) -> Arc<dyn ContentDigest> {
    match algorithm {
        DigestAlgorithm::Sha256 => Arc::new(Sha256Digest),
        DigestAlgorithm::Sha512 => Arc::new(Sha512Digest),
        DigestAlgorithm::Blake3 => Arc::new(Blake3Digest),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
