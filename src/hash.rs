//! SHA-256 helper shared by cache keys, temp references and remote ids

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the input string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
