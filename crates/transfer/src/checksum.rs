use sha2::{Digest, Sha256};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns `true` when `expected` (hex, case-insensitive) matches `data`.
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    checksum_bytes(data).eq_ignore_ascii_case(expected.trim())
}
