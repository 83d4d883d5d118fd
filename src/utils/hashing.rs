//! Content hashing for incremental scans

use sha2::{Digest, Sha256};

/// SHA-256 of the file bytes, lowercase hex. Equal hashes mean the scanner can
/// skip reparsing the file.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
