//! Content digests for cache identity
//!
//! SHA256 truncated to a fixed-length lowercase hex string. Used for
//! deduplication, not integrity: nothing here defends against adversarial input.

use sha2::{Digest, Sha256};

/// Length of every digest string, in hex characters
pub const DIGEST_HEX_LEN: usize = 16;

/// Hash `bytes` and return the first `DIGEST_HEX_LEN` hex characters
pub fn digest_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes.as_ref());
    let result = hasher.finalize();

    hex::encode(&result[..DIGEST_HEX_LEN / 2])
}

/// Whether `s` has the shape of a digest produced by `digest_hex`
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
