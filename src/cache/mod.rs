//! Content-addressed script cache
//!
//! Files are named `<prefix>.<digest>.<extension>` beneath an explicit cache
//! directory. Same bytes, same digest, same file.
//!
//! # Guarantees
//!
//! - Identity depends only on the digested bytes; prefix and extension only
//!   shape the file name
//! - Entries are write-once: an existing file is returned untouched
//! - Writes are published atomically, so concurrent callers never observe a
//!   partial file
//! - Nothing is evicted implicitly; `clear` is an explicit user action

pub mod digest;
pub mod store;

pub use digest::{digest_hex, DIGEST_HEX_LEN};
pub use store::{format_bytes, CacheEntry, ContentCache};
