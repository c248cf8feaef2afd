//! Script sources
//!
//! Turns literal script text or a URL into a file in the content cache.

pub mod fetch;
pub mod kind;
pub mod source;

pub use fetch::{Fetcher, HttpFetcher};
pub use kind::ScriptKind;
pub use source::{ScriptOrigin, ScriptSource, LITERAL_PREFIX, URL_PREFIX};
