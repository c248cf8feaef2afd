//! scriptrun - cached script execution
//!
//! Materializes scripts from literal text or URLs into a content-addressed
//! cache, and runs external commands while draining stdout and stderr
//! concurrently so heavy output can never deadlock the parent.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod process;
pub mod script;

pub use error::{ScriptrunError, ScriptrunResult};
