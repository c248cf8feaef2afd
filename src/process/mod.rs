//! Process execution
//!
//! - `consumer`: per-line sinks for child output
//! - `drain`: one task per stream, reading until the writer closes it
//! - `runner`: spawn, drain both streams, wait, join, report

pub mod consumer;
pub mod drain;
pub mod runner;

pub use consumer::{FnConsumer, LineCollector, LineConsumer, TeeConsumer};
pub use drain::{DrainHandle, Drained, StreamDrainer, StreamKind};
pub use runner::{CancelToken, Finished, Interrupt, ProcessResult, ProcessRunner};
