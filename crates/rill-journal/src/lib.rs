//! Journal-backed local driver for the rill reactor runtime.
//!
//! The journal reifies message ordering for co-located reactors: egress is
//! an append, ingress is a tail read, and the file outlives the process.
//! Peers advertised through the registry are reached by appending into
//! their journal directory.

#![deny(missing_docs)]

mod driver;
mod log;
mod pauser;

pub use driver::{JournalConfig, JournalDriver};
pub use log::{journal_path, Appender, JournalError, Tailer};
pub use pauser::Pauser;
