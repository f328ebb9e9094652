//! Runtime error types.

use rill_core::{ChannelId, ReactorId};
use thiserror::Error;

/// Errors raised when spawning a reactor.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// A reactor with the same id is already registered.
    #[error("duplicate reactor id: {0}")]
    DuplicateReactorId(ReactorId),
    /// The designated parent is not (or no longer) registered.
    #[error("parent reactor not found: {0}")]
    ParentNotFound(ReactorId),
}

/// Errors raised by driver initialization and teardown.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The channel could not be brought up.
    #[error("channel {channel} failed to initialize: {reason}")]
    Init {
        /// The failing channel.
        channel: ChannelId,
        /// Driver-specific cause.
        reason: String,
    },
    /// An I/O error on the channel's backing resource.
    #[error("i/o error on channel {channel}")]
    Io {
        /// The failing channel.
        channel: ChannelId,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}
