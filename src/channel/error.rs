//! Channel error types.

use thiserror::Error;

use crate::channel::config::ConfigError;
use crate::crypto::{AsymmetricError, SymmetricError};

/// Errors that can occur while establishing or using a secure channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Block cipher construction or use failed.
    #[error("Symmetric cipher error: {0}")]
    Symmetric(#[from] SymmetricError),

    /// ElGamal key transport failed.
    #[error("Asymmetric cipher error: {0}")]
    Asymmetric(#[from] AsymmetricError),

    /// The stream ended in the middle of a frame.
    #[error("Incomplete read: expected {expected} bytes, got {got}")]
    IncompleteRead {
        /// Bytes the frame declared.
        expected: usize,
        /// Bytes actually read before end-of-stream.
        got: usize,
    },

    /// Both peers drew the same 32-byte secret, so no direction can be assigned.
    #[error("Local and peer secrets are identical; cannot assign channel directions")]
    SecretCollision,

    /// The channel was used before the handshake finished.
    #[error("Handshake has not completed")]
    HandshakeIncomplete,

    /// A frame declared more bytes than the configured limit.
    #[error("Frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge {
        /// Declared frame length.
        len: u64,
        /// Configured maximum.
        max: u64,
    },

    /// The peer sent something the handshake cannot interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The channel configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A spawned task panicked or was cancelled.
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// The pipeline task for this direction has stopped.
    #[error("Channel closed")]
    Closed,

    /// I/O error on the underlying connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Whether the error leaves the connection unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}
