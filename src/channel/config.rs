//! Channel configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::MIN_KEY_BITS;

/// ElGamal modulus size used when none is configured.
pub const DEFAULT_KEY_BITS: u64 = 512;

/// Default capacity of the outbound and inbound message queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default cap on a single frame's declared length (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Configuration for a secure channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    /// Bit length of the ElGamal modulus generated for each channel.
    pub key_bits: u64,

    /// Capacity of the outbound message queue.
    pub send_queue_depth: usize,

    /// Capacity of the inbound message queue.
    pub recv_queue_depth: usize,

    /// Largest frame length accepted from the peer or queued for sending.
    pub max_frame_len: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            send_queue_depth: DEFAULT_QUEUE_DEPTH,
            recv_queue_depth: DEFAULT_QUEUE_DEPTH,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ChannelConfig {
    /// Load a config from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ChannelConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the ElGamal modulus size.
    pub fn with_key_bits(mut self, bits: u64) -> Self {
        self.key_bits = bits;
        self
    }

    /// Set the frame length cap.
    pub fn with_max_frame_len(mut self, max: u64) -> Self {
        self.max_frame_len = max;
        self
    }

    /// Set both queue capacities.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.send_queue_depth = depth;
        self.recv_queue_depth = depth;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Invalid(format!(
                "key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.key_bits
            )));
        }
        if self.send_queue_depth == 0 || self.recv_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "queue depths must be non-zero".to_string(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_len must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
