use std::time::Duration;

use crate::error::{JanusErrorCode, Result};
use crate::error::JanusError;

/// Configuration for [`crate::client::JanusClient`].
///
/// Defaults mirror the caps named in the resource model: 64 KiB transport
/// messages, 1000 pending requests, validation enabled when a Manifest is
/// available.
#[derive(Debug, Clone)]
pub struct JanusClientConfig {
    /// Maximum transport message size in bytes (default 64 KiB).
    pub max_message_size: usize,
    /// Per-request default timeout when none is supplied (default 30s).
    pub default_timeout: Duration,
    /// Maximum args JSON blob size in bytes (default 64 KiB).
    pub max_args_data_size: usize,
    /// Maximum socket path / channel / request name lengths.
    pub max_channel_name_length: usize,
    pub max_request_name_length: usize,
    /// Maximum concurrently pending requests.
    pub max_pending_requests: usize,
    /// Whether Manifest-driven argument validation is attempted.
    pub enable_validation: bool,
    /// How often the correlation engine's cleanup sweep runs.
    pub cleanup_interval: Duration,
}

impl Default for JanusClientConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024,
            default_timeout: Duration::from_secs(30),
            max_args_data_size: 64 * 1024,
            max_channel_name_length: 64,
            max_request_name_length: 64,
            max_pending_requests: 1000,
            enable_validation: true,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl JanusClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrictive limits suited to untrusted or adversarial peers.
    pub fn secure() -> Self {
        Self {
            max_message_size: 16 * 1024,
            default_timeout: Duration::from_secs(10),
            max_args_data_size: 16 * 1024,
            max_channel_name_length: 32,
            max_request_name_length: 32,
            max_pending_requests: 100,
            enable_validation: true,
            cleanup_interval: Duration::from_secs(15),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_message_size > 10 * 1024 * 1024 {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "max_message_size must be between 1 and 10485760 bytes",
            ));
        }
        if self.max_pending_requests == 0 {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "max_pending_requests must be greater than 0",
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "default_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(JanusClientConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_pending_requests_rejected() {
        let mut cfg = JanusClientConfig::default();
        cfg.max_pending_requests = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_message_limit_rejected() {
        let mut cfg = JanusClientConfig::default();
        cfg.max_message_size = 20 * 1024 * 1024;
        assert!(cfg.validate().is_err());
    }
}
