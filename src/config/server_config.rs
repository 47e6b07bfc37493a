use std::time::Duration;

use crate::error::{JanusError, JanusErrorCode, Result};

/// Configuration for [`crate::server::JanusServer`].
#[derive(Debug, Clone)]
pub struct JanusServerConfig {
    /// Maximum transport message size in bytes (default 64 KiB).
    pub max_message_size: usize,
    /// Maximum registered handlers (default 100).
    pub max_handlers: usize,
    /// Maximum tracked client records (default 100); least-recently-active
    /// is evicted once full.
    pub max_active_clients: usize,
    /// Default per-request handler deadline when a reply is expected.
    pub default_request_timeout: Duration,
    /// How long a client record may sit idle before it is purged.
    pub client_inactivity_window: Duration,
    /// Poll interval for the non-blocking receive loop.
    pub poll_interval: Duration,
    /// Remove a pre-existing socket inode at bind time.
    pub cleanup_on_start: bool,
    /// Remove the socket inode when `stop()` completes.
    pub cleanup_on_shutdown: bool,
}

impl Default for JanusServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024,
            max_handlers: 100,
            max_active_clients: 100,
            default_request_timeout: Duration::from_secs(30),
            client_inactivity_window: Duration::from_secs(300),
            poll_interval: Duration::from_millis(10),
            cleanup_on_start: true,
            cleanup_on_shutdown: true,
        }
    }
}

impl JanusServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_message_size > 10 * 1024 * 1024 {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "max_message_size must be between 1 and 10485760 bytes",
            ));
        }
        if self.max_handlers == 0 {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "max_handlers must be greater than 0",
            ));
        }
        if self.max_active_clients == 0 {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "max_active_clients must be greater than 0",
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
        assert!(JanusServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_handlers_rejected() {
        let mut cfg = JanusServerConfig::default();
        cfg.max_handlers = 0;
        assert!(cfg.validate().is_err());
    }
}
