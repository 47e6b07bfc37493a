use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{JanusError, JanusErrorCode, JsonRpcError};

/// A single outbound call (§3, §6). Immutable once constructed; `id`
/// uniquely identifies it within the sender's correlation registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: String,
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Request {
    /// Builds a request with a fresh UUID v4 id and the current timestamp.
    pub fn new(request: impl Into<String>, args: Option<HashMap<String, serde_json::Value>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request: request.into(),
            reply_to: None,
            args,
            timeout: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: f64) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    pub fn timeout_duration(&self) -> Option<std::time::Duration> {
        self.timeout.map(std::time::Duration::from_secs_f64)
    }

    /// Structural validation independent of the Manifest — non-empty
    /// required strings, a sane timeout. See §4.1.
    pub fn validate_structure(&self) -> Result<(), JanusError> {
        if self.id.trim().is_empty() {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, "request id cannot be empty"));
        }
        if self.request.trim().is_empty() {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, "request name cannot be empty"));
        }
        if let Some(timeout) = self.timeout {
            if !(timeout > 0.0) || !timeout.is_finite() {
                return Err(JanusError::new(JanusErrorCode::ValidationFailed, "timeout must be positive"));
            }
        }
        Ok(())
    }
}

/// The reply to a single [`Request`] (§3, §6). Exactly one of `result` and
/// `error` is populated, matching `success`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub timestamp: f64,
}

impl Response {
    pub fn success(request_id: impl Into<String>, result: Option<serde_json::Value>) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            result,
            error: None,
            timestamp: now_epoch_secs(),
        }
    }

    pub fn error(request_id: impl Into<String>, error: JsonRpcError) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            result: None,
            error: Some(error),
            timestamp: now_epoch_secs(),
        }
    }

    pub fn validate_structure(&self) -> Result<(), JanusError> {
        if self.request_id.trim().is_empty() {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, "request_id cannot be empty"));
        }
        if self.success && self.error.is_some() {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "a successful response cannot carry an error",
            ));
        }
        if !self.success && self.error.is_none() {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                "a failed response must carry an error",
            ));
        }
        Ok(())
    }
}

/// Request names every server answers without a Manifest entry (§4.9),
/// shared by the client facade (to skip validation) and the server
/// dispatcher (to fall back to its built-in handlers).
pub const BUILTIN_REQUESTS: &[&str] = &["ping", "echo", "get_info", "validate", "slow_process", "manifest", "spec", "server_stats"];

pub fn is_builtin_request(name: &str) -> bool {
    BUILTIN_REQUESTS.contains(&name)
}

fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
