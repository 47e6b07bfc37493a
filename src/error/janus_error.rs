use super::jsonrpc_error::{JanusErrorCode, JsonRpcError};

/// Crate-wide error type. Every fallible library operation returns this; the
/// wire-level [`JsonRpcError`] is what actually travels inside a `Response`.
#[derive(Debug, thiserror::Error)]
pub enum JanusError {
    #[error("{0}")]
    Protocol(#[from] JsonRpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("YAML error: {0}")]
    #[cfg(feature = "yaml-support")]
    Yaml(#[from] serde_yaml::Error),
}

impl JanusError {
    pub fn new(code: JanusErrorCode, details: impl Into<String>) -> Self {
        JanusError::Protocol(JsonRpcError::new(code, Some(details.into())))
    }

    /// Converts into the wire `JsonRpcError` carried by a `Response`, mapping
    /// non-protocol errors onto `internal_error`/`socket_error` as appropriate.
    pub fn into_wire_error(self) -> JsonRpcError {
        match self {
            JanusError::Protocol(e) => e,
            JanusError::Io(e) => JsonRpcError::new(JanusErrorCode::SocketError, Some(e.to_string())),
            JanusError::Json(e) => JsonRpcError::new(JanusErrorCode::ParseError, Some(e.to_string())),
            JanusError::Regex(e) => {
                JsonRpcError::new(JanusErrorCode::ManifestValidationError, Some(e.to_string()))
            }
            #[cfg(feature = "yaml-support")]
            JanusError::Yaml(e) => JsonRpcError::new(JanusErrorCode::ParseError, Some(e.to_string())),
        }
    }

    pub fn code(&self) -> JanusErrorCode {
        match self {
            JanusError::Protocol(e) => e.error_code().unwrap_or(JanusErrorCode::InternalError),
            JanusError::Io(_) => JanusErrorCode::SocketError,
            JanusError::Json(_) => JanusErrorCode::ParseError,
            JanusError::Regex(_) => JanusErrorCode::ManifestValidationError,
            #[cfg(feature = "yaml-support")]
            JanusError::Yaml(_) => JanusErrorCode::ParseError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_jsonrpc_error_with_matching_code() {
        let err = JanusError::new(JanusErrorCode::SecurityViolation, "path not allowed");
        assert_eq!(err.code(), JanusErrorCode::SecurityViolation);
    }

    #[test]
    fn io_errors_map_to_socket_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: JanusError = io_err.into();
        assert_eq!(err.code(), JanusErrorCode::SocketError);
    }
}
