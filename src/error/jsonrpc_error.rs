use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Wire error codes shared across every Janus language implementation.
///
/// Standard JSON-RPC 2.0 codes keep their canonical values; everything past
/// `-32000` is Janus-specific and stable across implementations (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum JanusErrorCode {
    ParseError = -32700,
    InvalidParams = -32602,
    MethodNotFound = -32601,
    InternalError = -32603,

    ServerError = -32000,
    SecurityViolation = -32009,
    ValidationFailed = -32005,
    ManifestValidationError = -32011,
    HandlerTimeout = -32006,
    ResponseTrackingError = -32012,
    SocketError = -32007,
    MessageFramingError = -32013,
    ResourceLimitExceeded = -32010,
    AuthenticationFailed = -32002,
}

impl JanusErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JanusErrorCode::ParseError => "PARSE_ERROR",
            JanusErrorCode::InvalidParams => "INVALID_PARAMS",
            JanusErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            JanusErrorCode::InternalError => "INTERNAL_ERROR",
            JanusErrorCode::ServerError => "SERVER_ERROR",
            JanusErrorCode::SecurityViolation => "SECURITY_VIOLATION",
            JanusErrorCode::ValidationFailed => "VALIDATION_FAILED",
            JanusErrorCode::ManifestValidationError => "MANIFEST_VALIDATION_ERROR",
            JanusErrorCode::HandlerTimeout => "HANDLER_TIMEOUT",
            JanusErrorCode::ResponseTrackingError => "RESPONSE_TRACKING_ERROR",
            JanusErrorCode::SocketError => "SOCKET_ERROR",
            JanusErrorCode::MessageFramingError => "MESSAGE_FRAMING_ERROR",
            JanusErrorCode::ResourceLimitExceeded => "RESOURCE_LIMIT_EXCEEDED",
            JanusErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JanusErrorCode::ParseError => "Parse error",
            JanusErrorCode::InvalidParams => "Invalid params",
            JanusErrorCode::MethodNotFound => "Method not found",
            JanusErrorCode::InternalError => "Internal error",
            JanusErrorCode::ServerError => "Server error",
            JanusErrorCode::SecurityViolation => "Security violation",
            JanusErrorCode::ValidationFailed => "Validation failed",
            JanusErrorCode::ManifestValidationError => "Manifest validation error",
            JanusErrorCode::HandlerTimeout => "Handler timeout",
            JanusErrorCode::ResponseTrackingError => "Response tracking error",
            JanusErrorCode::SocketError => "Socket error",
            JanusErrorCode::MessageFramingError => "Message framing error",
            JanusErrorCode::ResourceLimitExceeded => "Resource limit exceeded",
            JanusErrorCode::AuthenticationFailed => "Authentication failed",
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(JanusErrorCode::ParseError),
            -32602 => Some(JanusErrorCode::InvalidParams),
            -32601 => Some(JanusErrorCode::MethodNotFound),
            -32603 => Some(JanusErrorCode::InternalError),
            -32000 => Some(JanusErrorCode::ServerError),
            -32009 => Some(JanusErrorCode::SecurityViolation),
            -32005 => Some(JanusErrorCode::ValidationFailed),
            -32011 => Some(JanusErrorCode::ManifestValidationError),
            -32006 => Some(JanusErrorCode::HandlerTimeout),
            -32012 => Some(JanusErrorCode::ResponseTrackingError),
            -32007 => Some(JanusErrorCode::SocketError),
            -32013 => Some(JanusErrorCode::MessageFramingError),
            -32010 => Some(JanusErrorCode::ResourceLimitExceeded),
            -32002 => Some(JanusErrorCode::AuthenticationFailed),
            _ => None,
        }
    }
}

impl fmt::Display for JanusErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Additional error context carried on the wire under `error.data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JsonRpcErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<HashMap<String, serde_json::Value>>,
}

impl JsonRpcErrorData {
    pub fn with_details<S: Into<String>>(details: S) -> Self {
        Self {
            details: Some(details.into()),
            ..Default::default()
        }
    }

    pub fn with_field<S: Into<String>>(mut self, field: S, value: serde_json::Value) -> Self {
        self.field = Some(field.into());
        self.value = Some(value);
        self
    }

    pub fn with_constraints(mut self, constraints: HashMap<String, serde_json::Value>) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// JSON-RPC 2.0 compatible wire error, carried in `Response.error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

impl JsonRpcError {
    pub fn new(code: JanusErrorCode, details: Option<String>) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: details.map(JsonRpcErrorData::with_details),
        }
    }

    pub fn with_field<S: Into<String>>(
        code: JanusErrorCode,
        field: S,
        value: serde_json::Value,
        details: S,
    ) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: Some(JsonRpcErrorData::with_details(details).with_field(field, value)),
        }
    }

    pub fn error_code(&self) -> Option<JanusErrorCode> {
        JanusErrorCode::from_code(self.code)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.as_ref().and_then(|d| d.details.as_ref()) {
            Some(details) => write!(f, "[{}] {} - {}", self.code, self.message, details),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for JsonRpcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_values_are_stable() {
        assert_eq!(JanusErrorCode::ParseError.code(), -32700);
        assert_eq!(JanusErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(JanusErrorCode::ValidationFailed.code(), -32005);
        assert_eq!(JanusErrorCode::HandlerTimeout.code(), -32006);
    }

    #[test]
    fn round_trips_through_code_lookup() {
        for code in [
            JanusErrorCode::ParseError,
            JanusErrorCode::InvalidParams,
            JanusErrorCode::ManifestValidationError,
            JanusErrorCode::ResponseTrackingError,
        ] {
            assert_eq!(JanusErrorCode::from_code(code.code()), Some(code));
        }
    }

    #[test]
    fn serializes_with_lower_snake_field_names() {
        let err = JsonRpcError::new(JanusErrorCode::InvalidParams, Some("missing 'message'".into()));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":-32602"));
        assert!(json.contains("\"message\":\"Invalid params\""));
        assert!(json.contains("\"details\":\"missing 'message'\""));
    }

    #[test]
    fn deserializes_from_wire_json() {
        let json = r#"{"code":-32601,"message":"Method not found","data":{"details":"'foo' not found"}}"#;
        let err: JsonRpcError = serde_json::from_str(json).unwrap();
        assert_eq!(err.error_code(), Some(JanusErrorCode::MethodNotFound));
        assert_eq!(err.data.unwrap().details, Some("'foo' not found".to_string()));
    }
}
