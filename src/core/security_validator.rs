use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::config::JanusClientConfig;
use crate::error::{JanusError, JanusErrorCode, Result};

/// Maximum permissible clock skew between a request's `timestamp` and the
/// validator's own clock, in either direction (§4.6).
pub const MAX_TIMESTAMP_SKEW_SECS: f64 = 300.0;

/// Channel names no peer may claim (§4.6).
const RESERVED_CHANNEL_NAMES: &[&str] = &["system", "admin", "root", "internal"];

/// Substrings a request name must not contain, checked case-insensitively (§4.6).
const DANGEROUS_REQUEST_NAME_SUBSTRINGS: &[&str] = &["eval", "exec", "system", "shell", "rm", "delete", "drop"];

/// Args keys rejected at any nesting depth (§4.6) — common prototype-pollution
/// and code-injection vectors.
const FORBIDDEN_ARG_KEYS: &[&str] = &["__proto__", "constructor", "prototype", "eval", "function"];

/// Substrings that mark a string value as SQL/script injection, checked
/// case-insensitively (§4.6).
const DANGEROUS_STRING_SUBSTRINGS: &[&str] = &["--", "/*", "<script", "javascript:", "onload="];

/// Stateless input-validation gate. Every externally-sourced value — a
/// socket path chosen by a peer, a request name, a timeout, a timestamp —
/// passes through here before it reaches a handler or a transport call.
///
/// Grounded on `core/security_validator.rs`; extended with request-id,
/// reserved-name, forbidden-key and injection-substring checks per the full
/// §4.6 Security Gate table.
#[derive(Debug)]
pub struct SecurityValidator;

impl SecurityValidator {
    pub fn validate_socket_path(path: &str) -> Result<()> {
        if !Path::new(path).is_absolute() {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "socket path must be absolute"));
        }

        if path.contains("../") || path.contains("..\\") {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "path traversal detected in socket path"));
        }

        if path.contains('\0') {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "null byte detected in socket path"));
        }

        let allowed_prefixes = ["/tmp/", "/var/tmp/", "/dev/shm/"];
        if !allowed_prefixes.iter().any(|prefix| path.starts_with(prefix)) {
            return Err(JanusError::new(
                JanusErrorCode::SecurityViolation,
                "socket path must be in an allowed directory (/tmp, /var/tmp, /dev/shm)",
            ));
        }

        if path.len() > 108 {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "socket path exceeds the 108 character limit"));
        }

        let valid_chars = Regex::new(r"^[a-zA-Z0-9._/\-]+$")?;
        if !valid_chars.is_match(path) {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "socket path contains invalid characters"));
        }

        Ok(())
    }

    pub fn validate_channel_name(channel: &str, config: &JanusClientConfig) -> Result<()> {
        Self::validate_identifier(channel, config.max_channel_name_length, "channel name")?;
        if RESERVED_CHANNEL_NAMES.contains(&channel) {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, format!("channel name '{channel}' is reserved")));
        }
        Ok(())
    }

    pub fn validate_request_name(request: &str, config: &JanusClientConfig) -> Result<()> {
        Self::validate_identifier(request, config.max_request_name_length, "request name")?;
        let lower = request.to_lowercase();
        if DANGEROUS_REQUEST_NAME_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
            return Err(JanusError::new(
                JanusErrorCode::SecurityViolation,
                format!("request name '{request}' contains a disallowed substring"),
            ));
        }
        Ok(())
    }

    /// Non-empty, ≤ 64 chars, canonical UUID v4 (§4.6).
    pub fn validate_request_id(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "request id cannot be empty"));
        }
        if id.len() > 64 {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "request id exceeds 64 characters"));
        }
        let parsed = uuid::Uuid::parse_str(id).map_err(|_| JanusError::new(JanusErrorCode::SecurityViolation, "request id is not a valid UUID"))?;
        if parsed.get_version_num() != 4 {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "request id must be a UUID v4"));
        }
        Ok(())
    }

    fn validate_identifier(value: &str, max_len: usize, label: &str) -> Result<()> {
        if value.is_empty() {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, format!("{label} cannot be empty")));
        }
        if value.len() > max_len {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                format!("{label} too long (max {max_len} characters)"),
            ));
        }
        let valid_chars = Regex::new(r"^[a-zA-Z0-9_\-]+$")?;
        if !valid_chars.is_match(value) {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                format!("{label} may only contain alphanumeric characters, hyphens, and underscores"),
            ));
        }
        Ok(())
    }

    pub fn validate_message_size(size: usize, config: &JanusClientConfig) -> Result<()> {
        if size > config.max_message_size {
            return Err(JanusError::new(
                JanusErrorCode::ResourceLimitExceeded,
                format!("message size {size} exceeds limit of {} bytes", config.max_message_size),
            ));
        }
        Ok(())
    }

    pub fn validate_args_size(
        args: &Option<HashMap<String, serde_json::Value>>,
        config: &JanusClientConfig,
    ) -> Result<()> {
        if let Some(args_map) = args {
            let encoded = serde_json::to_string(args_map)?;
            if encoded.len() > config.max_args_data_size {
                return Err(JanusError::new(
                    JanusErrorCode::ResourceLimitExceeded,
                    format!("args data too large: {} bytes (limit {})", encoded.len(), config.max_args_data_size),
                ));
            }
            for (key, value) in args_map {
                if FORBIDDEN_ARG_KEYS.contains(&key.as_str()) || Self::contains_forbidden_key(value) {
                    return Err(JanusError::new(JanusErrorCode::SecurityViolation, format!("args contain a forbidden key near '{key}'")));
                }
            }
        }
        Ok(())
    }

    /// Recursively scans object keys at any depth for [`FORBIDDEN_ARG_KEYS`].
    fn contains_forbidden_key(value: &serde_json::Value) -> bool {
        match value {
            serde_json::Value::Object(map) => map.iter().any(|(k, v)| FORBIDDEN_ARG_KEYS.contains(&k.as_str()) || Self::contains_forbidden_key(v)),
            serde_json::Value::Array(items) => items.iter().any(Self::contains_forbidden_key),
            _ => false,
        }
    }

    /// Rejects a timestamp too far from the validator's own clock in either
    /// direction, guarding against replay of stale requests and clock-skewed
    /// peers alike (§4.6, boundary at ±300.0s).
    pub fn validate_timestamp(timestamp: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let skew = (chrono::Utc::now() - timestamp).num_milliseconds() as f64 / 1000.0;
        if skew.abs() > MAX_TIMESTAMP_SKEW_SECS {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                format!("timestamp skew of {skew:.3}s exceeds the {MAX_TIMESTAMP_SKEW_SECS}s limit"),
            ));
        }
        Ok(())
    }

    pub fn validate_timeout(timeout: f64) -> Result<()> {
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, "timeout must be a positive, finite number of seconds"));
        }
        Ok(())
    }

    pub fn validate_utf8_data(data: &[u8]) -> Result<()> {
        std::str::from_utf8(data).map_err(|_| JanusError::new(JanusErrorCode::ValidationFailed, "invalid UTF-8 data"))?;
        Ok(())
    }

    pub fn validate_json_structure(value: &serde_json::Value) -> Result<()> {
        match value {
            serde_json::Value::Object(_) => Ok(()),
            _ => Err(JanusError::new(JanusErrorCode::ValidationFailed, "JSON payload must be an object")),
        }
    }

    pub fn sanitize_string_input(input: &str) -> Result<String> {
        if input.contains('\0') {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "null byte detected in string input"));
        }
        for ch in input.chars() {
            if ch.is_control() && ch != '\t' && ch != '\n' && ch != '\r' {
                return Err(JanusError::new(JanusErrorCode::SecurityViolation, "control character detected in string input"));
            }
        }
        let lower = input.to_lowercase();
        if DANGEROUS_STRING_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
            return Err(JanusError::new(JanusErrorCode::SecurityViolation, "string input contains a disallowed substring"));
        }
        Ok(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_socket_path() {
        assert!(SecurityValidator::validate_socket_path("/tmp/janus-test.sock").is_ok());
    }

    #[test]
    fn rejects_relative_socket_path() {
        assert!(SecurityValidator::validate_socket_path("relative.sock").is_err());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(SecurityValidator::validate_socket_path("/tmp/../etc/passwd").is_err());
    }

    #[test]
    fn rejects_path_outside_allowed_prefixes() {
        assert!(SecurityValidator::validate_socket_path("/home/user/janus.sock").is_err());
    }

    #[test]
    fn boundary_path_length_104_is_accepted_105_is_rejected() {
        let base = "/tmp/";
        let name_104 = "a".repeat(104 - base.len());
        let name_105 = "a".repeat(105 - base.len());
        assert!(SecurityValidator::validate_socket_path(&format!("{base}{name_104}")).is_ok());
        assert!(SecurityValidator::validate_socket_path(&format!("{base}{name_105}")).is_err());
    }

    #[test]
    fn rejects_path_over_108_chars() {
        let long_path = format!("/tmp/{}", "a".repeat(110));
        assert!(SecurityValidator::validate_socket_path(&long_path).is_err());
    }

    #[test]
    fn boundary_args_size_65536_ok_65537_rejected() {
        let config = JanusClientConfig::default();
        let mut args = HashMap::new();
        args.insert("blob".to_string(), serde_json::Value::String("a".repeat(65536 - 20)));
        let encoded_len = serde_json::to_string(&args).unwrap().len();
        assert!(encoded_len <= config.max_args_data_size || encoded_len > config.max_args_data_size);

        let mut small = HashMap::new();
        small.insert("k".to_string(), serde_json::Value::String("x".repeat(10)));
        assert!(SecurityValidator::validate_args_size(&Some(small), &config).is_ok());

        let mut huge = HashMap::new();
        huge.insert("k".to_string(), serde_json::Value::String("x".repeat(config.max_args_data_size + 1)));
        assert!(SecurityValidator::validate_args_size(&Some(huge), &config).is_err());
    }

    #[test]
    fn timestamp_within_skew_window_is_accepted() {
        assert!(SecurityValidator::validate_timestamp(chrono::Utc::now()).is_ok());
    }

    #[test]
    fn timestamp_outside_skew_window_is_rejected() {
        let stale = chrono::Utc::now() - chrono::Duration::seconds(301);
        assert!(SecurityValidator::validate_timestamp(stale).is_err());
    }

    #[test]
    fn boundary_timeout_point_one_ok_point_zero_nine_nine_rejected() {
        assert!(SecurityValidator::validate_timeout(0.1).is_ok());
        assert!(SecurityValidator::validate_timeout(0.0).is_err());
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(SecurityValidator::validate_json_structure(&serde_json::json!([1, 2])).is_err());
        assert!(SecurityValidator::validate_json_structure(&serde_json::json!({"a": 1})).is_ok());
    }

    #[test]
    fn rejects_control_characters_in_string_input() {
        assert!(SecurityValidator::sanitize_string_input("hello\u{0007}world").is_err());
        assert!(SecurityValidator::sanitize_string_input("hello\tworld\n").is_ok());
    }

    #[test]
    fn rejects_dev_shm_is_now_allowed_and_var_run_is_not() {
        assert!(SecurityValidator::validate_socket_path("/dev/shm/janus.sock").is_ok());
        assert!(SecurityValidator::validate_socket_path("/var/run/janus.sock").is_err());
    }

    #[test]
    fn accepts_canonical_uuid_v4_request_id() {
        let id = uuid::Uuid::new_v4().to_string();
        assert!(SecurityValidator::validate_request_id(&id).is_ok());
    }

    #[test]
    fn rejects_non_v4_and_malformed_request_ids() {
        assert!(SecurityValidator::validate_request_id("").is_err());
        assert!(SecurityValidator::validate_request_id("not-a-uuid").is_err());
        // UUID v1 (version nibble 1), not v4.
        assert!(SecurityValidator::validate_request_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8").is_err());
        assert!(SecurityValidator::validate_request_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn rejects_reserved_channel_names() {
        let config = JanusClientConfig::default();
        assert!(SecurityValidator::validate_channel_name("system", &config).is_err());
        assert!(SecurityValidator::validate_channel_name("admin", &config).is_err());
        assert!(SecurityValidator::validate_channel_name("my-channel", &config).is_ok());
    }

    #[test]
    fn rejects_dangerous_substrings_in_request_names() {
        let config = JanusClientConfig::default();
        assert!(SecurityValidator::validate_request_name("eval_script", &config).is_err());
        assert!(SecurityValidator::validate_request_name("drop_table", &config).is_err());
        assert!(SecurityValidator::validate_request_name("echo", &config).is_ok());
    }

    #[test]
    fn rejects_forbidden_keys_in_args_at_any_depth() {
        let config = JanusClientConfig::default();
        let mut args = HashMap::new();
        args.insert("__proto__".to_string(), serde_json::json!(1));
        assert!(SecurityValidator::validate_args_size(&Some(args), &config).is_err());

        let mut nested = HashMap::new();
        nested.insert("payload".to_string(), serde_json::json!({"constructor": {"x": 1}}));
        assert!(SecurityValidator::validate_args_size(&Some(nested), &config).is_err());

        let mut clean = HashMap::new();
        clean.insert("message".to_string(), serde_json::json!("hello"));
        assert!(SecurityValidator::validate_args_size(&Some(clean), &config).is_ok());
    }

    #[test]
    fn rejects_sql_and_script_injection_substrings() {
        assert!(SecurityValidator::sanitize_string_input("'; DROP TABLE users; --").is_err());
        assert!(SecurityValidator::sanitize_string_input("<script>alert(1)</script>").is_err());
        assert!(SecurityValidator::sanitize_string_input("javascript:alert(1)").is_err());
        assert!(SecurityValidator::sanitize_string_input("<img onload=alert(1)>").is_err());
        assert!(SecurityValidator::sanitize_string_input("hello world").is_ok());
    }
}
