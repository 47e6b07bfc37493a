use crate::error::{JanusError, JanusErrorCode, Result};
use crate::wire::types::{Request, Response};

/// Default cap on a single datagram payload (64 KiB, §4.1 / §5 resource model).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Hard upper bound regardless of configuration (§4.1).
pub const ABSOLUTE_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Encodes a [`Request`] as the JSON payload sent in a single datagram.
///
/// Grounded on `protocol/message_types.rs`'s `to_json`/`validate` pair: encode
/// rejects anything that wouldn't round-trip, rather than letting an
/// oversized or malformed payload reach the socket.
pub fn encode_request(request: &Request, max_message_size: usize) -> Result<Vec<u8>> {
    request.validate_structure()?;
    let bytes = serde_json::to_vec(request)?;
    guard_size(bytes.len(), max_message_size)?;
    Ok(bytes)
}

pub fn decode_request(bytes: &[u8], max_message_size: usize) -> Result<Request> {
    guard_size(bytes.len(), max_message_size)?;
    let request: Request = serde_json::from_slice(bytes)?;
    request.validate_structure()?;
    Ok(request)
}

pub fn encode_response(response: &Response, max_message_size: usize) -> Result<Vec<u8>> {
    response.validate_structure()?;
    let bytes = serde_json::to_vec(response)?;
    guard_size(bytes.len(), max_message_size)?;
    Ok(bytes)
}

pub fn decode_response(bytes: &[u8], max_message_size: usize) -> Result<Response> {
    guard_size(bytes.len(), max_message_size)?;
    let response: Response = serde_json::from_slice(bytes)?;
    response.validate_structure()?;
    Ok(response)
}

fn guard_size(len: usize, max_message_size: usize) -> Result<()> {
    let cap = max_message_size.min(ABSOLUTE_MAX_MESSAGE_SIZE);
    if len > cap {
        return Err(JanusError::new(
            JanusErrorCode::ResourceLimitExceeded,
            format!("message size {len} exceeds limit of {cap} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_encode_decode() {
        let req = Request::new("ping", None).with_reply_to("/tmp/x.sock");
        let bytes = encode_request(&req, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let back = decode_request(&bytes, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn oversized_request_is_rejected_at_encode() {
        let mut args = std::collections::HashMap::new();
        args.insert("blob".to_string(), serde_json::Value::String("x".repeat(200)));
        let req = Request::new("echo", Some(args));
        let err = encode_request(&req, 32).unwrap_err();
        assert_eq!(err.code(), JanusErrorCode::ResourceLimitExceeded);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode_request(b"not json", DEFAULT_MAX_MESSAGE_SIZE);
        assert!(err.is_err());
    }

    #[test]
    fn response_round_trips_through_encode_decode() {
        let resp = Response::success("id-1", Some(serde_json::json!({"pong": true})));
        let bytes = encode_response(&resp, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        let back = decode_response(&bytes, DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(resp, back);
    }
}
