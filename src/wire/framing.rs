use crate::error::{JanusError, JanusErrorCode, Result};

/// Cap on a framed message body, independent of the datagram-path size guard
/// in [`crate::wire::codec`] (§4.1). Stream-oriented transports (a future
/// Unix-stream fallback, or test harnesses replaying captured traffic) frame
/// messages with this 4-byte big-endian length prefix instead of relying on
/// datagram boundaries.
pub const MAX_FRAMED_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

const LENGTH_PREFIX_BYTES: usize = 4;

/// Prefixes `payload` with its big-endian `u32` length.
///
/// Grounded on `protocol/message_framing.rs`'s `encode_message`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAMED_MESSAGE_SIZE {
        return Err(JanusError::new(
            JanusErrorCode::MessageFramingError,
            format!("payload of {} bytes exceeds frame limit of {MAX_FRAMED_MESSAGE_SIZE}", payload.len()),
        ));
    }
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Splits one frame off the front of `buf`, returning the payload and the
/// number of bytes consumed. Returns `Ok(None)` if `buf` doesn't yet hold a
/// complete frame, so callers can keep reading from a stream.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>> {
    if buf.len() < LENGTH_PREFIX_BYTES {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[..LENGTH_PREFIX_BYTES].try_into().unwrap()) as usize;
    if len > MAX_FRAMED_MESSAGE_SIZE {
        return Err(JanusError::new(
            JanusErrorCode::MessageFramingError,
            format!("declared frame length {len} exceeds limit of {MAX_FRAMED_MESSAGE_SIZE}"),
        ));
    }
    let total = LENGTH_PREFIX_BYTES + len;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some((buf[LENGTH_PREFIX_BYTES..total].to_vec(), total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_yields_original_payload() {
        let payload = b"hello janus".to_vec();
        let framed = encode_frame(&payload).unwrap();
        let (decoded, consumed) = decode_frame(&framed).unwrap().unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn decode_returns_none_on_partial_frame() {
        let framed = encode_frame(b"payload").unwrap();
        assert!(decode_frame(&framed[..3]).unwrap().is_none());
        assert!(decode_frame(&framed[..framed.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn decode_leaves_trailing_bytes_for_the_next_frame() {
        let mut buf = encode_frame(b"first").unwrap();
        let second = encode_frame(b"second").unwrap();
        buf.extend_from_slice(&second);
        let (first_payload, consumed) = decode_frame(&buf).unwrap().unwrap();
        assert_eq!(first_payload, b"first");
        let (second_payload, _) = decode_frame(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(second_payload, b"second");
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_FRAMED_MESSAGE_SIZE as u32) + 1).to_be_bytes());
        assert!(decode_frame(&buf).is_err());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let huge = vec![0u8; MAX_FRAMED_MESSAGE_SIZE + 1];
        assert!(encode_frame(&huge).is_err());
    }
}
