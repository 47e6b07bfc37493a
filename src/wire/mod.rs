pub mod codec;
pub mod framing;
pub mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response, DEFAULT_MAX_MESSAGE_SIZE};
pub use framing::{decode_frame, encode_frame, MAX_FRAMED_MESSAGE_SIZE};
pub use types::{is_builtin_request, Request, Response, BUILTIN_REQUESTS};
