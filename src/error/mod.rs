pub mod janus_error;
pub mod jsonrpc_error;

pub use janus_error::JanusError;
pub use jsonrpc_error::{JanusErrorCode, JsonRpcError, JsonRpcErrorData};

pub type Result<T> = std::result::Result<T, JanusError>;
