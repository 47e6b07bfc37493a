pub mod janus_client;

pub use janus_client::{ConnectionState, JanusClient, ParallelRequest, ParallelResult, RequestHandle, RequestState};
