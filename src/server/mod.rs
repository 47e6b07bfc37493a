pub mod janus_server;

pub use janus_server::{JanusServer, RequestHandler};
