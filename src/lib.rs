//! # Janus
//!
//! Connectionless request/response IPC over Unix-domain datagram sockets.
//! A client sends one `Request` datagram and binds a fresh ephemeral socket
//! for the single `Response` datagram that answers it — no persistent
//! connection, no multiplexed stream, no per-peer server-side state beyond
//! a bounded activity record.
//!
//! ## Features
//!
//! - **Connectionless transport**: one datagram out, one datagram back
//! - **Manifest-driven validation**: declarative argument/response shapes,
//!   shared object models via `modelRef`
//! - **Correlation & timeouts**: client-side request tracking with bilateral
//!   timeout enforcement
//! - **Security gate**: path, identifier, size, timestamp and timeout checks
//!   applied before anything reaches a handler or the wire
//! - **Observability**: every lifecycle event available both as a `log`
//!   record and on a `JanusEvent` broadcast channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use janus::{JanusClient, JanusClientConfig};
//! use std::collections::HashMap;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = JanusClient::new("/tmp/janus.sock", JanusClientConfig::default())?;
//!
//!     let mut args = HashMap::new();
//!     args.insert("message".to_string(), json!("hello"));
//!     let response = client.send_request("echo", Some(args), None).await?;
//!
//!     if response.success {
//!         println!("result: {:?}", response.result);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod manifest;
pub mod protocol;
pub mod server;
pub mod utils;
pub mod validation;
pub mod wire;

pub use client::{ConnectionState, JanusClient, ParallelRequest, ParallelResult, RequestHandle, RequestState};
pub use config::{JanusClientConfig, JanusServerConfig};
pub use core::{DatagramTransport, SecurityValidator};
pub use error::{JanusError, JanusErrorCode, JsonRpcError, Result};
pub use manifest::{ArgumentManifest, Manifest, ManifestParser, ModelManifest, RequestManifest, ResponseManifest, ValidationManifest};
pub use protocol::{CorrelationConfig, CorrelationEngine, EventBus, JanusEvent};
pub use server::{JanusServer, RequestHandler};
pub use validation::{ArgumentValidator, ResponseValidator, ValidationError, ValidationResult};
pub use wire::{is_builtin_request, Request, Response};

// Re-export common dependencies for convenience.
pub use serde_json::{json, Value as JsonValue};

/// Convenient glob import for applications embedding this crate.
pub mod prelude {
    pub use crate::{
        ArgumentValidator, CorrelationEngine, DatagramTransport, EventBus, JanusClient, JanusClientConfig, JanusError, JanusErrorCode, JanusEvent, JanusServer,
        JanusServerConfig, JsonRpcError, JsonValue, Manifest, ManifestParser, RequestHandle, Response, ResponseValidator, Result,
    };
}

/// Library version, matching the crate's `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
