use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::config::JanusClientConfig;
use crate::core::{DatagramTransport, SecurityValidator};
use crate::error::{JanusError, JanusErrorCode, Result};
use crate::manifest::Manifest;
use crate::protocol::{CorrelationConfig, CorrelationEngine, EventBus, JanusEvent};
use crate::validation::ArgumentValidator;
use crate::wire::{codec, is_builtin_request, Request, Response};

/// Simulated connection state — SOCK_DGRAM has no persistent connection, so
/// this tracks activity instead (§4.8).
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub last_activity: std::time::SystemTime,
    pub requests_sent: u64,
    pub responses_received: u64,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            last_activity: std::time::SystemTime::now(),
            requests_sent: 0,
            responses_received: 0,
        }
    }
}

/// One request dispatched through [`JanusClient::execute_in_parallel`].
#[derive(Debug, Clone)]
pub struct ParallelRequest {
    pub id: String,
    pub request: String,
    pub args: Option<HashMap<String, Value>>,
}

/// Outcome of one [`ParallelRequest`].
#[derive(Debug, Clone)]
pub struct ParallelResult {
    pub request_id: String,
    pub response: Option<Response>,
    pub error: Option<String>,
}

/// Current state of a request dispatched through [`JanusClient::send_request_tracked`].
#[derive(Debug)]
pub enum RequestState {
    Pending,
    Completed(Response),
    Cancelled,
}

/// A handle to an in-flight correlated request. Awaiting it blocks until the
/// reply arrives, times out, or is cancelled via [`RequestHandle::cancel`].
pub struct RequestHandle {
    request_id: String,
    receiver: Option<tokio::sync::oneshot::Receiver<Response>>,
    correlation: CorrelationEngine,
}

impl RequestHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel(&self) -> bool {
        self.correlation.cancel_request(&self.request_id)
    }

    pub async fn wait(mut self) -> RequestState {
        match self.receiver.take() {
            Some(rx) => match rx.await {
                Ok(response) => RequestState::Completed(response),
                Err(_) => RequestState::Cancelled,
            },
            None => RequestState::Cancelled,
        }
    }
}

/// High-level facade over the connectionless datagram transport: builds
/// [`Request`]s, validates them against a lazily-fetched [`Manifest`],
/// and correlates replies back to their caller.
///
/// Grounded on `protocol/janus_client.rs`'s `JanusClient`, generalized to
/// the channel-less request model and the new correlation engine.
#[derive(Clone)]
pub struct JanusClient {
    socket_path: String,
    config: JanusClientConfig,
    transport: DatagramTransport,
    manifest: Arc<Mutex<Option<Manifest>>>,
    correlation: CorrelationEngine,
    connection_state: Arc<Mutex<ConnectionState>>,
    events: EventBus,
}

impl JanusClient {
    pub fn new(socket_path: impl Into<String>, config: JanusClientConfig) -> Result<Self> {
        let socket_path = socket_path.into();
        SecurityValidator::validate_socket_path(&socket_path)?;
        config.validate()?;

        let transport = DatagramTransport::new(socket_path.clone(), config.clone())?;
        let correlation = CorrelationEngine::new(CorrelationConfig {
            max_pending_requests: config.max_pending_requests,
            cleanup_interval: config.cleanup_interval,
            default_timeout: config.default_timeout,
        });

        Ok(Self {
            socket_path,
            config,
            transport,
            manifest: Arc::new(Mutex::new(None)),
            correlation,
            connection_state: Arc::new(Mutex::new(ConnectionState::new())),
            events: EventBus::default(),
        })
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn manifest(&self) -> Option<Manifest> {
        self.manifest.lock().unwrap().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state.lock().unwrap().clone()
    }

    /// Fetches the server's Manifest via the reserved `manifest` request
    /// (falling back to the legacy `spec` name) the first time validation is
    /// needed, then caches it for the life of the client.
    async fn ensure_manifest_loaded(&self) -> Result<()> {
        if self.manifest.lock().unwrap().is_some() {
            return Ok(());
        }
        if !self.config.enable_validation {
            return Ok(());
        }

        let response = match self.send_request_raw("manifest", None, Duration::from_secs(10)).await {
            Ok(response) => response,
            Err(_) => self.send_request_raw("spec", None, Duration::from_secs(10)).await?,
        };

        if !response.success {
            let message = response.error.map(|e| e.message).unwrap_or_else(|| "unknown error".to_string());
            return Err(JanusError::new(JanusErrorCode::ManifestValidationError, format!("server refused manifest request: {message}")));
        }
        let result = response
            .result
            .ok_or_else(|| JanusError::new(JanusErrorCode::ManifestValidationError, "manifest response missing 'result'"))?;
        let manifest: Manifest = serde_json::from_value(result)?;

        *self.manifest.lock().unwrap() = Some(manifest);
        Ok(())
    }

    /// Sends `request_name` and awaits exactly one reply, without Manifest
    /// validation — used internally to fetch the Manifest itself.
    async fn send_request_raw(&self, request_name: &str, args: Option<HashMap<String, Value>>, timeout: Duration) -> Result<Response> {
        let reply_path = self.transport.generate_reply_path();
        let mut request = Request::new(request_name, args).with_reply_to(reply_path);
        request.timeout = Some(timeout.as_secs_f64());

        let payload = codec::encode_request(&request, self.config.max_message_size)?;
        let reply_bytes = self.transport.send(&payload, timeout).await?;
        let response = codec::decode_response(&reply_bytes, self.config.max_message_size)?;

        if response.request_id != request.id {
            return Err(JanusError::new(
                JanusErrorCode::ValidationFailed,
                format!("response correlation mismatch: expected {}, got {}", request.id, response.request_id),
            ));
        }
        Ok(response)
    }

    /// Sends a request and awaits its reply, validating arguments against
    /// the Manifest first unless `request_name` is a built-in.
    pub async fn send_request(&self, request_name: &str, args: Option<HashMap<String, Value>>, timeout: Option<Duration>) -> Result<Response> {
        SecurityValidator::validate_request_name(request_name, &self.config)?;
        SecurityValidator::validate_args_size(&args, &self.config)?;

        if self.config.enable_validation && !is_builtin_request(request_name) {
            self.ensure_manifest_loaded().await?;
            if let Some(manifest) = self.manifest() {
                ArgumentValidator::new(manifest).validate_arguments(request_name, args.as_ref().unwrap_or(&HashMap::new()))?;
            }
        }

        let timeout = timeout.unwrap_or(self.config.default_timeout);
        self.events.publish(JanusEvent::RequestSent { request_id: Uuid::nil().to_string(), request: request_name.to_string() });
        let response = self.send_request_raw(request_name, args, timeout).await;

        match &response {
            Ok(r) => {
                self.events.publish(JanusEvent::ResponseReceived { request_id: r.request_id.clone(), success: r.success });
                self.record_activity(1, 1);
            }
            Err(_) => self.record_activity(1, 0),
        }
        response
    }

    /// Sends a request without binding a reply socket (fire-and-forget).
    pub async fn send_request_no_reply(&self, request_name: &str, args: Option<HashMap<String, Value>>) -> Result<()> {
        SecurityValidator::validate_request_name(request_name, &self.config)?;
        SecurityValidator::validate_args_size(&args, &self.config)?;

        let request = Request::new(request_name, args);
        let payload = codec::encode_request(&request, self.config.max_message_size)?;
        self.transport.send_no_reply(&payload).await?;
        self.record_activity(1, 0);
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.transport.test_connection().await
    }

    pub async fn ping(&self) -> bool {
        self.send_request("ping", None, None).await.is_ok()
    }

    /// Sends a request asynchronously, registering it with the correlation
    /// engine so the caller can `await` or [`RequestHandle::cancel`] it
    /// independently of the send itself (§4.7).
    pub fn send_request_tracked(&self, request_name: String, args: Option<HashMap<String, Value>>, timeout: Duration) -> Result<RequestHandle> {
        let request_id = Uuid::new_v4().to_string();
        let receiver = self.correlation.track_request(request_id.clone(), timeout).map_err(|e| match e {
            crate::protocol::CorrelationError::PendingRequestsLimit { .. } => JanusError::new(JanusErrorCode::ResourceLimitExceeded, e.to_string()),
            crate::protocol::CorrelationError::DuplicateRequestId { .. } => JanusError::new(JanusErrorCode::ResponseTrackingError, e.to_string()),
        })?;

        let transport = self.transport.clone();
        let correlation = self.correlation.clone();
        let max_message_size = self.config.max_message_size;
        let id_for_task = request_id.clone();

        tokio::spawn(async move {
            let reply_path = transport.generate_reply_path();
            let mut request = Request::new(&request_name, args).with_reply_to(reply_path);
            request.id = id_for_task.clone();
            request.timeout = Some(timeout.as_secs_f64());

            let Ok(payload) = codec::encode_request(&request, max_message_size) else {
                correlation.cancel_request(&id_for_task);
                return;
            };
            match transport.send(&payload, timeout).await {
                Ok(reply_bytes) => match codec::decode_response(&reply_bytes, max_message_size) {
                    Ok(response) => {
                        correlation.handle_response(response);
                    }
                    Err(_) => {
                        correlation.cancel_request(&id_for_task);
                    }
                },
                Err(_) => {
                    correlation.cancel_request(&id_for_task);
                }
            }
        });

        Ok(RequestHandle {
            request_id,
            receiver: Some(receiver),
            correlation: self.correlation.clone(),
        })
    }

    pub fn cancel_request(&self, request_id: &str) -> bool {
        self.correlation.cancel_request(request_id)
    }

    pub fn cancel_all_requests(&self) -> usize {
        self.correlation.cancel_all()
    }

    pub fn pending_request_count(&self) -> usize {
        self.correlation.pending_count()
    }

    /// Runs every request concurrently, collecting each into a
    /// [`ParallelResult`] regardless of individual failure (§4.8).
    pub async fn execute_in_parallel(&self, requests: Vec<ParallelRequest>) -> Vec<ParallelResult> {
        let mut handles = Vec::with_capacity(requests.len());
        for req in requests {
            let client = self.clone();
            handles.push(tokio::spawn(async move {
                let outcome = client.send_request(&req.request, req.args, None).await;
                match outcome {
                    Ok(response) => ParallelResult { request_id: req.id, response: Some(response), error: None },
                    Err(e) => ParallelResult { request_id: req.id, response: None, error: Some(e.to_string()) },
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(ParallelResult { request_id: "unknown".to_string(), response: None, error: Some(format!("task join failed: {e}")) }),
            }
        }
        results
    }

    fn record_activity(&self, sent: u64, received: u64) {
        let mut state = self.connection_state.lock().unwrap();
        state.last_activity = std::time::SystemTime::now();
        state.requests_sent += sent;
        state.responses_received += received;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixDatagram;

    fn fresh_socket_path() -> String {
        crate::utils::generate_reply_socket_path()
    }

    async fn spawn_echo_server(path: String) -> tokio::task::JoinHandle<()> {
        let socket = UnixDatagram::bind(&path).unwrap();
        tokio::spawn(async move {
            loop {
                let mut buf = vec![0u8; 8192];
                let Ok((len, from)) = socket.recv_from(&mut buf).await else { break };
                let Ok(request) = serde_json::from_slice::<Request>(&buf[..len]) else { continue };
                if let Some(reply_to) = request.reply_to {
                    let response = Response::success(request.id, Some(serde_json::json!({"echo": true})));
                    let reply_bytes = serde_json::to_vec(&response).unwrap();
                    let _ = socket.send_to(&reply_bytes, &reply_to).await;
                }
                let _ = from;
            }
        })
    }

    #[tokio::test]
    async fn ping_round_trip_succeeds_against_a_live_server() {
        let path = fresh_socket_path();
        let _server = spawn_echo_server(path.clone()).await;

        let mut config = JanusClientConfig::default();
        config.enable_validation = false;
        let client = JanusClient::new(path.clone(), config).unwrap();

        assert!(client.ping().await);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn tracked_request_resolves_via_correlation_engine() {
        let path = fresh_socket_path();
        let _server = spawn_echo_server(path.clone()).await;

        let mut config = JanusClientConfig::default();
        config.enable_validation = false;
        let client = JanusClient::new(path.clone(), config).unwrap();

        let handle = client.send_request_tracked("ping".to_string(), None, Duration::from_secs(2)).unwrap();
        match handle.wait().await {
            RequestState::Completed(response) => assert!(response.success),
            other => panic!("expected Completed, got {other:?}"),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn execute_in_parallel_returns_one_result_per_request() {
        let path = fresh_socket_path();
        let _server = spawn_echo_server(path.clone()).await;

        let mut config = JanusClientConfig::default();
        config.enable_validation = false;
        let client = JanusClient::new(path.clone(), config).unwrap();

        let requests = vec![
            ParallelRequest { id: "a".to_string(), request: "ping".to_string(), args: None },
            ParallelRequest { id: "b".to_string(), request: "ping".to_string(), args: None },
        ];
        let results = client.execute_in_parallel(requests).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.response.is_some()));
        let _ = std::fs::remove_file(&path);
    }
}
