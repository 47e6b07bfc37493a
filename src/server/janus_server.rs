use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::net::UnixDatagram;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::JanusServerConfig;
use crate::core::SecurityValidator;
use crate::error::{JanusError, JanusErrorCode, JsonRpcError, Result};
use crate::manifest::Manifest;
use crate::protocol::{EventBus, JanusEvent};
use crate::validation::ArgumentValidator;
use crate::wire::{codec, is_builtin_request, Request, Response};

/// A request handler. Synchronous by design — a handler that needs to await
/// something spawns its own task; the dispatcher never blocks on one.
pub type RequestHandler = Arc<dyn Fn(&Request) -> Result<Value> + Send + Sync>;

#[derive(Debug, Clone)]
struct ClientRecord {
    last_seen: Instant,
    request_count: u64,
}

fn epoch_secs() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Counters sampled once per dispatch so `server_stats` and event publishing
/// see a consistent snapshot instead of racing independent atomics.
struct ServerStatsSnapshot {
    active_clients: usize,
    total_connections: u64,
    total_requests: u64,
    uptime_secs: f64,
}

/// Bounded, least-recently-active-evicted map of clients currently talking
/// to this server, keyed by their reply socket path.
///
/// Not present in `server/janus_server.rs`, which tracks no client state at
/// all; grounded instead on the insert-with-cap, evict-oldest shape already
/// used by `protocol/response_tracker.rs`'s pending-request map.
struct ClientRegistry {
    clients: Mutex<HashMap<String, ClientRecord>>,
    max_active_clients: usize,
    total_seen: std::sync::atomic::AtomicU64,
}

impl ClientRegistry {
    fn new(max_active_clients: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_active_clients,
            total_seen: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn total_seen(&self) -> u64 {
        self.total_seen.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Records activity for `client_id`, evicting the least-recently-active
    /// client first if this would introduce a new entry past capacity.
    /// Returns `(is_new_client, evicted_client_id)`.
    fn touch(&self, client_id: &str) -> (bool, Option<String>) {
        let mut clients = self.clients.lock().unwrap();
        if let Some(record) = clients.get_mut(client_id) {
            record.last_seen = Instant::now();
            record.request_count += 1;
            return (false, None);
        }

        let mut evicted = None;
        if clients.len() >= self.max_active_clients {
            if let Some(oldest) = clients.iter().min_by_key(|(_, r)| r.last_seen).map(|(id, _)| id.clone()) {
                clients.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        clients.insert(client_id.to_string(), ClientRecord { last_seen: Instant::now(), request_count: 1 });
        self.total_seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        (true, evicted)
    }

    fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}

/// Connectionless request dispatcher: binds one Unix datagram socket,
/// decodes each inbound `Request`, routes it to a registered handler or one
/// of the built-in requests, and sends a `Response` back to `reply_to` when
/// one was requested.
///
/// Grounded on `server/janus_server.rs`'s `JanusServer` (handler registry,
/// `AtomicBool` running flag, receive loop, built-in fallback, `Drop`
/// cleanup) and `bin/janus.rs`'s built-in handler bodies, generalized with
/// the client-activity tracking spec.md §4.9 / §5 calls for.
pub struct JanusServer {
    socket_path: String,
    config: JanusServerConfig,
    manifest: Option<Arc<Manifest>>,
    handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
    clients: Arc<ClientRegistry>,
    events: EventBus,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    listen_task: Mutex<Option<JoinHandle<()>>>,
    total_requests: Arc<std::sync::atomic::AtomicU64>,
    started_at: Mutex<Option<Instant>>,
}

impl JanusServer {
    pub fn new(socket_path: impl Into<String>, config: JanusServerConfig) -> Result<Self> {
        let socket_path = socket_path.into();
        SecurityValidator::validate_socket_path(&socket_path)?;
        config.validate()?;

        Ok(Self {
            socket_path,
            clients: Arc::new(ClientRegistry::new(config.max_active_clients)),
            config,
            manifest: None,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            events: EventBus::default(),
            shutdown_tx: Mutex::new(None),
            listen_task: Mutex::new(None),
            total_requests: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            started_at: Mutex::new(None),
        })
    }

    /// Attaches a Manifest so non-built-in requests get argument validation
    /// and the `manifest`/`spec` built-ins have something to return.
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(Arc::new(manifest));
        self
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.lock().unwrap().is_some()
    }

    pub fn active_client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// Registers a handler for `request_name`. Rejects built-in names — they
    /// are never overridable — and enforces `max_handlers`.
    pub fn register_handler<F>(&self, request_name: &str, handler: F) -> Result<()>
    where
        F: Fn(&Request) -> Result<Value> + Send + Sync + 'static,
    {
        // Request-name shape (charset, length) doesn't depend on client vs.
        // server config; reuse the client config's default cap here.
        SecurityValidator::validate_request_name(request_name, &crate::config::JanusClientConfig::default())?;
        if is_builtin_request(request_name) {
            return Err(JanusError::new(JanusErrorCode::ValidationFailed, format!("'{request_name}' is a reserved built-in request name")));
        }

        let mut handlers = self.handlers.lock().unwrap();
        if handlers.len() >= self.config.max_handlers && !handlers.contains_key(request_name) {
            return Err(JanusError::new(JanusErrorCode::ResourceLimitExceeded, format!("maximum of {} handlers already registered", self.config.max_handlers)));
        }
        handlers.insert(request_name.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Binds the socket and starts the receive loop as a background task.
    /// Returns once the socket is bound and listening.
    pub async fn start(&self) -> Result<()> {
        if self.config.cleanup_on_start {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        let socket = UnixDatagram::bind(&self.socket_path).map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to bind {}: {e}", self.socket_path)))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock().unwrap() = Some(shutdown_tx);
        *self.started_at.lock().unwrap() = Some(Instant::now());

        let handlers = self.handlers.clone();
        let clients = self.clients.clone();
        let manifest = self.manifest.clone();
        let config = self.config.clone();
        let events = self.events.clone();
        let socket_path = self.socket_path.clone();
        let total_requests = self.total_requests.clone();
        let started_at = Instant::now();

        let task = tokio::spawn(async move {
            Self::listen_loop(socket, handlers, clients, manifest, config, events, shutdown_rx, total_requests, started_at).await;
            log::info!("stopped listening on {socket_path}");
        });
        *self.listen_task.lock().unwrap() = Some(task);

        log::info!("listening on {}", self.socket_path);
        Ok(())
    }

    /// Signals the receive loop to stop and waits for it to finish.
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        let task = self.listen_task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        if self.config.cleanup_on_shutdown {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn listen_loop(
        socket: UnixDatagram,
        handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
        clients: Arc<ClientRegistry>,
        manifest: Option<Arc<Manifest>>,
        config: JanusServerConfig,
        events: EventBus,
        mut shutdown: watch::Receiver<bool>,
        total_requests: Arc<std::sync::atomic::AtomicU64>,
        started_at: Instant,
    ) {
        loop {
            let mut buf = vec![0u8; config.max_message_size];
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, _from)) => {
                            let data = buf[..len].to_vec();
                            let handlers = handlers.clone();
                            let clients = clients.clone();
                            let manifest = manifest.clone();
                            let config = config.clone();
                            let events = events.clone();
                            let total_requests = total_requests.clone();
                            tokio::spawn(async move {
                                Self::process_datagram(data, handlers, clients, manifest, config, events, total_requests, started_at).await;
                            });
                        }
                        Err(e) => log::warn!("recv_from failed: {e}"),
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_datagram(
        data: Vec<u8>,
        handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
        clients: Arc<ClientRegistry>,
        manifest: Option<Arc<Manifest>>,
        config: JanusServerConfig,
        events: EventBus,
        total_requests: Arc<std::sync::atomic::AtomicU64>,
        started_at: Instant,
    ) {
        let request = match codec::decode_request(&data, config.max_message_size) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("failed to decode inbound datagram: {e}");
                return;
            }
        };

        if let Err(e) = SecurityValidator::validate_request_id(&request.id) {
            log::warn!("rejecting request with invalid id '{}': {e}", request.id);
            if let Some(reply_to) = &request.reply_to {
                Self::send_response(Response::error(request.id.clone(), e.into_wire_error()), reply_to, config.max_message_size, &events).await;
            }
            return;
        }

        if let Err(e) = SecurityValidator::validate_timestamp(request.timestamp) {
            log::warn!("rejecting request {} with out-of-window timestamp: {e}", request.id);
            if let Some(reply_to) = &request.reply_to {
                Self::send_response(Response::error(request.id.clone(), e.into_wire_error()), reply_to, config.max_message_size, &events).await;
            }
            return;
        }

        total_requests.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let client_id = request.reply_to.clone().unwrap_or_else(|| request.id.clone());
        let (is_new, evicted) = clients.touch(&client_id);
        if is_new {
            events.publish(JanusEvent::ClientConnected { client_id: client_id.clone() });
        }
        if let Some(evicted_id) = evicted {
            log::debug!("evicted idle client {evicted_id}");
            events.publish(JanusEvent::ClientEvicted { client_id: evicted_id });
        }

        events.publish(JanusEvent::RequestSent { request_id: request.id.clone(), request: request.request.clone() });
        let stats = ServerStatsSnapshot {
            active_clients: clients.len(),
            total_connections: clients.total_seen(),
            total_requests: total_requests.load(std::sync::atomic::Ordering::Relaxed),
            uptime_secs: started_at.elapsed().as_secs_f64(),
        };
        let response = Self::dispatch(&request, &handlers, manifest.as_deref(), &stats, &events).await;
        events.publish(JanusEvent::ResponseReceived { request_id: response.request_id.clone(), success: response.success });

        if let Some(reply_to) = &request.reply_to {
            Self::send_response(response, reply_to, config.max_message_size, &events).await;
        }
    }

    async fn dispatch(request: &Request, handlers: &Arc<Mutex<HashMap<String, RequestHandler>>>, manifest: Option<&Manifest>, stats: &ServerStatsSnapshot, events: &EventBus) -> Response {
        let empty = HashMap::new();
        let args = request.args.as_ref().unwrap_or(&empty);

        if let (Some(manifest), false) = (manifest, is_builtin_request(&request.request)) {
            if let Err(e) = ArgumentValidator::new(manifest.clone()).validate_arguments(&request.request, args) {
                return Response::error(request.id.clone(), e.into_wire_error());
            }
        }

        let handler = handlers.lock().unwrap().get(&request.request).cloned();
        if let Some(handler) = handler {
            return match handler(request) {
                Ok(result) => Response::success(request.id.clone(), Some(result)),
                Err(e) => {
                    events.publish(JanusEvent::HandlerError { request_id: request.id.clone(), message: e.to_string() });
                    Response::error(request.id.clone(), e.into_wire_error())
                }
            };
        }

        Self::builtin_response(request, manifest, stats).await
    }

    /// Built-in request bodies (§6): field names and shapes here are
    /// normative across every Janus implementation, not just this one.
    async fn builtin_response(request: &Request, manifest: Option<&Manifest>, stats: &ServerStatsSnapshot) -> Response {
        let empty = HashMap::new();
        let args = request.args.as_ref().unwrap_or(&empty);

        match request.request.as_str() {
            "ping" => Response::success(request.id.clone(), Some(serde_json::json!({"pong": true, "timestamp": epoch_secs()}))),
            "echo" => {
                let echo = args.get("message").cloned().unwrap_or_else(|| Value::String("Hello from the Janus server!".to_string()));
                Response::success(request.id.clone(), Some(serde_json::json!({"echo": echo})))
            }
            "get_info" => Response::success(
                request.id.clone(),
                Some(serde_json::json!({
                    "server": "janus",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": epoch_secs(),
                })),
            ),
            "validate" => match args.get("message").and_then(Value::as_str) {
                Some(message) => match serde_json::from_str::<Value>(message) {
                    Ok(_) => Response::success(request.id.clone(), Some(serde_json::json!({"valid": true}))),
                    Err(e) => Response::success(request.id.clone(), Some(serde_json::json!({"valid": false, "error": e.to_string()}))),
                },
                None => Response::success(request.id.clone(), Some(serde_json::json!({"valid": false, "error": "no message provided for validation"}))),
            },
            "slow_process" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Response::success(request.id.clone(), Some(serde_json::json!({"processed": true, "delay": "2000ms"})))
            }
            "manifest" | "spec" => match manifest {
                Some(manifest) => match serde_json::to_value(manifest) {
                    Ok(value) => Response::success(request.id.clone(), Some(value)),
                    Err(e) => Response::error(request.id.clone(), JsonRpcError::new(JanusErrorCode::InternalError, Some(e.to_string()))),
                },
                None => Response::success(request.id.clone(), Some(serde_json::json!({"error": "no manifest loaded"}))),
            },
            "server_stats" => Response::success(
                request.id.clone(),
                Some(serde_json::json!({
                    "uptime": stats.uptime_secs,
                    "total_connections": stats.total_connections,
                    "total_requests": stats.total_requests,
                    "active_clients": stats.active_clients,
                })),
            ),
            other => Response::error(request.id.clone(), JsonRpcError::new(JanusErrorCode::MethodNotFound, Some(format!("unknown request '{other}'")))),
        }
    }

    async fn send_response(response: Response, reply_to: &str, max_message_size: usize, events: &EventBus) {
        let payload = match codec::encode_response(&response, max_message_size) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("failed to encode response for {}: {e}", response.request_id);
                return;
            }
        };

        match UnixDatagram::unbound() {
            Ok(socket) => {
                if let Err(e) = socket.send_to(&payload, reply_to).await {
                    log::warn!("failed to send response to {reply_to}: {e}");
                    events.publish(JanusEvent::HandlerError { request_id: response.request_id.clone(), message: e.to_string() });
                }
            }
            Err(e) => log::error!("failed to create reply socket: {e}"),
        }
    }
}

impl Drop for JanusServer {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shutdown_tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(true);
            }
        }
        if let Ok(mut guard) = self.listen_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
        if self.config.cleanup_on_shutdown {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
