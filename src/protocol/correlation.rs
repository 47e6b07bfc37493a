use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::wire::Response;

/// One outstanding request awaiting a reply.
#[derive(Debug)]
struct PendingRequest {
    resolve: oneshot::Sender<Response>,
    timestamp: Instant,
    timeout: Duration,
}

/// Configuration for [`CorrelationEngine`].
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    pub max_pending_requests: usize,
    pub cleanup_interval: Duration,
    pub default_timeout: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_pending_requests: 1000,
            cleanup_interval: Duration::from_secs(30),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Errors raised by the correlation registry itself, distinct from wire
/// errors returned inside a [`Response`].
#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("too many pending requests: maximum {max} allowed")]
    PendingRequestsLimit { max: usize },

    #[error("request already being tracked: {request_id}")]
    DuplicateRequestId { request_id: String },
}

/// Snapshot of the registry's current pending set, exposed for server_stats
/// and diagnostics (§4.9).
#[derive(Debug, Clone)]
pub struct PendingStatistics {
    pub pending_count: usize,
    pub average_age_secs: f64,
    pub oldest_request_id: Option<String>,
}

/// Client-side correlation registry: maps an outstanding `Request.id` to the
/// oneshot channel its caller is awaiting, and times it out bilaterally —
/// both a per-request timer set at `track_request` and a background sweep
/// that catches anything the per-request timer misses.
///
/// Grounded on `protocol/response_tracker.rs`'s `ResponseTracker`, paired
/// with `protocol/timeout_manager.rs`'s sweep design.
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
    config: CorrelationConfig,
    cleanup_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CorrelationEngine {
    pub fn new(config: CorrelationConfig) -> Self {
        let pending = Arc::new(Mutex::new(HashMap::new()));
        let cleanup_task = Self::start_cleanup_task(pending.clone(), config.cleanup_interval);
        Self {
            pending,
            config,
            cleanup_task: Arc::new(Mutex::new(Some(cleanup_task))),
        }
    }

    /// Registers `request_id` as awaiting a reply and arms its timeout.
    /// `timeout` of zero falls back to the engine's configured default.
    pub fn track_request(&self, request_id: String, timeout: Duration) -> Result<oneshot::Receiver<Response>, CorrelationError> {
        let timeout = if timeout.is_zero() { self.config.default_timeout } else { timeout };

        let mut pending = self.pending.lock().unwrap();
        if pending.len() >= self.config.max_pending_requests {
            return Err(CorrelationError::PendingRequestsLimit { max: self.config.max_pending_requests });
        }
        if pending.contains_key(&request_id) {
            return Err(CorrelationError::DuplicateRequestId { request_id });
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(
            request_id.clone(),
            PendingRequest {
                resolve: tx,
                timestamp: Instant::now(),
                timeout,
            },
        );
        drop(pending);

        let pending_map = self.pending.clone();
        let id_for_timer = request_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            Self::expire_if_stale(pending_map, id_for_timer, timeout);
        });

        Ok(rx)
    }

    /// Routes an inbound [`Response`] to its waiting caller. Returns `false`
    /// if the request is unknown — already answered, cancelled, or timed out.
    pub fn handle_response(&self, response: Response) -> bool {
        let mut pending = self.pending.lock().unwrap();
        match pending.remove(&response.request_id) {
            Some(entry) => {
                let _ = entry.resolve.send(response);
                true
            }
            None => false,
        }
    }

    pub fn cancel_request(&self, request_id: &str) -> bool {
        let mut pending = self.pending.lock().unwrap();
        pending.remove(request_id).is_some()
    }

    pub fn cancel_all(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_tracking(&self, request_id: &str) -> bool {
        self.pending.lock().unwrap().contains_key(request_id)
    }

    pub fn statistics(&self) -> PendingStatistics {
        let pending = self.pending.lock().unwrap();
        if pending.is_empty() {
            return PendingStatistics { pending_count: 0, average_age_secs: 0.0, oldest_request_id: None };
        }
        let now = Instant::now();
        let mut total_age = 0.0;
        let mut oldest: Option<(String, f64)> = None;
        for (id, entry) in pending.iter() {
            let age = now.duration_since(entry.timestamp).as_secs_f64();
            total_age += age;
            if oldest.as_ref().map_or(true, |(_, oldest_age)| age > *oldest_age) {
                oldest = Some((id.clone(), age));
            }
        }
        PendingStatistics {
            pending_count: pending.len(),
            average_age_secs: total_age / pending.len() as f64,
            oldest_request_id: oldest.map(|(id, _)| id),
        }
    }

    /// Sweeps and removes entries whose per-request timer has already
    /// elapsed, independent of the background cleanup task (§4.7).
    pub fn cleanup(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<String> = pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.timestamp) >= entry.timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            pending.remove(id);
        }
        expired.len()
    }

    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.cleanup_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
                let _ = task.await;
            }
        }
        self.cancel_all();
    }

    fn expire_if_stale(pending: Arc<Mutex<HashMap<String, PendingRequest>>>, request_id: String, timeout: Duration) {
        let mut pending = pending.lock().unwrap();
        if let Some(entry) = pending.get(&request_id) {
            if Instant::now().duration_since(entry.timestamp) >= timeout {
                pending.remove(&request_id);
            }
        }
    }

    fn start_cleanup_task(pending: Arc<Mutex<HashMap<String, PendingRequest>>>, cleanup_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let expired: Vec<String> = {
                    let pending = pending.lock().unwrap();
                    pending.iter().filter(|(_, e)| now.duration_since(e.timestamp) >= e.timeout).map(|(id, _)| id.clone()).collect()
                };
                if !expired.is_empty() {
                    let mut pending = pending.lock().unwrap();
                    for id in expired {
                        pending.remove(&id);
                    }
                }
            }
        })
    }
}

impl Drop for CorrelationEngine {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.cleanup_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_and_resolves_a_request() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let rx = engine.track_request("id-1".to_string(), Duration::from_secs(5)).unwrap();
        assert!(engine.is_tracking("id-1"));

        let response = Response::success("id-1", Some(serde_json::json!({"ok": true})));
        assert!(engine.handle_response(response.clone()));
        let received = rx.await.unwrap();
        assert_eq!(received, response);
        assert!(!engine.is_tracking("id-1"));
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let _rx = engine.track_request("dup".to_string(), Duration::from_secs(5)).unwrap();
        let err = engine.track_request("dup".to_string(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CorrelationError::DuplicateRequestId { .. }));
    }

    #[tokio::test]
    async fn pending_requests_limit_is_enforced() {
        let config = CorrelationConfig { max_pending_requests: 1, ..CorrelationConfig::default() };
        let engine = CorrelationEngine::new(config);
        let _rx = engine.track_request("a".to_string(), Duration::from_secs(5)).unwrap();
        let err = engine.track_request("b".to_string(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CorrelationError::PendingRequestsLimit { max: 1 }));
    }

    #[tokio::test]
    async fn boundary_timeout_expires_the_request() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let rx = engine.track_request("slow".to_string(), Duration::from_millis(30)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn unknown_response_is_ignored() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        assert!(!engine.handle_response(Response::success("never-tracked", None)));
    }

    #[tokio::test]
    async fn cancel_all_drops_every_pending_request() {
        let engine = CorrelationEngine::new(CorrelationConfig::default());
        let rx1 = engine.track_request("a".to_string(), Duration::from_secs(5)).unwrap();
        let rx2 = engine.track_request("b".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(engine.cancel_all(), 2);
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }
}
