//! End-to-end scenarios exercising `JanusClient`/`JanusServer` together over
//! real Unix datagram sockets.

use std::collections::HashMap;
use std::time::Duration;

use janus::wire::{encode_response, Request, Response};
use janus::{
    ArgumentManifest, JanusClient, JanusClientConfig, JanusErrorCode, JanusServer, JanusServerConfig, Manifest, RequestManifest, ResponseManifest,
};
use serde_json::json;
use tokio::net::UnixDatagram;

fn fresh_socket_path() -> String {
    janus::utils::generate_reply_socket_path()
}

async fn start_server(path: &str, manifest: Option<Manifest>) -> JanusServer {
    let mut server = JanusServer::new(path, JanusServerConfig::default()).unwrap();
    if let Some(manifest) = manifest {
        server = server.with_manifest(manifest);
    }
    server.start().await.unwrap();
    server
}

#[tokio::test]
async fn ping_round_trip_returns_pong() {
    let path = fresh_socket_path();
    let server = start_server(&path, None).await;

    let mut config = JanusClientConfig::default();
    config.enable_validation = false;
    let client = JanusClient::new(path, config).unwrap();

    let response = client.send_request("ping", None, None).await.unwrap();
    assert!(response.success);
    assert_eq!(response.result.unwrap()["pong"], json!(true));

    server.stop().await;
}

#[tokio::test]
async fn unknown_request_is_rejected_with_method_not_found() {
    let path = fresh_socket_path();
    let server = start_server(&path, None).await;

    let mut config = JanusClientConfig::default();
    config.enable_validation = false;
    let client = JanusClient::new(path, config).unwrap();

    let response = client.send_request("foo", None, None).await.unwrap();
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.code, JanusErrorCode::MethodNotFound.code());
    assert!(error.message.contains("foo"));

    server.stop().await;
}

fn manifest_requiring_string_message() -> Manifest {
    let mut manifest = Manifest::new("1.0.0");
    let mut request = RequestManifest::new("echoes a message back", ResponseManifest::new("object"));
    request.add_argument("message", ArgumentManifest::new("string").required());
    manifest.add_request("echo", request);
    manifest
}

#[tokio::test]
async fn validation_failure_reports_the_offending_argument() {
    let path = fresh_socket_path();
    let server = start_server(&path, Some(manifest_requiring_string_message())).await;

    let client = JanusClient::new(path, JanusClientConfig::default()).unwrap();

    let mut args = HashMap::new();
    args.insert("message".to_string(), json!(42));
    let err = client.send_request("echo", Some(args), None).await.unwrap_err();

    assert_eq!(err.code(), JanusErrorCode::ValidationFailed);
    let wire = err.into_wire_error();
    let data = wire.data.unwrap();
    assert_eq!(data.field.as_deref(), Some("message"));
    assert_eq!(data.constraints.unwrap()["expected"], json!("string"));

    server.stop().await;
}

#[tokio::test]
async fn slow_process_exceeds_a_short_client_timeout() {
    let path = fresh_socket_path();
    let server = start_server(&path, None).await;

    let mut config = JanusClientConfig::default();
    config.enable_validation = false;
    let client = JanusClient::new(path, config).unwrap();

    let started = std::time::Instant::now();
    let err = client.send_request("slow_process", None, Some(Duration::from_millis(500))).await.unwrap_err();
    assert_eq!(err.code(), JanusErrorCode::HandlerTimeout);
    assert!(started.elapsed() < Duration::from_secs(2));

    server.stop().await;
}

#[tokio::test]
async fn mismatched_response_correlation_is_rejected() {
    let path = fresh_socket_path();
    let socket = UnixDatagram::bind(&path).unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        let Ok((len, _)) = socket.recv_from(&mut buf).await else { return };
        let Ok(request) = serde_json::from_slice::<Request>(&buf[..len]) else { return };
        let reply_to = request.reply_to.unwrap();
        let bogus = Response::success("not-the-right-id", Some(json!({"pong": true})));
        let payload = encode_response(&bogus, JanusClientConfig::default().max_message_size).unwrap();
        let reply_socket = UnixDatagram::unbound().unwrap();
        let _ = reply_socket.send_to(&payload, &reply_to).await;
    });

    let mut config = JanusClientConfig::default();
    config.enable_validation = false;
    let client = JanusClient::new(path.clone(), config).unwrap();

    let err = client.send_request("ping", None, None).await.unwrap_err();
    assert_eq!(err.code(), JanusErrorCode::ValidationFailed);
    assert!(err.to_string().contains("correlation mismatch"));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn backpressure_rejects_requests_past_the_pending_limit() {
    let path = fresh_socket_path();
    // A bound but never-read socket: every tracked request stays pending
    // until its own timeout, which is exactly what this test needs.
    let _silent_server = UnixDatagram::bind(&path).unwrap();

    let mut config = JanusClientConfig::default();
    config.enable_validation = false;
    config.max_pending_requests = 2;
    let client = JanusClient::new(path.clone(), config).unwrap();

    let first = client.send_request_tracked("ping".to_string(), None, Duration::from_secs(5)).unwrap();
    let second = client.send_request_tracked("ping".to_string(), None, Duration::from_secs(5)).unwrap();
    assert_eq!(client.pending_request_count(), 2);

    let third = client.send_request_tracked("ping".to_string(), None, Duration::from_secs(5)).unwrap_err();
    assert_eq!(third.code(), JanusErrorCode::ResourceLimitExceeded);

    first.cancel();
    second.cancel();
    let _ = std::fs::remove_file(&path);
}
