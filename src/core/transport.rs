use std::sync::Arc;

use tokio::net::UnixDatagram;

use crate::config::JanusClientConfig;
use crate::core::security_validator::SecurityValidator;
use crate::error::{JanusError, JanusErrorCode, Result};
use crate::utils::path_utils::generate_reply_socket_path;

/// Removes the reply socket's inode when dropped. A client that panics or
/// returns early between binding its ephemeral reply socket and receiving a
/// response still leaves the filesystem clean.
///
/// Grounded on `bin/janus.rs`'s `SocketCleanupGuard`.
struct ReplySocketGuard {
    path: String,
}

impl Drop for ReplySocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Connectionless Unix-domain datagram transport shared by the client facade
/// and the server dispatcher.
///
/// Grounded on `core/unix_datagram_client.rs`'s `UnixDatagramClient`.
#[derive(Debug, Clone)]
pub struct DatagramTransport {
    socket_path: String,
    config: Arc<JanusClientConfig>,
}

impl DatagramTransport {
    pub fn new(socket_path: impl Into<String>, config: JanusClientConfig) -> Result<Self> {
        let socket_path = socket_path.into();
        SecurityValidator::validate_socket_path(&socket_path)?;
        config.validate()?;
        Ok(Self {
            socket_path,
            config: Arc::new(config),
        })
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Binds a fresh ephemeral reply socket under `/tmp`, unique per process
    /// and call, suitable for use as a `Request.reply_to` value.
    pub fn generate_reply_path(&self) -> String {
        generate_reply_socket_path()
    }

    /// Sends `payload` to the server and awaits exactly one reply on a fresh
    /// reply socket, bounded by `timeout`.
    pub async fn send(&self, payload: &[u8], timeout: std::time::Duration) -> Result<Vec<u8>> {
        SecurityValidator::validate_message_size(payload.len(), &self.config)?;
        SecurityValidator::validate_utf8_data(payload)?;

        let reply_path = self.generate_reply_path();
        SecurityValidator::validate_socket_path(&reply_path)?;
        let reply_socket = UnixDatagram::bind(&reply_path)
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to bind reply socket: {e}")))?;
        let _guard = ReplySocketGuard { path: reply_path.clone() };

        let result = tokio::time::timeout(timeout, self.send_and_await(payload, &reply_socket, &reply_path))
            .await
            .map_err(|_| JanusError::new(JanusErrorCode::HandlerTimeout, format!("no reply within {timeout:?}")))?;

        result
    }

    async fn send_and_await(&self, payload: &[u8], reply_socket: &UnixDatagram, reply_path: &str) -> Result<Vec<u8>> {
        let client_socket = UnixDatagram::unbound()
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to create client socket: {e}")))?;

        client_socket
            .send_to(payload, &self.socket_path)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to send to {}: {e}", self.socket_path)))?;

        let _ = reply_path;
        let mut buf = vec![0u8; self.config.max_message_size];
        let (len, _) = reply_socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to receive reply: {e}")))?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Sends `payload` without binding a reply socket (fire-and-forget).
    pub async fn send_no_reply(&self, payload: &[u8]) -> Result<()> {
        SecurityValidator::validate_message_size(payload.len(), &self.config)?;
        SecurityValidator::validate_utf8_data(payload)?;

        let client_socket = UnixDatagram::unbound()
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to create client socket: {e}")))?;
        client_socket
            .send_to(payload, &self.socket_path)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to send to {}: {e}", self.socket_path)))?;
        Ok(())
    }

    /// Sends a minimal probe datagram to confirm the peer socket exists and
    /// accepts writes, without waiting for any reply.
    pub async fn test_connection(&self) -> Result<()> {
        let client_socket = UnixDatagram::unbound()
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("failed to create test socket: {e}")))?;
        client_socket
            .send_to(b"\"__janus_probe__\"", &self.socket_path)
            .await
            .map_err(|e| JanusError::new(JanusErrorCode::SocketError, format!("connection test failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::path_utils::generate_reply_socket_path;

    #[tokio::test]
    async fn ping_round_trip_over_real_sockets() {
        let server_path = generate_reply_socket_path();
        let server_socket = UnixDatagram::bind(&server_path).unwrap();

        let transport = DatagramTransport::new(server_path.clone(), JanusClientConfig::default()).unwrap();

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, from) = server_socket.recv_from(&mut buf).await.unwrap();
            server_socket.send_to(&buf[..len], from.as_pathname().unwrap()).await.unwrap();
        });

        let reply = transport.send(b"\"ping\"", std::time::Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply, b"\"ping\"");
        server_task.await.unwrap();
        let _ = std::fs::remove_file(&server_path);
    }

    #[tokio::test]
    async fn send_times_out_when_nobody_replies() {
        let server_path = generate_reply_socket_path();
        let _server_socket = UnixDatagram::bind(&server_path).unwrap();
        let transport = DatagramTransport::new(server_path.clone(), JanusClientConfig::default()).unwrap();

        let err = transport.send(b"\"ping\"", std::time::Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.code(), JanusErrorCode::HandlerTimeout);
        let _ = std::fs::remove_file(&server_path);
    }

    #[test]
    fn rejects_transport_on_disallowed_path() {
        assert!(DatagramTransport::new("/home/user/janus.sock", JanusClientConfig::default()).is_err());
    }
}
