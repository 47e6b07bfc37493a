/// Generates a unique ephemeral reply-socket path under `/tmp`, scoped by
/// PID and a nanosecond timestamp so concurrent clients in the same process
/// never collide.
///
/// Grounded on `core/unix_datagram_client.rs`'s `generate_response_socket_path`.
pub fn generate_reply_socket_path() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let pid = std::process::id();
    format!("/tmp/janus_reply_{pid}_{timestamp}.sock")
}
