use std::collections::HashMap;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use janus::{JanusClient, JanusClientConfig, JanusServer, JanusServerConfig, Manifest, ManifestParser};

/// Connectionless request/response IPC over Unix-domain datagram sockets.
#[derive(Parser, Debug)]
#[command(name = "janus", about = "Janus SOCK_DGRAM client/server", version)]
struct Cli {
    /// Unix socket path.
    #[arg(long, value_name = "PATH")]
    socket: String,

    /// Listen for requests on `--socket` instead of sending one.
    #[arg(long, conflicts_with = "send_to")]
    listen: bool,

    /// Send a single request to the server bound at PATH.
    #[arg(long, value_name = "PATH")]
    send_to: Option<String>,

    /// Request name to send (client mode only).
    #[arg(long, value_name = "NAME", default_value = "ping")]
    request: String,

    /// Message argument for the request (client mode only).
    #[arg(long, value_name = "TEXT")]
    message: Option<String>,

    /// Manifest file to load (JSON, or YAML with the `yaml-support` feature).
    #[arg(long, value_name = "FILE")]
    manifest: Option<String>,

    /// Enable debug logging regardless of `RUST_LOG`.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    if !cli.listen && cli.send_to.is_none() {
        eprintln!("error: either --listen or --send-to <PATH> is required");
        return ExitCode::from(2);
    }

    let manifest = match load_manifest(cli.manifest.as_deref()) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("error: failed to load manifest: {e}");
            return ExitCode::from(2);
        }
    };

    let result = if cli.listen {
        run_server(&cli.socket, manifest).await
    } else {
        run_client(cli.send_to.as_deref().unwrap(), &cli.request, cli.message.as_deref()).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_manifest(path: Option<&str>) -> Result<Option<Manifest>, Box<dyn std::error::Error>> {
    let Some(path) = path else { return Ok(None) };
    let content = std::fs::read_to_string(path)?;
    #[cfg(feature = "yaml-support")]
    let manifest = if path.ends_with(".yaml") || path.ends_with(".yml") {
        ManifestParser::from_yaml(&content)?
    } else {
        ManifestParser::from_json(&content)?
    };
    #[cfg(not(feature = "yaml-support"))]
    let manifest = ManifestParser::from_json(&content)?;
    log::info!("loaded manifest v{}", manifest.version);
    Ok(Some(manifest))
}

async fn run_server(socket_path: &str, manifest: Option<Manifest>) -> Result<(), Box<dyn std::error::Error>> {
    let mut server = JanusServer::new(socket_path, JanusServerConfig::default())?;
    if let Some(manifest) = manifest {
        server = server.with_manifest(manifest);
    }

    server.start().await?;
    println!("listening on {socket_path}");

    tokio::signal::ctrl_c().await?;
    println!("shutting down");
    server.stop().await;
    Ok(())
}

async fn run_client(target: &str, request: &str, message: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let client = JanusClient::new(target, JanusClientConfig::default())?;

    let args = message.map(|message| {
        let mut args = HashMap::new();
        args.insert("message".to_string(), Value::String(message.to_string()));
        args
    });

    let response = client.send_request(request, args, None).await?;
    println!("success={} result={:?}", response.success, response.result);
    if let Some(error) = &response.error {
        println!("error={} message={}", error.code, error.message);
    }
    Ok(())
}
