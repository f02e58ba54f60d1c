//! Standalone relay server.
//!
//! Demonstrates:
//! - Probing the endpoint before starting
//! - Starting the process-wide relay with a logging sink
//! - Server announcements typed on stdin
//! - Stopping on `exit` or Ctrl+C
//!
//! Usage:
//!   cargo run --example relay_server
//!   cargo run --example relay_server -- --port 6000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;

use chat_relay::{Result, ServerConfig, ServerEvent, ServerManager, sink_fn};
use common::Args;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Relay Server ===\n");

    if ServerManager::is_running(&args.host, args.port).await {
        println!("[!] Something is already listening on {}:{}", args.host, args.port);
        return Ok(());
    }

    let host: IpAddr = args
        .host
        .parse()
        .map_err(|_| chat_relay::Error::connection(format!("invalid host: {}", args.host)))?;
    let config = ServerConfig::new().with_host(host).with_port(args.port);

    let manager = ServerManager::global();
    manager
        .start(
            config,
            sink_fn(|event| match event {
                ServerEvent::ClientConnected { alias, addr, .. } => {
                    println!("[INFO] Client connected: {alias} from {addr}");
                }
                ServerEvent::ClientDisconnected { alias, .. } => {
                    println!("[INFO] Client disconnected: {alias}");
                }
                ServerEvent::MessageReceived { alias, body } => {
                    println!("[MESSAGE] {alias}: {body}");
                }
                ServerEvent::Error(e) => println!("[ERROR] {e}"),
            }),
        )
        .await?;

    println!("[1] Listening on {}:{}", args.host, args.port);
    println!("    Type a line to announce it, `exit` to stop.\n");

    common::read_lines_until_exit(async |line: String| {
        if let Some(handle) = manager.handle().await {
            handle.announce(&line);
        }
    })
    .await;

    manager.stop().await;
    println!("\n    ✓ Relay stopped");
    Ok(())
}
