//! Terminal chat client.
//!
//! Demonstrates:
//! - Connecting a session with an alias
//! - Queued event delivery onto a printer task
//! - Sending stdin lines as chat messages
//!
//! Usage:
//!   cargo run --example chat_client -- --alias alice
//!   cargo run --example chat_client -- --host 127.0.0.1 --port 5000 --alias bob

mod common;

// ============================================================================
// Imports
// ============================================================================

use chat_relay::{ClientConfig, ClientEvent, Result, ServerManager, Session, sink_channel};
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
    println!("=== Chat Client ===\n");

    if args.alias.trim().is_empty() {
        println!("[!] The alias cannot be empty");
        return Ok(());
    }
    if !ServerManager::is_running(&args.host, args.port).await {
        println!("[!] Server not found. Start the relay first.");
        return Ok(());
    }

    let (sink, mut events) = sink_channel();
    let config = ClientConfig::new(args.alias.clone())
        .with_host(args.host.clone())
        .with_port(args.port);
    let session = Session::connect_with(config, sink).await?;

    println!("    ✓ Connected to {}:{} as {}\n", args.host, args.port, args.alias);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Message(msg) if msg.is_system() => println!("  -- {} --", msg.body),
                ClientEvent::Message(msg) => println!("{msg}"),
                ClientEvent::Error(e) => println!("[ERROR] {e}"),
            }
        }
    });

    common::read_lines_until_exit(async |line: String| {
        if let Err(e) = session.send(&line).await {
            println!("[ERROR] {e}");
        }
    })
    .await;

    session.close().await;
    printer.abort();
    println!("\n    ✓ Connection closed");
    Ok(())
}
