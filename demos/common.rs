//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub alias: String,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// Flags: `--debug`, `--host <ip>`, `--port <n>`, `--alias <name>`.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            host: value("--host").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: value("--port")
                .and_then(|p| p.parse().ok())
                .unwrap_or(chat_relay::config::DEFAULT_PORT),
            alias: value("--alias").unwrap_or_else(|| chat_relay::DEFAULT_ALIAS.to_string()),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "chat_relay=debug"
    } else {
        "chat_relay=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Forward stdin lines to `on_line` until `exit`, end of input, or Ctrl+C.
pub async fn read_lines_until_exit(mut on_line: impl AsyncFnMut(String)) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case("exit") => break,
                Ok(Some(line)) => on_line(line).await,
                Ok(None) | Err(_) => break,
            },
        }
    }
}
