//! Helix Sync Relay
//!
//! Runs a WebSocket topic relay that Helix devices can use as their
//! realtime sync transport.
//!
//! Usage:
//!   helix-relay --port 18792
//!
//! The relay is stateless and doesn't store any user data.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use helix_relay::{build_router, Hub};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "helix-relay")]
#[command(about = "Helix realtime sync relay")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "18792")]
    port: u16,

    /// Frames buffered per topic before slow subscribers start lagging
    #[arg(long, default_value = "100")]
    channel_capacity: usize,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Helix relay starting...");
    let hub = Arc::new(Hub::new(args.channel_capacity));
    let app = build_router(hub);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind port {}", args.port))?;
    info!("Relay listening on port {}", args.port);

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
