//! # edge-proxy
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!   :80  plaintext ──┼─► listener ─► redirect ─► 301 https://host/path      │
//!                    │                                                      │
//!   :443 TLS ────────┼─► listener ─► tls ─► limits ─► proxy ─► pool ───────┼─► upstream
//!                    │                                 ▲          │         │
//!                    │                      response ◄─┘     health state   │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_proxy::config::load_config;
use edge_proxy::lifecycle::{wait_for_shutdown_signal, Shutdown};
use edge_proxy::net::TlsTerminator;
use edge_proxy::{observability, EdgeServer};

#[derive(Parser)]
#[command(name = "edge-proxy")]
#[command(about = "TLS-terminating edge server with HTTP to HTTPS redirect", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "edge-proxy.toml")]
    config: PathBuf,

    /// Validate configuration and TLS material, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    observability::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "edge-proxy starting"
    );

    if cli.check {
        TlsTerminator::load(&config.tls)?;
        tracing::info!("Configuration OK");
        return Ok(());
    }

    let server = EdgeServer::bind(config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(server_shutdown));

    wait_for_shutdown_signal().await;
    shutdown.trigger();

    server_task.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
