//! HTTP upgrade bridge.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                 ┌──────────────────────────────────────────────┐
//!     GET / Upgrade: token   │  http::server ──▶ registry::dispatch          │
//!     ───────────────────────┼─▶  (axum)          │ token → [UpgradeHandler] │
//!                            │                    ▼                          │
//!     101 + accept digest    │            handshake::validator               │
//!     ◀──────────────────────┼──          (key, target, digest)             │
//!                            │                    │ HandoffTicket            │
//!     raw bytes              │                    ▼                          │
//!     ═══════════════════════┼═▶ handoff::coordinator ──▶ transport::acceptor ┼══▶ Broker
//!                            │                                               │    acceptor
//!                            │  directory (broker topology)   lifecycle      │
//!                            │  config  observability  admin                 │
//!                            └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use upgrade_bridge::admin::{setup_admin_router, AdminState};
use upgrade_bridge::config::loader::load_config;
use upgrade_bridge::config::watcher::ConfigWatcher;
use upgrade_bridge::lifecycle::signals::shutdown_signal;
use upgrade_bridge::observability::{logging, metrics};
use upgrade_bridge::{BridgeRuntime, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "upgrade-bridge", version, about = "HTTP upgrade bridge for broker acceptors")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "bridge.toml")]
    config: PathBuf,

    /// Reload broker and acceptor status when the file changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "upgrade-bridge starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = BridgeRuntime::start(&config)?;
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, listener = %config.listener.name, "Listening for upgrades");
    let server = HttpServer::new(config.listener.name.as_str(), runtime.dispatch.clone());
    let mut servers = vec![tokio::spawn(server.run(listener, shutdown.subscribe()))];

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState {
            listener: Arc::from(config.listener.name.as_str()),
            api_key: Arc::from(config.admin.api_key.as_str()),
            directory: runtime.directory.clone(),
            dispatch: runtime.dispatch.clone(),
            metadata: runtime.metadata.clone(),
        });
        let mut admin_shutdown = shutdown.subscribe();
        servers.push(tokio::spawn(async move {
            axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await
        }));
    }

    let _watcher = if args.watch {
        let (watcher, mut updates) = ConfigWatcher::new(&args.config);
        let directory = runtime.directory.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let skipped = directory.apply_status(&update.brokers);
                if skipped > 0 {
                    tracing::warn!(skipped, "Topology changes in reloaded config need a restart");
                }
            }
        });
        Some(watcher.run()?)
    } else {
        None
    };

    shutdown_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    for server in servers {
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Server exited with error"),
            Err(e) => tracing::error!(error = %e, "Server task failed"),
            Ok(Ok(())) => {}
        }
    }

    runtime.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
