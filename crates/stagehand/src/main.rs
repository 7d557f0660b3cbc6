//! stagehand - MCP bridge daemon for driving a host DAW.
//!
//! Startup order matters: configuration and the singleton guard first (a
//! second instance must exit non-zero before touching any DAW port), then
//! state and background tasks, then the stdio MCP transport. The process
//! serves until stdin closes or a signal arrives.

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;
use tracing::{info, warn};

use stagehand::api::dispatch::Dispatcher;
use stagehand::api::tools::build_registry;
use stagehand::catalog::PopulateOutcome;
use stagehand::config::Config;
use stagehand::mcp::BridgeServer;
use stagehand::singleton::SingletonGuard;
use stagehand::state::AppState;
use stagehand::web::{self, WebState};
use stagehand::{telemetry, VERSION};

/// MCP bridge daemon for a host DAW.
///
/// Configuration is environment-driven: TCP_PORT, UDP_RT_PORT,
/// OSC_SEND_PORT, OSC_RECV_PORT, SENTINEL_PORT, DASHBOARD_ENABLED,
/// DASHBOARD_PORT, CATALOG_DIR, LOG_LEVEL.
#[derive(Parser, Debug)]
#[command(name = "stagehand", version, about)]
struct Cli {
    /// Enable the dashboard HTTP server regardless of DASHBOARD_ENABLED
    #[arg(long)]
    dashboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("configuration error")?;
    telemetry::init(config.log_level.as_deref());

    // Refuse to start a second instance before binding anything else.
    let _singleton = SingletonGuard::acquire(config.sentinel_port)?;

    info!("stagehand v{} starting", VERSION);
    info!(
        tcp = config.tcp_port,
        udp_rt = config.udp_rt_port,
        osc_send = config.osc_send_port,
        osc_recv = config.osc_recv_port,
        "DAW ports"
    );

    let dashboard_enabled = cli.dashboard || config.dashboard_enabled;
    let dashboard_port = config.dashboard_port;

    let state = AppState::build(config).await?;
    let registry = build_registry();
    info!(tools = registry.len(), "tool registry built");
    let dispatcher = Dispatcher::new(Arc::clone(&state), registry);

    spawn_background_tasks(Arc::clone(&state), dashboard_enabled, dashboard_port);

    // Serve MCP over stdio; rmcp handles the JSON-RPC framing.
    let server = BridgeServer::new(Arc::clone(&dispatcher));
    let service = server
        .serve(stdio())
        .await
        .context("failed to start stdio MCP service")?;
    info!("MCP server running on stdio");

    tokio::select! {
        result = service.waiting() => {
            result.context("MCP service error")?;
            info!("stdin closed, shutting down");
        }
        _ = shutdown_signal() => {
            info!("signal received, shutting down");
        }
    }

    Ok(())
}

/// Long-lived background work: the initial DAW connect probe, the catalog
/// warm-up (disk first, then a populate once the DAW is reachable), and
/// the dashboard when enabled.
fn spawn_background_tasks(state: Arc<AppState>, dashboard_enabled: bool, dashboard_port: u16) {
    // Connect probe: establish the first TCP session so readiness and the
    // catalog populate don't wait for the first tool call.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                {
                    let tcp = state.pipeline.tcp();
                    let mut slot = tcp.lock().await;
                    if tcp.ensure_session(&mut slot).await.is_ok() {
                        break;
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        });
    }

    // Catalog: disk snapshot immediately; full populate only once the DAW
    // is reachable and only if the cache is still empty.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.catalog.load_from_disk();

            loop {
                if state
                    .daw_connected
                    .wait_timeout(std::time::Duration::from_secs(30))
                    .await
                {
                    break;
                }
            }

            if state.catalog.item_count() > 0 {
                return;
            }
            match state.catalog.populate(&state.pipeline).await {
                Ok(PopulateOutcome::Completed { items }) => {
                    info!(items, "startup catalog populate finished")
                }
                Ok(PopulateOutcome::AlreadyRunning) => {}
                Err(e) => warn!("startup catalog populate failed: {}", e),
            }
        });
    }

    if dashboard_enabled {
        let web_state = WebState { app: state };
        tokio::spawn(async move {
            if let Err(e) = web::run(web_state, dashboard_port).await {
                warn!("dashboard server exited: {}", e);
            }
        });
    }
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {}
    }
}
