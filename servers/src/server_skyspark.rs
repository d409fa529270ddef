//! # SkySpark Bridge Server
//!
//! Exposes the SkySpark Axon client over HTTP/JSON:
//!
//! - `POST /skyspark/data` with `{"query": "<axon>"}` returns
//!   `{"data": [{"time": "YYYY-MM-DD HH:MM:SS", "value": f64}]}` for the first
//!   series of a `hisRead` query.
//! - `GET /health` for liveness probes.
//!
//! The SkySpark host and token come from `spyspark.cfg`; a missing file or
//! host address stops the process at startup.

use anyhow::{Context, Result};
use lib_common::configs::config_sys::{default_config_path, load_sys_config};
use lib_common::loggers::loggerlocal::{LoggerLocal, LoggerLocalOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

mod skyspark_logic;
use skyspark_logic::{config, logger, service};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, notes) = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;
    notes.iter().for_each(config::ConfigNote::emit);

    let sys_path = config.spyspark_config.clone().unwrap_or_else(default_config_path);
    let sys = load_sys_config(&sys_path).with_context(|| format!("loading {}", sys_path.display()))?;
    log::info!("SkySpark host: {}", sys.host_address);

    // Client-side request traces go to their own JSON-lines file
    let client_logger = Arc::new(LoggerLocal::new(
        "skyspark_client".to_string(),
        Some(LoggerLocalOptions {
            use_tty: None,
            use_file: Some(vec![2, 3, 4, 5, 6]),
            log_dir: Some(config.log_dir()),
        }),
    ));

    let state = service::AppState::from_sys_config(&sys, config.transient_retries.unwrap_or(0), client_logger)?;
    let app = service::router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    log::info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
