//! # Live Stock Price Push Server
//!
//! Serves a small list of stock quotes and pushes a randomly moved quote to
//! every connected client at jittered intervals, over Server-Sent Events.
//!
//! ## Routes (API root defaults to `/api/v1`):
//! - `GET /`: index page naming the stream URL.
//! - `GET /health`: liveness check.
//! - `GET {api_root}/subscribe`: the push stream, one `data: <json>` frame per update.
//! - `GET {api_root}/getData`: the current price list.
//! - `GET {api_root}/status`: subscriber, tick and scheduler counters.
//!
//! Configuration is layered: defaults, then `server_sse.conf`, then
//! environment (`SSE_*`, `.env` included) and command line.

#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use lib_common::core::BroadcastManager;
use lib_common::markets::stocks::{RecordTransform, Stocklist, basic_transform};
use tokio::signal;

mod sse_logic;
use sse_logic::{config, downstream, logger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config().into_settings()?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    log::info!("Starting with {:?}", settings);

    let transform: Arc<dyn RecordTransform> = Arc::new(basic_transform);
    let manager = BroadcastManager::with_options(
        Stocklist::find().pricelist,
        Some(transform),
        settings.manager_options(),
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let app_state = downstream::AppState::new(manager, &settings.api_root);

    let mut downstream_handle = tokio::spawn(downstream::run(
        settings.clone(),
        app_state,
        shutdown_tx.subscribe(),
    ));

    // Wait for a shutdown signal, or for the server to stop on its own
    let finished = tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
            None
        }
        _ = terminate() => {
            log::info!("SIGTERM received, initiating shutdown.");
            None
        }
        joined = &mut downstream_handle => Some(joined),
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            let _ = shutdown_tx.send(());
            downstream_handle.await
        }
    };

    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log::error!("Downstream server failed: {:#}", e);
            return Err(e);
        }
        Err(e) => log::error!("Downstream task panicked: {}", e),
    }

    log::info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut term_signal) => {
            term_signal.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    // On non-unix platforms, just wait forever.
    std::future::pending::<()>().await;
}
