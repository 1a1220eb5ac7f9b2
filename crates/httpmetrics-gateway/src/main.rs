//! httpmetrics demo gateway
//!
//! - Application routes on `server.listen`, measured per route template
//! - `/metrics`, `/healthz`, `/readyz` on `server.metrics_listen`
//! - Graceful shutdown on Ctrl-C / SIGTERM (readiness flips to draining first)

use std::future::IntoFuture;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use httpmetrics_core::Result;
use httpmetrics_gateway::{app_state::AppState, config, router};

const DEFAULT_CONFIG: &str = "httpmetrics.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;
    let metrics_listen = cfg.server.metrics_addr()?;

    let state = AppState::new(cfg)?;
    let app = router::build_router(&state);
    let ops = router::build_ops_router(state.clone());

    tracing::info!(%listen, %metrics_listen, config = %path, "httpmetrics-gateway starting");
    let app_listener = TcpListener::bind(listen).await?;
    let ops_listener = TcpListener::bind(metrics_listen).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let drain = state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown requested, draining");
        drain.set_draining();
        let _ = stop_tx.send(true);
    });

    let app_srv = axum::serve(app_listener, app)
        .with_graceful_shutdown(stopped(stop_rx.clone()))
        .into_future();
    let ops_srv = axum::serve(ops_listener, ops)
        .with_graceful_shutdown(stopped(stop_rx))
        .into_future();

    tokio::try_join!(app_srv, ops_srv)?;
    tracing::info!("httpmetrics-gateway stopped");
    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
