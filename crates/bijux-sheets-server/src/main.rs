#![forbid(unsafe_code)]

use bijux_sheets_server::{
    build_router, open_backend, AppState, ItemStore, ServerConfig, SystemClock, CRATE_NAME,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = ServerConfig::from_env().map_err(|e| format!("configuration error: {e}"))?;
    init_tracing(config.log_json);

    let backend = open_backend(&config).map_err(|e| format!("configuration error: {e}"))?;
    let items = ItemStore::new(
        backend,
        config.sheets.sheets.clone(),
        Arc::new(SystemClock),
    );
    let state = AppState::new(items, config.api.clone());
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| format!("bind {} failed: {e}", config.bind_addr))?;
    info!(
        bind = %config.bind_addr,
        backend = ?config.backend,
        "{CRATE_NAME} listening"
    );
    let drain = config.shutdown_drain;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            info!(drain_ms = drain.as_millis() as u64, "shutdown requested");
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
