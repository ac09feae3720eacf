#![forbid(unsafe_code)]
//! REST item service over a spreadsheet.
//!
//! [`ItemStore`] maps item CRUD onto the data sheet and records every
//! mutation in the log sheet; [`build_router`] exposes it over HTTP.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

mod backend;
mod clock;
mod config;
mod http;
mod items;
mod middleware;

pub use backend::open_backend;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    ApiConfig, BackendMode, ConfigError, Secret, ServerConfig, SheetsConfig,
    CONFIG_SCHEMA_VERSION,
};
pub use http::errors::{map_error, ApiError, ApiErrorCode};
pub use items::{ItemStore, ItemStoreError, SheetNames, DEFAULT_DATA_SHEET, DEFAULT_LOG_SHEET};

pub const CRATE_NAME: &str = "bijux-sheets-server";

#[derive(Clone)]
pub struct AppState {
    pub items: Arc<ItemStore>,
    pub api: ApiConfig,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(items: ItemStore, api: ApiConfig) -> Self {
        Self {
            items: Arc::new(items),
            api,
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/v1/version", get(http::handlers::version_handler))
        .route(
            "/api/items",
            get(http::handlers::list_items_handler).post(http::handlers::create_item_handler),
        )
        .route(
            "/api/items/batch",
            post(http::handlers::create_batch_handler),
        )
        .route(
            "/api/items/:id",
            put(http::handlers::update_item_handler).delete(http::handlers::delete_item_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let backend = Arc::new(bijux_sheets_store::MemorySheetsBackend::new());
    AppState::new(
        ItemStore::new(backend, SheetNames::default(), Arc::new(SystemClock)),
        ApiConfig::default(),
    )
}
