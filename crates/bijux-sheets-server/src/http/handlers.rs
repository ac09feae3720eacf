// SPDX-License-Identifier: Apache-2.0

use crate::http::errors::{api_error_response, ApiError, ApiErrorCode};
use crate::{AppState, CRATE_NAME};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bijux_sheets_model::Item;
use serde_json::json;

fn rejected_body(rejection: &JsonRejection) -> Response {
    let code = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiErrorCode::PayloadTooLarge
    } else {
        ApiErrorCode::InvalidRequest
    };
    api_error_response(ApiError::new(
        code,
        "invalid request body",
        json!({"reason": rejection.body_text()}),
    ))
}

fn rejected_id(rejection: &PathRejection) -> Response {
    api_error_response(ApiError::invalid_request(
        "item id must be an integer",
        &rejection.body_text(),
    ))
}

pub(crate) async fn create_item_handler(
    State(state): State<AppState>,
    body: Result<Json<Item>, JsonRejection>,
) -> Response {
    let Json(item) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(&rejection),
    };
    match state.items.create(&item).await {
        Ok(()) => (StatusCode::OK, "Item criado com sucesso.").into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_items_handler(State(state): State<AppState>) -> Response {
    match state.items.read_all().await {
        Ok(items) => Json(items).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_item_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Item>, JsonRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => return rejected_id(&rejection),
    };
    let Json(item) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(&rejection),
    };
    match state.items.update(id, &item).await {
        Ok(()) => (StatusCode::OK, "Item atualizado com sucesso.").into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_item_handler(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(id) => id,
        Err(rejection) => return rejected_id(&rejection),
    };
    match state.items.delete(id).await {
        Ok(()) => (StatusCode::OK, "Item deletado com sucesso.").into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_batch_handler(
    State(state): State<AppState>,
    body: Result<Json<Vec<Item>>, JsonRejection>,
) -> Response {
    let Json(items) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(&rejection),
    };
    match state.items.create_batch(&items).await {
        Ok(count) => (StatusCode::OK, format!("{count} itens criados com sucesso.")).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn version_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "server": {
            "crate": CRATE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.items.backend_tag(),
            "config_schema_version": crate::config::CONFIG_SCHEMA_VERSION,
        }
    }))
}
