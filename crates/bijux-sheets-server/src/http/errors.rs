// SPDX-License-Identifier: Apache-2.0

use crate::items::ItemStoreError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiErrorCode {
    ItemNotFound,
    InvalidRequest,
    PayloadTooLarge,
    UpstreamStoreUnavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>, reason: &str) -> Self {
        Self::new(
            ApiErrorCode::InvalidRequest,
            message,
            json!({"reason": reason}),
        )
    }
}

#[must_use]
pub fn map_error(error: &ApiError) -> StatusCode {
    match error.code {
        ApiErrorCode::ItemNotFound => StatusCode::NOT_FOUND,
        ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ApiErrorCode::UpstreamStoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = map_error(&err);
    let mut resp = (status, Json(json!({"error": err}))).into_response();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        resp.headers_mut()
            .insert("retry-after", HeaderValue::from_static("3"));
    }
    resp
}

impl From<&ItemStoreError> for ApiError {
    fn from(value: &ItemStoreError) -> Self {
        match value {
            ItemStoreError::NotFound(id) => Self::new(
                ApiErrorCode::ItemNotFound,
                value.to_string(),
                json!({"id": id}),
            ),
            ItemStoreError::MissingId => Self::new(
                ApiErrorCode::InvalidRequest,
                value.to_string(),
                json!({"field": "id", "reason": "missing"}),
            ),
            ItemStoreError::Store(store) => Self::new(
                ApiErrorCode::UpstreamStoreUnavailable,
                "spreadsheet backend unavailable",
                json!({"cause": store.to_string(), "retryable": store.is_retryable()}),
            ),
        }
    }
}

impl IntoResponse for ItemStoreError {
    fn into_response(self) -> Response {
        if let Self::Store(err) = &self {
            error!(error = %err, "item store operation failed");
        }
        api_error_response(ApiError::from(&self))
    }
}
