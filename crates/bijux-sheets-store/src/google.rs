// SPDX-License-Identifier: Apache-2.0

use crate::{AccessTokenSource, BackoffPolicy, RetryPolicy, SheetsBackend, StoreError, ValueRange};
use async_trait::async_trait;
use bijux_sheets_model::{Row, SheetRange};
use reqwest::{Method, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const ROWS_DIMENSION: &str = "ROWS";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Sheets API v4 `values` client for one spreadsheet.
pub struct GoogleSheetsBackend {
    base_url: String,
    spreadsheet_id: String,
    tokens: Option<Arc<dyn AccessTokenSource>>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GoogleSheetsBackend {
    #[must_use]
    pub fn new(
        spreadsheet_id: impl Into<String>,
        tokens: Option<Arc<dyn AccessTokenSource>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: DEFAULT_SHEETS_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
            retry,
            client: build_client(Duration::from_secs(15)),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    #[must_use]
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// `{base}/{spreadsheet}/values/{target}[:{verb}]`, segments percent-encoded.
    fn values_url(&self, target: &str, verb: Option<&str>) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::InvalidRange(format!("invalid api base url: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                StoreError::InvalidRange("api base url cannot carry a path".to_string())
            })?;
            segments.pop_if_empty().push(&self.spreadsheet_id).push("values");
            match verb {
                Some(verb) => segments.push(&format!("{target}:{verb}")),
                None => segments.push(target),
            };
        }
        Ok(url)
    }

    #[instrument(name = "sheets_request", skip(self, url, body), fields(backend = "google"))]
    async fn send(
        &self,
        method: Method,
        target: &str,
        url: Url,
        body: Option<&Value>,
        idempotent: bool,
    ) -> Result<Vec<u8>, StoreError> {
        let max_attempts = if idempotent { self.retry.attempts() } else { 1 };
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.send_once(&method, &url, body).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };
            if !failure.is_retryable() || attempt >= max_attempts {
                return Err(failure);
            }
            warn!(attempt, error = %failure, "sheets request failed; retrying");
            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, StoreError> {
        let mut req = self.client.request(method.clone(), url.clone());
        if let Some(tokens) = &self.tokens {
            req = req.bearer_auth(tokens.access_token().await?);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| StoreError::Transport(format!("read body failed: {e}")));
        }
        let text = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message: api_error_message(&text),
        })
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn encode_body(body: &ValueRange) -> Result<Value, StoreError> {
    serde_json::to_value(body).map_err(|e| StoreError::Decode(format!("value range encode failed: {e}")))
}

/// Pulls `error.message` out of a Google API error body, falling back to the
/// raw (truncated) text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect())
}

#[async_trait]
impl SheetsBackend for GoogleSheetsBackend {
    fn backend_tag(&self) -> &'static str {
        "google"
    }

    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Row>, StoreError> {
        let target = range.a1();
        let mut url = self.values_url(&target, None)?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        let bytes = self.send(Method::GET, &target, url, None, true).await?;
        let parsed: ValueRange = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Decode(format!("value range parse failed: {e}")))?;
        Ok(parsed.values)
    }

    async fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let target = SheetRange::sheet(sheet)?.a1();
        let mut url = self.values_url(&target, Some("append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = encode_body(&ValueRange {
            range: None,
            major_dimension: Some(ROWS_DIMENSION.to_string()),
            values: rows,
        })?;
        // A retried append can land twice, so appends get a single attempt.
        self.send(Method::POST, &target, url, Some(&body), false)
            .await
            .map(|_| ())
    }

    async fn update_values(&self, range: &SheetRange, rows: Vec<Row>) -> Result<(), StoreError> {
        let target = range.a1();
        let mut url = self.values_url(&target, None)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = encode_body(&ValueRange {
            range: Some(target.clone()),
            major_dimension: Some(ROWS_DIMENSION.to_string()),
            values: rows,
        })?;
        self.send(Method::PUT, &target, url, Some(&body), true)
            .await
            .map(|_| ())
    }

    async fn clear_values(&self, range: &SheetRange) -> Result<(), StoreError> {
        let target = range.a1();
        let url = self.values_url(&target, Some("clear"))?;
        self.send(Method::POST, &target, url, Some(&json!({})), true)
            .await
            .map(|_| ())
    }
}
