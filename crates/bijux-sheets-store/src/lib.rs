#![forbid(unsafe_code)]

use async_trait::async_trait;
use bijux_sheets_model::{RangeError, Row, SheetRange};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

mod auth;
mod google;
mod memory;
mod retry;

pub use auth::{
    AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource,
    DEFAULT_TOKEN_URI, SPREADSHEETS_SCOPE,
};
pub use google::{GoogleSheetsBackend, DEFAULT_SHEETS_API_BASE};
pub use memory::{CallCounters, MemorySheetsBackend};
pub use retry::{BackoffPolicy, RetryPolicy};

pub const CRATE_NAME: &str = "bijux-sheets-store";

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    Transport(String),
    Status { status: u16, message: String },
    Decode(String),
    Auth(String),
    UnknownSheet(String),
    InvalidRange(String),
}

impl StoreError {
    /// Transport failures, throttling and server-side errors may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "sheets transport failed: {msg}"),
            Self::Status { status, message } => {
                write!(f, "sheets api returned status {status}: {message}")
            }
            Self::Decode(msg) => write!(f, "sheets response decode failed: {msg}"),
            Self::Auth(msg) => write!(f, "sheets authentication failed: {msg}"),
            Self::UnknownSheet(name) => write!(f, "unknown sheet `{name}`"),
            Self::InvalidRange(msg) => write!(f, "invalid range: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<RangeError> for StoreError {
    fn from(value: RangeError) -> Self {
        Self::InvalidRange(value.to_string())
    }
}

/// Wire body of the Sheets `values` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Row>,
}

/// Range-level access to a spreadsheet.
///
/// Implementations never cache sheet contents; every call reaches the
/// underlying store.
#[async_trait]
pub trait SheetsBackend: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Rows of `range`, trailing blank cells and rows trimmed.
    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Row>, StoreError>;

    /// Inserts `rows` after the last non-empty row of `sheet`.
    async fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> Result<(), StoreError>;

    /// Overwrites the cells of `range`, starting at its top-left corner.
    async fn update_values(&self, range: &SheetRange, rows: Vec<Row>) -> Result<(), StoreError>;

    /// Blanks every cell of `range`; rows are not removed.
    async fn clear_values(&self, range: &SheetRange) -> Result<(), StoreError>;
}
