// SPDX-License-Identifier: Apache-2.0

use crate::cell::Row;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const LOG_HEADER: [&str; 3] = ["timestamp", "action", "details"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Create,
    Update,
    Delete,
    CreateBatch,
}

impl LogAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::CreateBatch => "CREATE_BATCH",
        }
    }
}

impl Display for LogAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit row; appended to the log sheet and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: LogAction,
    pub details: String,
}

impl LogEntry {
    #[must_use]
    pub fn new(at: NaiveDateTime, action: LogAction, details: impl Into<String>) -> Self {
        Self {
            timestamp: at.format(LOG_TIMESTAMP_FORMAT).to_string(),
            action,
            details: details.into(),
        }
    }

    #[must_use]
    pub fn to_row(&self) -> Row {
        vec![
            Value::String(self.timestamp.clone()),
            Value::String(self.action.as_str().to_string()),
            Value::String(self.details.clone()),
        ]
    }
}
