// SPDX-License-Identifier: Apache-2.0

use crate::{SheetsBackend, StoreError};
use async_trait::async_trait;
use bijux_sheets_model::{cell_is_blank, row_is_blank, Cell, RangeSpan, Row, SheetRange};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct CallCounters {
    pub get: AtomicU64,
    pub append: AtomicU64,
    pub update: AtomicU64,
    pub clear: AtomicU64,
}

impl CallCounters {
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.append.load(Ordering::Relaxed)
            + self.update.load(Ordering::Relaxed)
            + self.clear.load(Ordering::Relaxed)
    }
}

/// In-process spreadsheet with the same range semantics as the Sheets API.
///
/// Cells are kept as a ragged grid per sheet; `Null` marks a cell that was
/// never written or has been cleared.
#[derive(Default)]
pub struct MemorySheetsBackend {
    sheets: Mutex<BTreeMap<String, Vec<Row>>>,
    pub calls: CallCounters,
    failures_armed: AtomicU32,
}

impl MemorySheetsBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sheet(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.sheets.get_mut().insert(name.to_string(), rows);
        self
    }

    pub async fn add_sheet(&self, name: &str, rows: Vec<Row>) {
        self.sheets.lock().await.insert(name.to_string(), rows);
    }

    /// Sheet contents as a `get` of the whole sheet would return them.
    pub async fn sheet_rows(&self, name: &str) -> Option<Vec<Row>> {
        self.sheets
            .lock()
            .await
            .get(name)
            .map(|grid| trimmed(grid.iter().cloned()))
    }

    /// Makes the next `count` calls fail with a retryable 503.
    pub fn fail_next(&self, count: u32) {
        self.failures_armed.store(count, Ordering::Relaxed);
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        let armed = self
            .failures_armed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        if armed.is_ok() {
            return Err(StoreError::Status {
                status: 503,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn unknown(name: &str) -> StoreError {
    StoreError::UnknownSheet(name.to_string())
}

/// Drops trailing blank cells of each row and trailing blank rows; blank
/// cells that remain inside a row come back as empty strings.
fn trimmed(rows: impl Iterator<Item = Row>) -> Vec<Row> {
    let mut out: Vec<Row> = rows
        .map(|mut row| {
            while row.last().is_some_and(cell_is_blank) {
                row.pop();
            }
            row.into_iter()
                .map(|cell| match cell {
                    Value::Null => Value::String(String::new()),
                    other => other,
                })
                .collect()
        })
        .collect();
    while out.last().is_some_and(|row| row.is_empty()) {
        out.pop();
    }
    out
}

fn set_cell(grid: &mut Vec<Row>, row: usize, col: usize, value: Cell) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, Value::Null);
    }
    cells[col] = value;
}

/// Zero-based `(first_row, first_col)` corner and optional inclusive bounds.
struct Window {
    first_row: usize,
    last_row: Option<usize>,
    first_col: usize,
    last_col: Option<usize>,
}

fn window(span: RangeSpan) -> Window {
    match span {
        RangeSpan::Sheet => Window {
            first_row: 0,
            last_row: None,
            first_col: 0,
            last_col: None,
        },
        RangeSpan::Columns { first, last } => Window {
            first_row: 0,
            last_row: None,
            first_col: first as usize,
            last_col: Some(last as usize),
        },
        RangeSpan::Cells {
            first_col,
            last_col,
            first_row,
            last_row,
        } => Window {
            first_row: first_row.saturating_sub(1) as usize,
            last_row: Some(last_row.saturating_sub(1) as usize),
            first_col: first_col as usize,
            last_col: Some(last_col as usize),
        },
    }
}

impl Window {
    fn rows(&self, len: usize) -> std::ops::Range<usize> {
        let end = self.last_row.map_or(len, |last| (last + 1).min(len));
        self.first_row.min(end)..end
    }

    fn cols(&self, len: usize) -> std::ops::Range<usize> {
        let end = self.last_col.map_or(len, |last| (last + 1).min(len));
        self.first_col.min(end)..end
    }
}

#[async_trait]
impl SheetsBackend for MemorySheetsBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get_values(&self, range: &SheetRange) -> Result<Vec<Row>, StoreError> {
        self.calls.get.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let sheets = self.sheets.lock().await;
        let grid = sheets
            .get(range.sheet_name())
            .ok_or_else(|| unknown(range.sheet_name()))?;
        let win = window(range.span());
        let rows = grid[win.rows(grid.len())]
            .iter()
            .map(|row| row[win.cols(row.len())].to_vec());
        Ok(trimmed(rows))
    }

    async fn append_rows(&self, sheet: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.calls.append.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let mut sheets = self.sheets.lock().await;
        let grid = sheets.get_mut(sheet).ok_or_else(|| unknown(sheet))?;
        let start = grid
            .iter()
            .rposition(|row| !row_is_blank(row))
            .map_or(0, |last| last + 1);
        grid.truncate(start);
        grid.extend(rows);
        Ok(())
    }

    async fn update_values(&self, range: &SheetRange, rows: Vec<Row>) -> Result<(), StoreError> {
        self.calls.update.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let mut sheets = self.sheets.lock().await;
        let grid = sheets
            .get_mut(range.sheet_name())
            .ok_or_else(|| unknown(range.sheet_name()))?;
        let win = window(range.span());
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                set_cell(grid, win.first_row + r, win.first_col + c, value);
            }
        }
        Ok(())
    }

    async fn clear_values(&self, range: &SheetRange) -> Result<(), StoreError> {
        self.calls.clear.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let mut sheets = self.sheets.lock().await;
        let grid = sheets
            .get_mut(range.sheet_name())
            .ok_or_else(|| unknown(range.sheet_name()))?;
        let win = window(range.span());
        let row_range = win.rows(grid.len());
        for row in &mut grid[row_range] {
            let col_range = win.cols(row.len());
            for cell in &mut row[col_range] {
                *cell = Value::Null;
            }
        }
        Ok(())
    }
}
