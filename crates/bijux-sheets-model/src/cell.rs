// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// A single cell as exchanged with the spreadsheet backend.
pub type Cell = Value;

pub type Row = Vec<Cell>;

#[must_use]
pub fn cell_is_blank(cell: &Cell) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[must_use]
pub fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(cell_is_blank)
}

/// Coerces a cell into an integer.
///
/// Integral numbers and strings holding an integer (surrounding whitespace
/// ignored) convert; everything else, blank cells included, yields `None`.
#[must_use]
pub fn cell_as_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[must_use]
pub fn cell_to_text(cell: &Cell) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
