// SPDX-License-Identifier: Apache-2.0

use crate::cell::{cell_as_i64, cell_is_blank, cell_to_text, row_is_blank, Cell, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub const ITEM_ID_COLUMN: u32 = 0;
pub const ITEM_NAME_COLUMN: u32 = 1;
pub const ITEM_QUANTITY_COLUMN: u32 = 2;
pub const ITEM_LAST_COLUMN: u32 = ITEM_QUANTITY_COLUMN;
pub const ITEM_COLUMNS: usize = 3;

pub const ITEM_HEADER: [&str; ITEM_COLUMNS] = ["id", "name", "quantity"];

/// Name reported for rows whose name cell is missing.
pub const MISSING_NAME: &str = "Nome não disponível";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RowError {
    Blank,
    InvalidId(String),
    InvalidQuantity(String),
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => f.write_str("row is blank"),
            Self::InvalidId(raw) => write!(f, "id cell `{raw}` is not an integer"),
            Self::InvalidQuantity(raw) => {
                write!(f, "quantity cell `{raw}` is not a 32-bit integer")
            }
        }
    }
}

impl std::error::Error for RowError {}

impl Item {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, quantity: i32) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            quantity,
        }
    }

    /// Cells `[id, name, quantity]`; a missing id is written as an empty cell.
    #[must_use]
    pub fn to_row(&self) -> Row {
        vec![
            self.id.map_or_else(|| Value::String(String::new()), Value::from),
            Value::String(self.name.clone()),
            Value::from(self.quantity),
        ]
    }

    /// Reads an item back from a data-sheet row.
    ///
    /// A missing name cell becomes [`MISSING_NAME`] and a missing or blank
    /// quantity cell becomes `0`. Blank rows (left behind by deletes) and
    /// rows with non-integer id or quantity are reported as errors so the
    /// caller can skip them.
    pub fn from_row(row: &[Cell]) -> Result<Self, RowError> {
        if row_is_blank(row) {
            return Err(RowError::Blank);
        }
        let id_cell = row.first().ok_or(RowError::Blank)?;
        let id = cell_as_i64(id_cell).ok_or_else(|| RowError::InvalidId(cell_to_text(id_cell)))?;
        let name = row
            .get(ITEM_NAME_COLUMN as usize)
            .map_or_else(|| MISSING_NAME.to_string(), cell_to_text);
        let quantity = match row.get(ITEM_QUANTITY_COLUMN as usize) {
            None => 0,
            Some(cell) if cell_is_blank(cell) => 0,
            Some(cell) => cell_as_i64(cell)
                .and_then(|q| i32::try_from(q).ok())
                .ok_or_else(|| RowError::InvalidQuantity(cell_to_text(cell)))?,
        };
        Ok(Self {
            id: Some(id),
            name,
            quantity,
        })
    }
}

impl Display for Item {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(
                f,
                "Item(id={id}, name={}, quantity={})",
                self.name, self.quantity
            ),
            None => write!(
                f,
                "Item(id=null, name={}, quantity={})",
                self.name, self.quantity
            ),
        }
    }
}
