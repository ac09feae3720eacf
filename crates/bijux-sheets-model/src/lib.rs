#![forbid(unsafe_code)]
//! Row model for the spreadsheet-backed item store.
//!
//! Items live one per row in the data sheet (`A` = id, `B` = name,
//! `C` = quantity) below a single header row. Every mutation also appends a
//! [`LogEntry`] row to the log sheet.

mod cell;
mod item;
mod log;
mod range;

pub use cell::{cell_as_i64, cell_is_blank, cell_to_text, row_is_blank, Cell, Row};
pub use item::{
    Item, RowError, ITEM_COLUMNS, ITEM_HEADER, ITEM_ID_COLUMN, ITEM_LAST_COLUMN,
    ITEM_NAME_COLUMN, ITEM_QUANTITY_COLUMN, MISSING_NAME,
};
pub use log::{LogAction, LogEntry, LOG_HEADER, LOG_TIMESTAMP_FORMAT};
pub use range::{column_index, column_letters, RangeError, RangeSpan, SheetRange};

pub const CRATE_NAME: &str = "bijux-sheets-model";
