// SPDX-License-Identifier: Apache-2.0

use crate::clock::Clock;
use bijux_sheets_model::{
    cell_as_i64, Item, LogAction, LogEntry, RangeError, RowError, SheetRange, ITEM_ID_COLUMN,
    ITEM_LAST_COLUMN,
};
use bijux_sheets_store::{SheetsBackend, StoreError};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_DATA_SHEET: &str = "DB";
pub const DEFAULT_LOG_SHEET: &str = "Logs";

const HEADER_ROWS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetNames {
    pub data: String,
    pub log: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            data: DEFAULT_DATA_SHEET.to_string(),
            log: DEFAULT_LOG_SHEET.to_string(),
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum ItemStoreError {
    Store(StoreError),
    NotFound(i64),
    MissingId,
}

impl Display for ItemStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "Item não encontrado com o ID: {id}"),
            Self::MissingId => f.write_str("ID do item é obrigatório."),
        }
    }
}

impl std::error::Error for ItemStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::NotFound(_) | Self::MissingId => None,
        }
    }
}

impl From<StoreError> for ItemStoreError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RangeError> for ItemStoreError {
    fn from(value: RangeError) -> Self {
        Self::Store(StoreError::from(value))
    }
}

/// Item CRUD over the data sheet, with one log-sheet row per mutation.
///
/// Row positions are never cached: update and delete scan column `A` on every
/// call, so two concurrent writers may race between the scan and the write.
pub struct ItemStore {
    backend: Arc<dyn SheetsBackend>,
    sheets: SheetNames,
    clock: Arc<dyn Clock>,
}

impl ItemStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SheetsBackend>, sheets: SheetNames, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            sheets,
            clock,
        }
    }

    #[must_use]
    pub fn backend_tag(&self) -> &'static str {
        self.backend.backend_tag()
    }

    #[must_use]
    pub fn sheets(&self) -> &SheetNames {
        &self.sheets
    }

    /// Appends the item after the last row; duplicate ids are not checked.
    #[instrument(skip(self, item))]
    pub async fn create(&self, item: &Item) -> Result<(), ItemStoreError> {
        require_ids(std::slice::from_ref(item))?;
        self.backend
            .append_rows(&self.sheets.data, vec![item.to_row()])
            .await?;
        info!(item = %item, "item created");
        self.log_action(LogAction::Create, &format!("Item criado: {item}"))
            .await
    }

    /// Items in sheet order. Blank rows are skipped silently; rows whose id or
    /// quantity is not an integer are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn read_all(&self) -> Result<Vec<Item>, ItemStoreError> {
        let rows = self
            .backend
            .get_values(&SheetRange::sheet(&self.sheets.data)?)
            .await?;
        let mut items = Vec::with_capacity(rows.len().saturating_sub(HEADER_ROWS));
        for (index, row) in rows.iter().enumerate().skip(HEADER_ROWS) {
            match Item::from_row(row) {
                Ok(item) => items.push(item),
                Err(RowError::Blank) => {}
                Err(err) => warn!(row = index + 1, error = %err, "skipping malformed item row"),
            }
        }
        Ok(items)
    }

    /// Overwrites the row holding `id`. The stored id is the body's, or `id`
    /// when the body carries none.
    #[instrument(skip(self, item))]
    pub async fn update(&self, id: i64, item: &Item) -> Result<(), ItemStoreError> {
        let row = self
            .find_row_by_id(id)
            .await?
            .ok_or(ItemStoreError::NotFound(id))?;
        let stored = Item {
            id: item.id.or(Some(id)),
            ..item.clone()
        };
        let range = SheetRange::row(&self.sheets.data, ITEM_ID_COLUMN, ITEM_LAST_COLUMN, row)?;
        self.backend
            .update_values(&range, vec![stored.to_row()])
            .await?;
        info!(id, row, item = %stored, "item updated");
        self.log_action(LogAction::Update, &format!("Item atualizado: {stored}"))
            .await
    }

    /// Blanks the row holding `id`; later rows keep their positions.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ItemStoreError> {
        let row = self
            .find_row_by_id(id)
            .await?
            .ok_or(ItemStoreError::NotFound(id))?;
        let range = SheetRange::row(&self.sheets.data, ITEM_ID_COLUMN, ITEM_LAST_COLUMN, row)?;
        self.backend.clear_values(&range).await?;
        info!(id, row, "item deleted");
        self.log_action(LogAction::Delete, &format!("Item deletado com ID: {id}"))
            .await
    }

    /// Appends all items in one call and logs a single summary entry.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn create_batch(&self, items: &[Item]) -> Result<usize, ItemStoreError> {
        if items.is_empty() {
            return Ok(0);
        }
        require_ids(items)?;
        let rows = items.iter().map(Item::to_row).collect();
        self.backend.append_rows(&self.sheets.data, rows).await?;
        info!(count = items.len(), "item batch created");
        self.log_action(
            LogAction::CreateBatch,
            &format!("{} itens criados.", items.len()),
        )
        .await?;
        Ok(items.len())
    }

    /// 1-based sheet row of the first data row whose id cell equals `id`.
    pub async fn find_row_by_id(&self, id: i64) -> Result<Option<u32>, ItemStoreError> {
        let ids = self
            .backend
            .get_values(&SheetRange::columns(
                &self.sheets.data,
                ITEM_ID_COLUMN,
                ITEM_ID_COLUMN,
            )?)
            .await?;
        let found = ids
            .iter()
            .enumerate()
            .skip(HEADER_ROWS)
            .find(|(_, row)| row.first().and_then(cell_as_i64) == Some(id))
            .map(|(index, _)| index + 1);
        match found {
            None => Ok(None),
            Some(row) => u32::try_from(row).map(Some).map_err(|_| {
                ItemStoreError::Store(StoreError::InvalidRange(format!(
                    "row {row} is beyond the addressable sheet"
                )))
            }),
        }
    }

    /// Appends `[timestamp, action, details]` to the log sheet.
    pub async fn log_action(&self, action: LogAction, details: &str) -> Result<(), ItemStoreError> {
        let entry = LogEntry::new(self.clock.now(), action, details);
        self.backend
            .append_rows(&self.sheets.log, vec![entry.to_row()])
            .await?;
        info!(
            target: "sheets_audit",
            action = action.as_str(),
            timestamp = %entry.timestamp,
            details = %entry.details,
            "action logged"
        );
        Ok(())
    }
}

/// Rows without an id can be neither read back nor addressed.
fn require_ids(items: &[Item]) -> Result<(), ItemStoreError> {
    if items.iter().any(|item| item.id.is_none()) {
        return Err(ItemStoreError::MissingId);
    }
    Ok(())
}
