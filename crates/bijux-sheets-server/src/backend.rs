use crate::config::{BackendMode, ConfigError, ServerConfig};
use bijux_sheets_model::{ITEM_HEADER, LOG_HEADER};
use bijux_sheets_store::{
    AccessTokenSource, GoogleSheetsBackend, MemorySheetsBackend, ServiceAccountKey,
    ServiceAccountTokenSource, SheetsBackend, StaticTokenSource,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

fn header_row(cells: &[&str]) -> Vec<Value> {
    cells.iter().map(|c| Value::String((*c).to_string())).collect()
}

/// Builds the backend selected by `config.backend`.
///
/// The memory backend starts with both sheets holding only their header rows.
pub fn open_backend(config: &ServerConfig) -> Result<Arc<dyn SheetsBackend>, ConfigError> {
    let sheets = &config.sheets;
    match config.backend {
        BackendMode::Memory => {
            info!(
                data_sheet = %sheets.sheets.data,
                log_sheet = %sheets.sheets.log,
                "using in-memory spreadsheet"
            );
            Ok(Arc::new(
                MemorySheetsBackend::new()
                    .with_sheet(&sheets.sheets.data, vec![header_row(&ITEM_HEADER)])
                    .with_sheet(&sheets.sheets.log, vec![header_row(&LOG_HEADER)]),
            ))
        }
        BackendMode::Google => {
            let spreadsheet_id = sheets
                .spreadsheet_id
                .clone()
                .ok_or(ConfigError::Missing("SHEETS_SPREADSHEET_ID"))?;
            let tokens = token_source(config);
            if tokens.is_none() {
                warn!("no sheets credentials configured; requests are sent unauthenticated");
            }
            info!(
                spreadsheet_id = %spreadsheet_id,
                base_url = %sheets.api_base_url,
                "using google sheets backend"
            );
            Ok(Arc::new(
                GoogleSheetsBackend::new(spreadsheet_id, tokens, sheets.retry.clone())
                    .with_base_url(&sheets.api_base_url)
                    .with_timeout(sheets.http_timeout),
            ))
        }
    }
}

/// A service account wins over a static bearer token when both are set.
fn token_source(config: &ServerConfig) -> Option<Arc<dyn AccessTokenSource>> {
    let sheets = &config.sheets;
    if let (Some(email), Some(key)) = (&sheets.client_email, &sheets.private_key) {
        let key = ServiceAccountKey::new(email.clone(), key.expose())
            .with_token_uri(sheets.token_uri.clone());
        return Some(Arc::new(ServiceAccountTokenSource::new(key)));
    }
    sheets
        .bearer
        .as_ref()
        .map(|token| Arc::new(StaticTokenSource::new(token.expose())) as Arc<dyn AccessTokenSource>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bijux_sheets_model::SheetRange;

    #[tokio::test]
    async fn memory_backend_is_seeded_with_headers() {
        let config = ServerConfig {
            backend: BackendMode::Memory,
            ..ServerConfig::default()
        };
        let backend = open_backend(&config).expect("backend");
        assert_eq!(backend.backend_tag(), "memory");

        let db = backend
            .get_values(&SheetRange::sheet("DB").expect("range"))
            .await
            .expect("db sheet");
        assert_eq!(db, vec![header_row(&ITEM_HEADER)]);
        let logs = backend
            .get_values(&SheetRange::sheet("Logs").expect("range"))
            .await
            .expect("logs sheet");
        assert_eq!(logs, vec![header_row(&LOG_HEADER)]);
    }

    #[test]
    fn google_backend_without_id_is_rejected() {
        let config = ServerConfig::default();
        assert_eq!(
            open_backend(&config).err(),
            Some(ConfigError::Missing("SHEETS_SPREADSHEET_ID"))
        );
    }

    #[test]
    fn bearer_token_is_used_without_service_account() {
        let mut config = ServerConfig::default();
        config.sheets.bearer = Some(crate::config::Secret::new("tok"));
        assert!(token_source(&config).is_some());
        config.sheets.bearer = None;
        assert!(token_source(&config).is_none());
    }
}
