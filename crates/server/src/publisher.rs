use std::sync::Arc;

use chrono::NaiveDate;
use echolab_core::domain::candidate::{ParsedMessage, TidyOrder};
use echolab_core::tidy::build_published_table;
use echolab_db::{MessageStore, RepositoryError};
use thiserror::Error;
use tracing::info;

use crate::sheets::{SheetsError, SpreadsheetSink};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Sheets(#[from] SheetsError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishSummary {
    pub parsed_inserted: u64,
    pub rows_published: usize,
}

pub struct Publisher {
    store: Arc<dyn MessageStore>,
    sink: Arc<dyn SpreadsheetSink>,
    spreadsheet_name: String,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        sink: Arc<dyn SpreadsheetSink>,
        spreadsheet_name: impl Into<String>,
    ) -> Self {
        Self { store, sink, spreadsheet_name: spreadsheet_name.into() }
    }

    /// Stores the new parsed rows, then replaces the spreadsheet with the whole
    /// tidy view stamped with `processing_date`.
    pub async fn publish(
        &self,
        parsed: &[ParsedMessage],
        processing_date: NaiveDate,
    ) -> Result<PublishSummary, PublishError> {
        let parsed_inserted = self.store.append_parsed(parsed).await?;
        let tidy = self.store.tidy_view(TidyOrder::Timestamp).await?;
        let table = build_published_table(&tidy, processing_date);

        let rows_published = table.rows.len();
        self.sink.overwrite_first_worksheet(&self.spreadsheet_name, &table.to_values()).await?;

        info!(
            event_name = "publish.completed",
            spreadsheet = %self.spreadsheet_name,
            parsed_inserted,
            rows_published,
            "published tidy view"
        );
        Ok(PublishSummary { parsed_inserted, rows_published })
    }
}
