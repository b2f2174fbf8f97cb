use std::sync::Arc;

use chrono::NaiveDate;
use echolab_core::domain::upload::YearStatus;
use echolab_core::upload_status::{collect_fingerprints, summarize_by_year};
use echolab_db::{CatalogWarehouse, WarehouseError};
use echolab_slack::commands::StatusMode;
use thiserror::Error;
use tracing::{info, warn};

use crate::dropbox::{DropboxError, FolderListing};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Listing(#[from] DropboxError),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

pub struct StatusReporter {
    listing: Arc<dyn FolderListing>,
    warehouse: Arc<dyn CatalogWarehouse>,
    folder: String,
    year_cutoff: NaiveDate,
    files_per_hour: f64,
}

impl StatusReporter {
    pub fn new(
        listing: Arc<dyn FolderListing>,
        warehouse: Arc<dyn CatalogWarehouse>,
        folder: impl Into<String>,
        year_cutoff: NaiveDate,
        files_per_hour: f64,
    ) -> Self {
        Self { listing, warehouse, folder: folder.into(), year_cutoff, files_per_hour }
    }

    pub async fn report(&self, mode: StatusMode) -> Result<Vec<YearStatus>, StatusError> {
        match mode {
            StatusMode::Live => self.live().await,
            StatusMode::Log => Ok(self.warehouse.status_log().await?),
        }
    }

    /// Compares the remote folder against the catalogue and counts what is
    /// still missing per year.
    pub async fn live(&self) -> Result<Vec<YearStatus>, StatusError> {
        let names = self.listing.list_names(&self.folder).await?;
        let (uploaded, rejected) = collect_fingerprints(&names);
        for error in &rejected {
            warn!(event_name = "status.listing.skipped_file", error = %error, "skipping file");
        }

        let pending = self.warehouse.pending_catalogue(&uploaded, self.year_cutoff).await?;
        let rows = summarize_by_year(&pending, self.files_per_hour);
        info!(
            event_name = "status.live.computed",
            listed = names.len(),
            uploaded = uploaded.len(),
            pending = pending.len(),
            years = rows.len(),
            "computed upload status"
        );
        Ok(rows)
    }
}
