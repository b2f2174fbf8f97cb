use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Station code followed by the `YYYY-01-01` year stamp, e.g. `7203402019-01-01`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UploadFingerprint(pub String);

impl UploadFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One station/year row of the warehouse catalogue that still awaits upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub year_query: NaiveDate,
    pub station_id: String,
}

/// Per-year backlog line as rendered in the status table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearStatus {
    pub year_query: NaiveDate,
    pub station_count: i64,
    pub estimate_time_hr: f64,
}
