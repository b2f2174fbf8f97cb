//! Shapes the tidy view into the table that replaces the spreadsheet contents.

use chrono::{DateTime, NaiveDate};

use crate::domain::candidate::TidyRow;
use crate::domain::message::MAX_FILE_LINKS;

pub const TIDY_COLUMNS: &[&str] = &[
    "name",
    "undergraduate_institution",
    "graduate_institution",
    "program_major",
    "advisor",
    "current_workplace",
    "current_project_name",
    "email",
    "quality_assessment",
    "overall_summary",
    "channel_name",
    "ts",
    "file_1",
    "file_2",
    "file_3",
    "file_4",
    "file_5",
    "processing_date",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PublishedTable {
    /// Header first, then data rows; the shape a worksheet write expects.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone()).chain(self.rows.iter().cloned()).collect()
    }
}

/// UTC calendar date of an epoch-seconds timestamp.
pub fn epoch_to_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|datetime| datetime.date_naive())
}

pub fn build_published_table(rows: &[TidyRow], processing_date: NaiveDate) -> PublishedTable {
    let header = TIDY_COLUMNS.iter().map(|column| (*column).to_owned()).collect();
    let processing_date = processing_date.format("%Y-%m-%d").to_string();

    let rows = rows
        .iter()
        .map(|row| {
            let candidate = &row.candidate;
            let mut cells = vec![
                cell(&candidate.name),
                cell(&candidate.undergraduate_institution),
                cell(&candidate.graduate_institution),
                cell(&candidate.program_major),
                cell(&candidate.advisor),
                cell(&candidate.current_workplace),
                cell(&candidate.current_project_name),
                cell(&candidate.email),
                candidate.quality_assessment.map(|score| score.to_string()).unwrap_or_default(),
                cell(&candidate.overall_summary),
                cell(&row.channel_name),
                epoch_to_date(row.ts)
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| row.ts.to_string()),
            ];
            cells.extend((0..MAX_FILE_LINKS).map(|index| {
                row.files.get(index).map(str::to_owned).unwrap_or_default()
            }));
            cells.push(processing_date.clone());
            cells
        })
        .collect();

    PublishedTable { header, rows }
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
