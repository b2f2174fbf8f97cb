//! Upload backlog arithmetic for the status reporter.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::upload::{CatalogueEntry, UploadFingerprint, YearStatus};

const STATION_TOKEN: usize = 3;
const YEAR_TOKEN: usize = 4;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("filename `{0}` has fewer than five `_`-separated tokens")]
    MissingTokens(String),
    #[error("filename `{name}` carries an invalid year `{year}`")]
    InvalidYear { name: String, year: String },
}

/// Derives the fingerprint for names like `AAA_BBB_CCC_720340_2019.csv`.
pub fn fingerprint_from_filename(name: &str) -> Result<UploadFingerprint, FingerprintError> {
    let tokens: Vec<&str> = name.split('_').collect();
    let (Some(station), Some(year_token)) = (tokens.get(STATION_TOKEN), tokens.get(YEAR_TOKEN))
    else {
        return Err(FingerprintError::MissingTokens(name.to_owned()));
    };

    let year_text = year_token.split('.').next().unwrap_or_default();
    let year = year_text
        .parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .ok_or_else(|| FingerprintError::InvalidYear {
            name: name.to_owned(),
            year: year_text.to_owned(),
        })?;

    Ok(UploadFingerprint(format!("{station}{}", year.format("%Y-%m-%d"))))
}

/// Fingerprints for every parseable name, plus the errors for the rest.
pub fn collect_fingerprints<I, S>(names: I) -> (BTreeSet<UploadFingerprint>, Vec<FingerprintError>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut fingerprints = BTreeSet::new();
    let mut rejected = Vec::new();
    for name in names {
        match fingerprint_from_filename(name.as_ref()) {
            Ok(fingerprint) => {
                fingerprints.insert(fingerprint);
            }
            Err(error) => rejected.push(error),
        }
    }
    (fingerprints, rejected)
}

pub fn estimate_hours(file_count: i64, files_per_hour: f64) -> f64 {
    file_count as f64 / files_per_hour
}

/// Groups pending catalogue rows by year, oldest year first.
pub fn summarize_by_year(entries: &[CatalogueEntry], files_per_hour: f64) -> Vec<YearStatus> {
    let mut per_year: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for entry in entries {
        *per_year.entry(entry.year_query).or_default() += 1;
    }

    per_year
        .into_iter()
        .map(|(year_query, station_count)| YearStatus {
            year_query,
            station_count,
            estimate_time_hr: estimate_hours(station_count, files_per_hour),
        })
        .collect()
}
