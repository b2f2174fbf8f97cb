use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::message::FileLinks;

pub const MAX_QUALITY_SCORE: u8 = 10;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("quality assessment {0} is outside 0..=10")]
pub struct QualityOutOfRange(pub i64);

/// Writing/email quality on a 0 to 10 scale, 10 being best.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct QualityScore(u8);

impl QualityScore {
    pub fn new(value: i64) -> Result<Self, QualityOutOfRange> {
        u8::try_from(value)
            .ok()
            .filter(|score| *score <= MAX_QUALITY_SCORE)
            .map(Self)
            .ok_or(QualityOutOfRange(value))
    }

    /// Reads the leading integer of values like `8`, `8.5` or `8/10`.
    pub fn parse_lenient(raw: &str) -> Option<Result<Self, QualityOutOfRange>> {
        let digits: String =
            raw.trim().chars().take_while(|ch| ch.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse::<i64>().ok().map(Self::new)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for QualityScore {
    type Error = QualityOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QualityScore> for i64 {
    fn from(value: QualityScore) -> Self {
        i64::from(value.0)
    }
}

impl std::fmt::Display for QualityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured candidate record pulled out of a posting. Every field is optional;
/// the model returns null for anything it cannot find.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: Option<String>,
    pub undergraduate_institution: Option<String>,
    pub graduate_institution: Option<String>,
    pub program_major: Option<String>,
    pub advisor: Option<String>,
    pub current_workplace: Option<String>,
    pub current_project_name: Option<String>,
    pub email: Option<String>,
    pub quality_assessment: Option<QualityScore>,
    pub overall_summary: Option<String>,
}

/// A row of `parsed_messages`: one candidate per source message timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub candidate: Candidate,
    pub channel_id: String,
    pub ts: i64,
}

/// Parsed record joined with its channel name and the source message's file links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TidyRow {
    pub candidate: Candidate,
    pub channel_name: Option<String>,
    pub ts: i64,
    pub files: FileLinks,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TidyOrder {
    #[default]
    Timestamp,
    Channel,
}
