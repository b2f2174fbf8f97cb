use std::path::{Path, PathBuf};

use echolab_core::domain::candidate::Candidate;
use serde::Deserialize;
use thiserror::Error;

use crate::schema::{CandidateRecord, SchemaError};

#[derive(Debug, Error)]
pub enum FewShotError {
    #[error("failed to read few-shot examples `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("few-shot examples are not a JSON array of examples: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("few-shot example {index} is invalid: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: SchemaError,
    },
}

/// Input text paired with the candidate the model should have extracted from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FewShotExample {
    pub text: String,
    pub candidate: Candidate,
}

#[derive(Deserialize)]
struct RawExample {
    text: String,
    #[serde(flatten)]
    record: CandidateRecord,
}

/// Parses a JSON array of objects carrying `text` plus the candidate fields.
/// File order is kept; it is the order the examples appear in the prompt.
pub fn parse_examples(raw: &str) -> Result<Vec<FewShotExample>, FewShotError> {
    let examples: Vec<RawExample> = serde_json::from_str(raw)?;
    examples
        .into_iter()
        .enumerate()
        .map(|(index, example)| {
            let candidate = example
                .record
                .into_candidate()
                .map_err(|source| FewShotError::Invalid { index, source })?;
            Ok(FewShotExample { text: example.text, candidate })
        })
        .collect()
}

pub fn load_examples(path: &Path) -> Result<Vec<FewShotExample>, FewShotError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| FewShotError::Read { path: path.to_path_buf(), source })?;
    parse_examples(&raw)
}
