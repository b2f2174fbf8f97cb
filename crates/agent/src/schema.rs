//! The `Data` function the model is forced to call, and the boundary where
//! its loosely-typed arguments become a [`Candidate`].

use echolab_core::domain::candidate::{Candidate, QualityOutOfRange, QualityScore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::ToolDefinition;

pub const DATA_FUNCTION: &str = "Data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("quality_assessment must be a number or numeric string, got {0}")]
    QualityType(String),
    #[error(transparent)]
    QualityRange(#[from] QualityOutOfRange),
}

/// Candidate exactly as the model (or an example file) writes it. Models are
/// inconsistent about the quality field, so it is kept raw until validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub undergraduate_institution: Option<String>,
    #[serde(default)]
    pub graduate_institution: Option<String>,
    #[serde(default)]
    pub program_major: Option<String>,
    #[serde(default)]
    pub advisor: Option<String>,
    #[serde(default)]
    pub current_workplace: Option<String>,
    #[serde(default)]
    pub current_project_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub quality_assessment: Option<Value>,
    #[serde(default)]
    pub overall_summary: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DataArguments {
    #[serde(default)]
    pub people: Vec<CandidateRecord>,
}

impl CandidateRecord {
    /// Strict conversion: an unusable quality value is an error. Used for
    /// few-shot examples, which are authored by hand.
    pub fn into_candidate(self) -> Result<Candidate, SchemaError> {
        let quality_assessment = match &self.quality_assessment {
            None | Some(Value::Null) => None,
            Some(value) => parse_quality(value)?,
        };
        Ok(self.with_quality(quality_assessment))
    }

    /// Conversion for model output. An out-of-range or ill-typed quality is
    /// cleared and returned alongside the candidate so the rest of the record
    /// is still stored.
    pub fn into_candidate_lossy(self) -> (Candidate, Option<SchemaError>) {
        let (quality_assessment, rejected) = match &self.quality_assessment {
            None | Some(Value::Null) => (None, None),
            Some(value) => match parse_quality(value) {
                Ok(quality) => (quality, None),
                Err(error) => (None, Some(error)),
            },
        };
        (self.with_quality(quality_assessment), rejected)
    }

    fn with_quality(self, quality_assessment: Option<QualityScore>) -> Candidate {
        Candidate {
            name: non_blank(self.name),
            undergraduate_institution: non_blank(self.undergraduate_institution),
            graduate_institution: non_blank(self.graduate_institution),
            program_major: non_blank(self.program_major),
            advisor: non_blank(self.advisor),
            current_workplace: non_blank(self.current_workplace),
            current_project_name: non_blank(self.current_project_name),
            email: non_blank(self.email),
            quality_assessment,
            overall_summary: non_blank(self.overall_summary),
        }
    }
}

/// Integers pass through, floats truncate, and strings like `"8/10"` read their
/// leading integer. A string without digits means the model did not know.
fn parse_quality(value: &Value) -> Result<Option<QualityScore>, SchemaError> {
    match value {
        Value::Number(number) => {
            let raw = number
                .as_i64()
                .or_else(|| number.as_f64().map(|float| float.trunc() as i64))
                .ok_or_else(|| SchemaError::QualityType(number.to_string()))?;
            Ok(Some(QualityScore::new(raw)?))
        }
        Value::String(text) => Ok(QualityScore::parse_lenient(text).transpose()?),
        other => Err(SchemaError::QualityType(other.to_string())),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn nullable_string(description: &str) -> Value {
    json!({ "type": ["string", "null"], "description": description })
}

/// The `Data` tool: `people` is a list of candidates, every field nullable.
pub fn data_tool() -> ToolDefinition {
    let candidate = json!({
        "type": "object",
        "description": "Schema about a candidate.",
        "properties": {
            "name": nullable_string("The name of the candidate"),
            "undergraduate_institution": nullable_string("Undergraduate institution"),
            "graduate_institution": nullable_string("Graduate institution"),
            "program_major": nullable_string("Program or current major of candidate"),
            "advisor": nullable_string("Advisor or supervisor at school or workplace"),
            "current_workplace": nullable_string("Current role and workplace"),
            "current_project_name": nullable_string(
                "Summarize the current research project to a single name"
            ),
            "email": nullable_string("The email of the candidate"),
            "quality_assessment": {
                "type": ["integer", "null"],
                "minimum": 0,
                "maximum": 10,
                "description": "Quality assessment of the candidate based on the email and \
                                writing quality of the text from 0 to 10, 10 being the best."
            },
            "overall_summary": nullable_string("Overall summary of the email text"),
        },
        "required": [
            "name", "undergraduate_institution", "graduate_institution", "program_major",
            "advisor", "current_workplace", "current_project_name", "email",
            "quality_assessment", "overall_summary"
        ]
    });

    ToolDefinition::function(
        DATA_FUNCTION,
        "Extracted data about candidates.",
        json!({
            "type": "object",
            "properties": { "people": { "type": "array", "items": candidate } },
            "required": ["people"]
        }),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{data_tool, CandidateRecord, DataArguments, SchemaError};

    fn record(quality: serde_json::Value) -> CandidateRecord {
        CandidateRecord {
            name: Some("Ada Lovelace".to_owned()),
            quality_assessment: Some(quality),
            ..CandidateRecord::default()
        }
    }

    #[test]
    fn quality_is_read_leniently() {
        let as_int = record(json!(8)).into_candidate().expect("int");
        let as_text = record(json!("7/10")).into_candidate().expect("text");
        let as_float = record(json!(6.5)).into_candidate().expect("float");
        let unknown = record(json!("unknown")).into_candidate().expect("unknown");

        assert_eq!(as_int.quality_assessment.map(|q| q.value()), Some(8));
        assert_eq!(as_text.quality_assessment.map(|q| q.value()), Some(7));
        assert_eq!(as_float.quality_assessment.map(|q| q.value()), Some(6));
        assert_eq!(unknown.quality_assessment, None);
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        assert!(matches!(record(json!(12)).into_candidate(), Err(SchemaError::QualityRange(_))));
        assert!(matches!(
            record(json!([1, 2])).into_candidate(),
            Err(SchemaError::QualityType(_))
        ));
    }

    #[test]
    fn lossy_conversion_clears_unusable_quality_and_keeps_the_rest() {
        let (candidate, rejected) = CandidateRecord {
            email: Some("ada@example.org".to_owned()),
            ..record(json!(85))
        }
        .into_candidate_lossy();

        assert_eq!(candidate.quality_assessment, None);
        assert_eq!(candidate.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(candidate.email.as_deref(), Some("ada@example.org"));
        assert!(matches!(rejected, Some(SchemaError::QualityRange(_))));

        let (from_text, rejected) = record(json!("85/100")).into_candidate_lossy();
        assert_eq!(from_text.quality_assessment, None);
        assert!(rejected.is_some());

        let (typed, rejected) = record(json!({"score": 7})).into_candidate_lossy();
        assert_eq!(typed.quality_assessment, None);
        assert!(matches!(rejected, Some(SchemaError::QualityType(_))));

        let (valid, rejected) = record(json!(7)).into_candidate_lossy();
        assert_eq!(valid.quality_assessment.map(|q| q.value()), Some(7));
        assert_eq!(rejected, None);
    }

    #[test]
    fn blank_strings_become_null() {
        let candidate = CandidateRecord { email: Some("  ".to_owned()), ..record(json!(null)) }
            .into_candidate()
            .expect("candidate");

        assert_eq!(candidate.email, None);
        assert_eq!(candidate.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn arguments_tolerate_missing_fields() {
        let arguments: DataArguments =
            serde_json::from_str(r#"{"people": [{"name": "Grace"}]}"#).expect("arguments");

        assert_eq!(arguments.people.len(), 1);
        assert_eq!(arguments.people[0].advisor, None);
    }

    #[test]
    fn tool_lists_every_candidate_field() {
        let tool = data_tool();
        let properties = &tool.function.parameters["properties"]["people"]["items"]["properties"];

        assert_eq!(tool.function.name, "Data");
        assert_eq!(properties.as_object().map(|fields| fields.len()), Some(10));
    }
}
