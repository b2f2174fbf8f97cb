use std::sync::Arc;

use echolab_core::domain::candidate::{Candidate, ParsedMessage};
use echolab_core::domain::message::UnparsedMessage;
use echolab_core::outcome::{BatchReport, ItemOutcome};
use thiserror::Error;
use tracing::{info, warn};

use crate::few_shot::FewShotExample;
use crate::llm::{LlmClient, LlmError};
use crate::prompt::extraction_request;
use crate::schema::{DataArguments, DATA_FUNCTION};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("model did not call the `Data` function")]
    MissingToolCall,
    #[error("model called unexpected function `{0}`")]
    UnexpectedFunction(String),
    #[error("model arguments are not valid `Data` JSON: {0}")]
    InvalidArguments(#[from] serde_json::Error),
    #[error("model found no candidate in the text")]
    NoCandidates,
}

/// Sends `text` with the few-shot prompt and returns the first candidate the
/// model reported. A quality value the model got wrong is dropped, not fatal.
pub async fn extract_candidate(
    client: &dyn LlmClient,
    text: &str,
    examples: &[FewShotExample],
) -> Result<Candidate, ExtractionError> {
    let reply = client.complete(&extraction_request(text, examples)).await?;

    let call = reply.tool_calls.into_iter().next().ok_or(ExtractionError::MissingToolCall)?;
    if call.function.name != DATA_FUNCTION {
        return Err(ExtractionError::UnexpectedFunction(call.function.name));
    }

    let arguments: DataArguments = serde_json::from_str(&call.function.arguments)?;
    let first = arguments.people.into_iter().next().ok_or(ExtractionError::NoCandidates)?;
    let (candidate, rejected) = first.into_candidate_lossy();
    if let Some(reason) = rejected {
        warn!(
            event_name = "extraction.quality.discarded",
            reason = %reason,
            "model quality assessment unusable; stored as null"
        );
    }
    Ok(candidate)
}

pub struct CandidateExtractor {
    client: Arc<dyn LlmClient>,
    examples: Vec<FewShotExample>,
}

impl CandidateExtractor {
    pub fn new(client: Arc<dyn LlmClient>, examples: Vec<FewShotExample>) -> Self {
        Self { client, examples }
    }

    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    pub async fn extract(&self, text: &str) -> Result<Candidate, ExtractionError> {
        extract_candidate(self.client.as_ref(), text, &self.examples).await
    }

    /// Extracts one candidate per message, in order. Messages without text
    /// (attachment-only posts) get an all-null candidate without a model call
    /// so their file links are still published. Failures are reported and
    /// leave the message unparsed so the next run retries it.
    pub async fn parse_unparsed(&self, messages: &[UnparsedMessage]) -> BatchReport<ParsedMessage> {
        let mut report = BatchReport::new();

        for message in messages {
            let item = format!("ts={}", message.ts);
            let extracted = if message.text.trim().is_empty() {
                info!(
                    event_name = "extraction.message.blank",
                    channel_id = %message.channel_id,
                    ts = message.ts,
                    "message has no text; storing an empty candidate"
                );
                Ok(Candidate::default())
            } else {
                self.extract(&message.text).await
            };

            match extracted {
                Ok(candidate) => {
                    info!(
                        event_name = "extraction.message.parsed",
                        channel_id = %message.channel_id,
                        ts = message.ts,
                        "extracted candidate"
                    );
                    report.record(ItemOutcome::Succeeded(ParsedMessage {
                        candidate,
                        channel_id: message.channel_id.clone(),
                        ts: message.ts,
                    }));
                }
                Err(error) => {
                    warn!(
                        event_name = "extraction.message.failed",
                        channel_id = %message.channel_id,
                        ts = message.ts,
                        error = %error,
                        "candidate extraction failed; message stays unparsed"
                    );
                    report.record(ItemOutcome::failed(item, error));
                }
            }
        }

        report
    }
}
