use std::sync::Arc;

use chrono::Utc;
use echolab_agent::CandidateExtractor;
use echolab_core::domain::candidate::ParsedMessage;
use echolab_core::outcome::BatchReport;
use echolab_db::{MessageStore, RepositoryError};
use echolab_slack::blocks::{self, MessageTemplate};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::publisher::{PublishError, PublishSummary, Publisher};
use crate::retriever::{MessageRetriever, RetrievalReport};

pub const RELOAD_SUCCESS_TEXT: &str = "Database reloaded successfully! 🚀";

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("reading unparsed messages failed: {0}")]
    Unparsed(#[source] RepositoryError),
    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug)]
pub struct ReloadReport {
    pub run_id: Uuid,
    pub retrieval: RetrievalReport,
    pub extraction: BatchReport<ParsedMessage>,
    pub publish: PublishSummary,
}

impl ReloadReport {
    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines = self.retrieval.failure_lines();
        lines.extend(self.extraction.failure_lines());
        lines
    }
}

/// Retrieve, extract, publish. Per-item failures in the first two steps are
/// collected into the report; a failure to read the store or publish aborts.
pub struct ReloadPipeline {
    retriever: MessageRetriever,
    store: Arc<dyn MessageStore>,
    extractor: CandidateExtractor,
    publisher: Publisher,
    channel_ids: Vec<String>,
}

impl ReloadPipeline {
    pub fn new(
        retriever: MessageRetriever,
        store: Arc<dyn MessageStore>,
        extractor: CandidateExtractor,
        publisher: Publisher,
        channel_ids: Vec<String>,
    ) -> Self {
        Self { retriever, store, extractor, publisher, channel_ids }
    }

    pub async fn run(&self) -> Result<ReloadReport, ReloadError> {
        let run_id = Uuid::new_v4();
        info!(
            event_name = "reload.started",
            correlation_id = %run_id,
            channels = self.channel_ids.len(),
            "reload started"
        );

        let retrieval = self.retriever.retrieve_all(&self.channel_ids).await;

        let unparsed = self.store.unparsed_messages().await.map_err(ReloadError::Unparsed)?;
        let extraction = self.extractor.parse_unparsed(&unparsed).await;

        let publish =
            self.publisher.publish(&extraction.succeeded, Utc::now().date_naive()).await?;

        info!(
            event_name = "reload.completed",
            correlation_id = %run_id,
            inserted_messages = retrieval.inserted(),
            unparsed = unparsed.len(),
            parsed = extraction.succeeded.len(),
            extraction_failures = extraction.failed.len(),
            rows_published = publish.rows_published,
            "reload completed"
        );
        Ok(ReloadReport { run_id, retrieval, extraction, publish })
    }
}

pub fn reload_message(report: &ReloadReport) -> MessageTemplate {
    let failures = report.failure_lines();
    if failures.is_empty() {
        return blocks::text_message(RELOAD_SUCCESS_TEXT);
    }

    let details: Vec<String> = failures.iter().map(|line| format!("• {line}")).collect();
    blocks::text_message(&format!(
        "{RELOAD_SUCCESS_TEXT}\n{} item(s) failed and will be retried next run:\n{}",
        failures.len(),
        details.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use echolab_agent::llm::{AssistantReply, ChatRequest, ChatTurn, LlmClient, LlmError, ToolCall};
    use echolab_agent::CandidateExtractor;
    use echolab_core::domain::candidate::{Candidate, TidyOrder};
    use echolab_core::domain::message::{Attachment, ChatMessage};
    use echolab_db::{connect_with_settings, MessageStore, SqlMessageStore};
    use echolab_slack::web::{ConversationSource, SlackApiError};

    use super::{reload_message, ReloadPipeline, RELOAD_SUCCESS_TEXT};
    use crate::publisher::Publisher;
    use crate::retriever::MessageRetriever;
    use crate::sheets::{SheetsError, SpreadsheetSink};

    struct History(HashMap<String, Vec<ChatMessage>>);

    #[async_trait]
    impl ConversationSource for History {
        async fn history(&self, channel_id: &str) -> Result<Vec<ChatMessage>, SlackApiError> {
            self.0
                .get(channel_id)
                .cloned()
                .ok_or_else(|| SlackApiError::Api("channel_not_found".to_owned()))
        }

        async fn download(&self, _url: &str, _destination: &Path) -> Result<u64, SlackApiError> {
            Ok(0)
        }
    }

    /// Answers with a candidate named after the last user turn, or fails when
    /// the text mentions "garbled".
    struct EchoModel {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl LlmClient for EchoModel {
        async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply, LlmError> {
            *self.calls.lock().expect("calls lock") += 1;
            let Some(ChatTurn::User { content }) = request.messages.last() else {
                return Err(LlmError::EmptyResponse);
            };
            if content.contains("garbled") {
                return Err(LlmError::Decode("unreadable model output".to_owned()));
            }
            let arguments = serde_json::json!({ "people": [{ "name": content }] }).to_string();
            Ok(AssistantReply {
                content: None,
                tool_calls: vec![ToolCall::function("call_1", "Data", arguments)],
            })
        }
    }

    #[derive(Default)]
    struct CountingSink {
        rows: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SpreadsheetSink for CountingSink {
        async fn overwrite_first_worksheet(
            &self,
            _spreadsheet_name: &str,
            values: &[Vec<String>],
        ) -> Result<usize, SheetsError> {
            self.rows.lock().expect("rows lock").push(values.len() - 1);
            Ok(values.len())
        }
    }

    fn posting(ts: &str, text: &str) -> ChatMessage {
        ChatMessage {
            ts: ts.to_owned(),
            text: text.to_owned(),
            user: Some("U1".to_owned()),
            client_msg_id: Some(format!("client-{ts}")),
            ..ChatMessage::default()
        }
    }

    #[tokio::test]
    async fn reload_parses_each_message_once_and_retries_failures() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let store = Arc::new(SqlMessageStore::new(pool));
        store.initialize().await.expect("schema");

        let source = Arc::new(History(HashMap::from([(
            "C1".to_owned(),
            vec![posting("1710000000.1", "Ada Lovelace"), posting("1710000100.1", "garbled")],
        )])));
        let model = Arc::new(EchoModel { calls: Mutex::new(0) });
        let sink = Arc::new(CountingSink::default());
        let pipeline = ReloadPipeline::new(
            MessageRetriever::new(source, store.clone()),
            store.clone(),
            CandidateExtractor::new(model.clone(), Vec::new()),
            Publisher::new(store.clone(), sink.clone(), "test_candidates"),
            vec!["C1".to_owned(), "CX".to_owned()],
        );

        let first = pipeline.run().await.expect("first run");
        let second = pipeline.run().await.expect("second run");

        assert_eq!(first.extraction.succeeded.len(), 1);
        assert_eq!(first.failure_lines().len(), 2, "missing channel plus garbled message");
        assert_eq!(second.extraction.succeeded.len(), 0);
        assert_eq!(second.extraction.failed.len(), 1, "failed message is retried");
        assert_eq!(*model.calls.lock().expect("calls lock"), 3);
        assert_eq!(*sink.rows.lock().expect("rows lock"), vec![1, 1]);

        let text = reload_message(&first).fallback_text;
        assert!(text.starts_with(RELOAD_SUCCESS_TEXT));
        assert!(text.contains("channel CX"));
        assert!(text.contains("ts=1710000100"));
    }

    #[tokio::test]
    async fn attachment_only_posting_reaches_the_tidy_view() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let store = Arc::new(SqlMessageStore::new(pool));
        store.initialize().await.expect("schema");

        let mut resume_only = posting("1710000000.1", "");
        resume_only.files = vec![Attachment {
            id: "F1".to_owned(),
            filetype: Some("pdf".to_owned()),
            url_private: Some("https://files.slack.test/F1".to_owned()),
        }];
        let source = Arc::new(History(HashMap::from([("C1".to_owned(), vec![resume_only])])));
        let model = Arc::new(EchoModel { calls: Mutex::new(0) });
        let sink = Arc::new(CountingSink::default());
        let pipeline = ReloadPipeline::new(
            MessageRetriever::new(source, store.clone()),
            store.clone(),
            CandidateExtractor::new(model.clone(), Vec::new()),
            Publisher::new(store.clone(), sink.clone(), "test_candidates"),
            vec!["C1".to_owned()],
        );

        let report = pipeline.run().await.expect("run");

        assert_eq!(report.extraction.succeeded.len(), 1);
        assert_eq!(*model.calls.lock().expect("calls lock"), 0);
        assert_eq!(*sink.rows.lock().expect("rows lock"), vec![1]);

        let tidy = store.tidy_view(TidyOrder::Timestamp).await.expect("tidy view");
        assert_eq!(tidy.len(), 1);
        assert_eq!(tidy[0].ts, 1_710_000_000);
        assert_eq!(tidy[0].candidate, Candidate::default());
        assert_eq!(tidy[0].files.get(0), Some("https://files.slack.test/F1"));
    }
}
