use std::path::PathBuf;
use std::sync::Arc;

use echolab_core::domain::message::ChatMessage;
use echolab_core::outcome::{BatchReport, ItemOutcome};
use echolab_core::retrieval::{downloadable_attachments, select_messages, to_stored_message};
use echolab_db::MessageStore;
use echolab_slack::web::ConversationSource;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRetrieval {
    pub channel_id: String,
    pub fetched: usize,
    pub kept: usize,
    pub inserted: u64,
}

#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub channels: BatchReport<ChannelRetrieval>,
    pub downloads: BatchReport<PathBuf>,
}

impl RetrievalReport {
    pub fn inserted(&self) -> u64 {
        self.channels.succeeded.iter().map(|channel| channel.inserted).sum()
    }

    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines = self.channels.failure_lines();
        lines.extend(self.downloads.failure_lines());
        lines
    }
}

pub struct MessageRetriever {
    source: Arc<dyn ConversationSource>,
    store: Arc<dyn MessageStore>,
    allowed_authors: Vec<String>,
    download_dir: Option<PathBuf>,
}

impl MessageRetriever {
    pub fn new(source: Arc<dyn ConversationSource>, store: Arc<dyn MessageStore>) -> Self {
        Self { source, store, allowed_authors: Vec::new(), download_dir: None }
    }

    /// Only keep messages posted by these user ids. Empty keeps everyone.
    pub fn with_allowed_authors(mut self, allowed_authors: Vec<String>) -> Self {
        self.allowed_authors = allowed_authors;
        self
    }

    /// Save PDF attachments under `download_dir` as `<file id>.pdf`.
    pub fn with_downloads(mut self, download_dir: Option<PathBuf>) -> Self {
        self.download_dir = download_dir;
        self
    }

    /// Channels run one after another. A failing channel is reported and the
    /// rows already stored for earlier channels stay.
    pub async fn retrieve_all(&self, channel_ids: &[String]) -> RetrievalReport {
        let mut report = RetrievalReport::default();
        for channel_id in channel_ids {
            let outcome = self.retrieve_channel(channel_id, &mut report.downloads).await;
            report.channels.record(outcome);
        }
        report
    }

    pub async fn retrieve_channel(
        &self,
        channel_id: &str,
        downloads: &mut BatchReport<PathBuf>,
    ) -> ItemOutcome<ChannelRetrieval> {
        let history = match self.source.history(channel_id).await {
            Ok(history) => history,
            Err(error) => {
                warn!(
                    event_name = "retrieval.channel.failed",
                    channel_id,
                    error = %error,
                    "channel history fetch failed; continuing with remaining channels"
                );
                return ItemOutcome::failed(format!("channel {channel_id}"), error);
            }
        };

        let fetched = history.len();
        let allowed = Some(self.allowed_authors.as_slice());
        let selected = select_messages(history, allowed);

        let mut kept_messages = Vec::with_capacity(selected.len());
        let mut rows = Vec::with_capacity(selected.len());
        for message in &selected {
            match to_stored_message(message, channel_id) {
                Some(row) => {
                    kept_messages.push(message);
                    rows.push(row);
                }
                None => {
                    warn!(channel_id, ts = %message.ts, "skipping message with unreadable timestamp");
                }
            }
        }

        // Attachments are only fetched for messages that will be stored.
        if let Some(download_dir) = &self.download_dir {
            for message in kept_messages {
                self.download_attachments(message, download_dir, downloads).await;
            }
        }

        match self.store.append_messages(&rows).await {
            Ok(inserted) => {
                info!(
                    event_name = "retrieval.channel.stored",
                    channel_id,
                    fetched,
                    kept = rows.len(),
                    inserted,
                    "stored channel messages"
                );
                ItemOutcome::Succeeded(ChannelRetrieval {
                    channel_id: channel_id.to_owned(),
                    fetched,
                    kept: rows.len(),
                    inserted,
                })
            }
            Err(error) => {
                warn!(
                    event_name = "retrieval.channel.failed",
                    channel_id,
                    error = %error,
                    "storing channel messages failed"
                );
                ItemOutcome::failed(format!("channel {channel_id}"), error)
            }
        }
    }

    async fn download_attachments(
        &self,
        message: &ChatMessage,
        download_dir: &std::path::Path,
        downloads: &mut BatchReport<PathBuf>,
    ) {
        for attachment in downloadable_attachments(message) {
            let Some(url) = attachment.url_private.as_deref() else {
                continue;
            };
            let destination = download_dir.join(format!("{}.pdf", attachment.id));

            match self.source.download(url, &destination).await {
                Ok(bytes) => {
                    info!(
                        event_name = "retrieval.attachment.downloaded",
                        file_id = %attachment.id,
                        bytes,
                        "downloaded attachment"
                    );
                    downloads.record(ItemOutcome::Succeeded(destination));
                }
                Err(error) => {
                    warn!(
                        event_name = "retrieval.attachment.failed",
                        file_id = %attachment.id,
                        error = %error,
                        "attachment download failed; message is still stored"
                    );
                    downloads.record(ItemOutcome::failed(format!("file {}", attachment.id), error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use echolab_core::domain::message::{Attachment, ChatMessage};
    use echolab_db::{connect_with_settings, MessageStore, SqlMessageStore};
    use echolab_slack::web::{ConversationSource, SlackApiError};
    use sqlx::Row;

    use super::MessageRetriever;

    #[derive(Default)]
    struct FakeSource {
        histories: HashMap<String, Vec<ChatMessage>>,
        failing_downloads: Vec<String>,
        downloaded: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ConversationSource for FakeSource {
        async fn history(&self, channel_id: &str) -> Result<Vec<ChatMessage>, SlackApiError> {
            self.histories
                .get(channel_id)
                .cloned()
                .ok_or_else(|| SlackApiError::Api("channel_not_found".to_owned()))
        }

        async fn download(&self, url: &str, destination: &Path) -> Result<u64, SlackApiError> {
            if self.failing_downloads.iter().any(|failing| failing == url) {
                return Err(SlackApiError::Api("file_not_found".to_owned()));
            }
            self.downloaded.lock().expect("downloads lock").push(destination.to_path_buf());
            Ok(8)
        }
    }

    fn posting(ts: &str, user: &str, files: Vec<Attachment>) -> ChatMessage {
        ChatMessage {
            ts: ts.to_owned(),
            text: format!("posting {ts}"),
            user: Some(user.to_owned()),
            message_type: Some("message".to_owned()),
            client_msg_id: Some(format!("client-{ts}")),
            files,
            ..ChatMessage::default()
        }
    }

    fn attachment(id: &str, filetype: &str) -> Attachment {
        Attachment {
            id: id.to_owned(),
            filetype: Some(filetype.to_owned()),
            url_private: Some(format!("https://files.slack.test/{id}")),
        }
    }

    async fn store() -> Arc<SqlMessageStore> {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let store = SqlMessageStore::new(pool);
        store.initialize().await.expect("schema");
        Arc::new(store)
    }

    async fn message_count(store: &SqlMessageStore) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(store.pool())
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn slack_error_keeps_earlier_channels_and_does_not_raise() {
        let source = FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![posting("1710000000.1", "U1", vec![]), posting("1710000100.1", "U1", vec![])],
            )]),
            ..FakeSource::default()
        };
        let store = store().await;
        let retriever = MessageRetriever::new(Arc::new(source), store.clone());

        let report = retriever.retrieve_all(&["C1".to_owned(), "CX".to_owned()]).await;

        assert_eq!(report.channels.succeeded.len(), 1);
        assert_eq!(report.failure_lines(), vec!["channel CX: Slack API error: channel_not_found"]);
        assert_eq!(message_count(&store).await, 2);
    }

    #[tokio::test]
    async fn six_attachments_store_five_links() {
        let files = (1..=6).map(|index| attachment(&format!("F{index}"), "png")).collect();
        let source = FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![posting("1710000000.1", "U1", files)],
            )]),
            ..FakeSource::default()
        };
        let store = store().await;

        MessageRetriever::new(Arc::new(source), store.clone()).retrieve_all(&["C1".to_owned()]).await;

        let row = sqlx::query("SELECT file_1, file_5 FROM messages")
            .fetch_one(store.pool())
            .await
            .expect("row");
        let first: Option<String> = row.try_get("file_1").expect("file_1");
        let fifth: Option<String> = row.try_get("file_5").expect("file_5");
        assert_eq!(first.as_deref(), Some("https://files.slack.test/F1"));
        assert_eq!(fifth.as_deref(), Some("https://files.slack.test/F5"));
    }

    #[tokio::test]
    async fn allow_list_and_system_messages_are_filtered() {
        let mut joined = posting("1710000200.1", "U1", vec![]);
        joined.subtype = Some("channel_join".to_owned());
        let source = FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![
                    posting("1710000000.1", "U1", vec![]),
                    posting("1710000100.1", "U2", vec![]),
                    joined,
                ],
            )]),
            ..FakeSource::default()
        };
        let store = store().await;

        let report = MessageRetriever::new(Arc::new(source), store.clone())
            .with_allowed_authors(vec!["U1".to_owned()])
            .retrieve_all(&["C1".to_owned()])
            .await;

        assert_eq!(report.channels.succeeded[0].fetched, 3);
        assert_eq!(report.channels.succeeded[0].kept, 1);
        assert_eq!(message_count(&store).await, 1);
    }

    #[tokio::test]
    async fn only_pdfs_are_downloaded_and_failures_do_not_block_storage() {
        let source = Arc::new(FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![posting(
                    "1710000000.1",
                    "U1",
                    vec![attachment("F1", "pdf"), attachment("F2", "png"), attachment("F3", "pdf")],
                )],
            )]),
            failing_downloads: vec!["https://files.slack.test/F3".to_owned()],
            ..FakeSource::default()
        });
        let store = store().await;
        let dir = PathBuf::from("/tmp/echolab-downloads");

        let report = MessageRetriever::new(source.clone(), store.clone())
            .with_downloads(Some(dir.clone()))
            .retrieve_all(&["C1".to_owned()])
            .await;

        assert_eq!(*source.downloaded.lock().expect("downloads lock"), vec![dir.join("F1.pdf")]);
        assert_eq!(report.downloads.succeeded, vec![dir.join("F1.pdf")]);
        assert_eq!(report.downloads.failed.len(), 1);
        assert_eq!(report.channels.succeeded[0].inserted, 1);
        assert_eq!(message_count(&store).await, 1);
    }

    #[tokio::test]
    async fn rerunning_a_channel_inserts_nothing_new() {
        let source = FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![posting("1710000000.1", "U1", vec![])],
            )]),
            ..FakeSource::default()
        };
        let store = store().await;
        let retriever = MessageRetriever::new(Arc::new(source), store.clone());

        let first = retriever.retrieve_all(&["C1".to_owned()]).await;
        let second = retriever.retrieve_all(&["C1".to_owned()]).await;

        assert_eq!(first.inserted(), 1);
        assert_eq!(second.inserted(), 0);
        assert_eq!(message_count(&store).await, 1);
    }

    #[tokio::test]
    async fn unreadable_timestamp_skips_its_attachments() {
        let source = Arc::new(FakeSource {
            histories: HashMap::from([(
                "C1".to_owned(),
                vec![
                    posting("not-a-timestamp", "U1", vec![attachment("F1", "pdf")]),
                    posting("1710000000.1", "U1", vec![attachment("F2", "pdf")]),
                ],
            )]),
            ..FakeSource::default()
        });
        let store = store().await;
        let dir = PathBuf::from("/tmp/echolab-downloads");

        let report = MessageRetriever::new(source.clone(), store.clone())
            .with_downloads(Some(dir.clone()))
            .retrieve_all(&["C1".to_owned()])
            .await;

        assert_eq!(*source.downloaded.lock().expect("downloads lock"), vec![dir.join("F2.pdf")]);
        assert_eq!(report.downloads.succeeded, vec![dir.join("F2.pdf")]);
        assert_eq!(report.channels.succeeded[0].kept, 1);
        assert_eq!(message_count(&store).await, 1);
    }
}
