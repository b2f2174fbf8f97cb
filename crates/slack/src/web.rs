//! Minimal Slack Web API client: the handful of methods the bots call.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use echolab_core::domain::message::ChatMessage;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::blocks::MessageTemplate;

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";
const HISTORY_PAGE_SIZE: u32 = 200;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("Slack API error: {0}")]
    Api(String),
    #[error("Slack HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to write download `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Channel history and file access, the read side used by message retrieval.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    async fn history(&self, channel_id: &str) -> Result<Vec<ChatMessage>, SlackApiError>;

    /// Downloads an authenticated file URL to `destination`, returning the byte count.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, SlackApiError>;
}

/// Posts bot replies into a channel.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl ApiEnvelope {
    fn into_result(self) -> Result<(), SlackApiError> {
        if self.ok {
            Ok(())
        } else {
            Err(SlackApiError::Api(self.error.unwrap_or_else(|| "unknown_error".to_owned())))
        }
    }
}

#[derive(Deserialize)]
struct HistoryPage {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct ConnectionsOpen {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, timeout: Duration) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, bot_token, base_url: SLACK_API_BASE_URL.to_owned() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

#[async_trait]
impl ConversationSource for SlackWebClient {
    async fn history(&self, channel_id: &str) -> Result<Vec<ChatMessage>, SlackApiError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("channel", channel_id.to_owned()),
                ("limit", HISTORY_PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let page: HistoryPage = self
                .http
                .get(self.endpoint("conversations.history"))
                .bearer_auth(self.bot_token.expose_secret())
                .query(&query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if !page.ok {
                return Err(SlackApiError::Api(page.error.unwrap_or_else(|| "unknown_error".to_owned())));
            }
            debug!(channel_id, page_size = page.messages.len(), "fetched history page");
            messages.extend(page.messages);

            let next_cursor = page
                .response_metadata
                .map(|metadata| metadata.next_cursor)
                .filter(|next| !next.is_empty());
            match next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => return Ok(messages),
            }
        }
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<u64, SlackApiError> {
        let bytes = self
            .http
            .get(url)
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let io_error =
            |source| SlackApiError::Io { path: destination.display().to_string(), source };
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(destination, &bytes).await.map_err(io_error)?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl Responder for SlackWebClient {
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body = json!({
            "channel": channel_id,
            "text": message.fallback_text,
            "blocks": message.blocks,
        });

        let envelope: ApiEnvelope = self
            .http
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result()
    }
}

/// Asks Slack for a fresh Socket Mode WebSocket URL using the app-level token.
pub async fn open_socket_url(
    http: &reqwest::Client,
    base_url: &str,
    app_token: &SecretString,
) -> Result<String, SlackApiError> {
    let response: ConnectionsOpen = http
        .post(format!("{}/apps.connections.open", base_url.trim_end_matches('/')))
        .bearer_auth(app_token.expose_secret())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    match (response.ok, response.url) {
        (true, Some(url)) => Ok(url),
        (true, None) => Err(SlackApiError::Api("apps.connections.open returned no url".to_owned())),
        (false, _) => {
            Err(SlackApiError::Api(response.error.unwrap_or_else(|| "unknown_error".to_owned())))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{open_socket_url, ConversationSource, Responder, SlackApiError, SlackWebClient};
    use crate::blocks;

    fn client(server: &MockServer) -> SlackWebClient {
        SlackWebClient::new(SecretString::from("xoxb-test".to_owned()), Duration::from_secs(5))
            .expect("client")
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn history_follows_cursor_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(query_param("cursor", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{"type": "message", "user": "U1", "text": "second", "ts": "2.0"}],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{"type": "message", "user": "U1", "text": "first", "ts": "1.0"}],
                "has_more": true,
                "response_metadata": {"next_cursor": "page-2"}
            })))
            .mount(&server)
            .await;

        let messages = client(&server).history("C1").await.expect("history");

        let texts: Vec<_> = messages.iter().map(|message| message.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn history_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let error = client(&server).history("C404").await.expect_err("api error");

        assert!(matches!(error, SlackApiError::Api(ref code) if code == "channel_not_found"));
    }

    #[tokio::test]
    async fn post_message_sends_blocks_and_fallback_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "C1", "text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .post_message("C1", &blocks::text_message("hello"))
            .await
            .expect("post");
    }

    #[tokio::test]
    async fn download_writes_file_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/F1"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().expect("tempdir");
        let destination = dir.path().join("downloads").join("F1.pdf");

        let written = client(&server)
            .download(&format!("{}/files/F1", server.uri()), &destination)
            .await
            .expect("download");

        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&destination).expect("read back"), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn socket_url_comes_from_connections_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apps.connections.open"))
            .and(header("authorization", "Bearer xapp-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "url": "wss://wss.slack.test/link"})),
            )
            .mount(&server)
            .await;

        let url = open_socket_url(&reqwest::Client::new(), &server.uri(), &SecretString::from("xapp-test".to_owned()))
            .await
            .expect("socket url");

        assert_eq!(url, "wss://wss.slack.test/link");
    }
}
