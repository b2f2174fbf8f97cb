use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{parse_frame, EnvelopeHandler, EventContext, SlackEnvelope, SocketFrame};
use crate::web::{open_socket_url, SLACK_API_BASE_URL};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack asked the client to reconnect: {0}")]
    ReconnectRequested(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket. Each `connect` asks
/// `apps.connections.open` for a fresh URL.
pub struct WebSocketTransport {
    http: reqwest::Client,
    api_base_url: String,
    app_token: SecretString,
    stream: Mutex<Option<SocketStream>>,
}

impl WebSocketTransport {
    pub fn new(http: reqwest::Client, app_token: SecretString) -> Self {
        Self {
            http,
            api_base_url: SLACK_API_BASE_URL.to_owned(),
            app_token,
            stream: Mutex::new(None),
        }
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = open_socket_url(&self.http, &self.api_base_url, &self.app_token)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (stream, _response) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Receive("transport is not connected".to_owned()))?;

        loop {
            let Some(message) = stream.next().await else {
                return Err(TransportError::ReconnectRequested("socket closed".to_owned()));
            };
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;

            let text = match message {
                Message::Text(text) => text,
                Message::Ping(payload) => {
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|error| TransportError::Receive(error.to_string()))?;
                    continue;
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .unwrap_or_else(|| "close frame".to_owned());
                    return Err(TransportError::ReconnectRequested(reason));
                }
                _ => continue,
            };

            match parse_frame(&text) {
                Ok(SocketFrame::Hello) => debug!("socket mode hello received"),
                Ok(SocketFrame::Disconnect { reason }) => {
                    return Err(TransportError::ReconnectRequested(reason));
                }
                Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                Err(error) => warn!(error = %error, "skipping unreadable socket mode frame"),
            }
        }
    }

    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<Value>,
    ) -> Result<(), TransportError> {
        let mut ack = json!({ "envelope_id": envelope_id });
        if let Some(payload) = payload {
            ack["payload"] = payload;
        }

        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("transport is not connected".to_owned()))?;
        stream
            .send(Message::Text(ack.to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        stream.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    handler: Arc<dyn EnvelopeHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        handler: Arc<dyn EnvelopeHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    /// Pumps envelopes until the transport ends its stream or retries run out.
    /// Reconnects requested by Slack do not count against the retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(TransportError::ReconnectRequested(reason)) => {
                    info!(
                        event_name = "ingress.slack.reconnect_requested",
                        reason = %reason,
                        "slack requested a reconnect"
                    );
                    if let Err(disconnect_error) = self.transport.disconnect().await {
                        warn!(
                            event_name = "ingress.slack.disconnect_failed",
                            error = %disconnect_error,
                            "closing the old connection before reconnecting failed"
                        );
                    }
                    attempt = 0;
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            let ack_payload = self.handler.ack_payload(&envelope);
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id, ack_payload).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = self.handler.dispatch(&envelope, &context).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
            }
        }
    }
}
