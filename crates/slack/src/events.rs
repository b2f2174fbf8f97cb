use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    blocks::{self, MessageTemplate},
    commands::{
        parse_mention, parse_slash_command, BotCommand, CommandContext, CommandRouter,
        CommandService, MentionEvent, SlashCommandPayload,
    },
    web::{Responder, SlackApiError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    AppMention(MentionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::SlashCommand(_) => "slash_commands",
            Self::AppMention(_) => "app_mention",
            Self::Unsupported { event_type } => event_type,
        }
    }
}

/// One frame read from the Socket Mode connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

#[derive(Debug, Error)]
pub enum FrameParseError {
    #[error("malformed socket frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{0}` frame is missing its envelope_id")]
    MissingEnvelopeId(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

pub fn parse_frame(raw: &str) -> Result<SocketFrame, FrameParseError> {
    let frame: RawFrame = serde_json::from_str(raw)?;

    match frame.frame_type.as_str() {
        "hello" => return Ok(SocketFrame::Hello),
        "disconnect" => {
            return Ok(SocketFrame::Disconnect {
                reason: frame.reason.unwrap_or_else(|| "unspecified".to_owned()),
            })
        }
        _ => {}
    }

    let envelope_id =
        frame.envelope_id.ok_or_else(|| FrameParseError::MissingEnvelopeId(frame.frame_type.clone()))?;

    let event = match frame.frame_type.as_str() {
        "slash_commands" => SlackEvent::SlashCommand(serde_json::from_value(frame.payload)?),
        "events_api" => {
            let inner = frame.payload.get("event").cloned().unwrap_or(Value::Null);
            match inner.get("type").and_then(Value::as_str) {
                Some("app_mention") => SlackEvent::AppMention(serde_json::from_value(inner)?),
                other => SlackEvent::Unsupported {
                    event_type: format!("events_api:{}", other.unwrap_or("unknown")),
                },
            }
        }
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded { channel_id: String, message: MessageTemplate },
    Ignored,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to deliver reply: {0}")]
    Respond(#[from] SlackApiError),
}

#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    /// Payload to send back with the envelope ack, if any.
    fn ack_payload(&self, envelope: &SlackEnvelope) -> Option<Value>;

    async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError>;
}

pub struct EventDispatcher<S> {
    router: CommandRouter<S>,
    responder: Arc<dyn Responder>,
}

impl<S> EventDispatcher<S>
where
    S: CommandService,
{
    pub fn new(router: CommandRouter<S>, responder: Arc<dyn Responder>) -> Self {
        Self { router, responder }
    }

    async fn run_command(&self, command: BotCommand, ctx: &CommandContext) -> MessageTemplate {
        match self.router.route(command, ctx).await {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.command_failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %ctx.channel_id,
                    error = %error,
                    "command failed; echoing error to channel"
                );
                blocks::error_message(&error.to_string(), &ctx.correlation_id)
            }
        }
    }

    async fn reply(
        &self,
        channel_id: &str,
        message: MessageTemplate,
    ) -> Result<HandlerResult, DispatchError> {
        self.responder.post_message(channel_id, &message).await?;
        Ok(HandlerResult::Responded { channel_id: channel_id.to_owned(), message })
    }
}

#[async_trait]
impl<S> EnvelopeHandler for EventDispatcher<S>
where
    S: CommandService + 'static,
{
    fn ack_payload(&self, envelope: &SlackEnvelope) -> Option<Value> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return None;
        };
        let command = parse_slash_command(payload).ok()?;
        command.ack_text().map(|text| json!({ "text": text }))
    }

    async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        match &envelope.event {
            SlackEvent::SlashCommand(payload) => {
                let command_ctx = CommandContext {
                    channel_id: payload.channel_id.clone(),
                    user_id: payload.user_id.clone(),
                    correlation_id: ctx.correlation_id.clone(),
                };
                let message = match parse_slash_command(payload) {
                    Ok(command) => {
                        info!(
                            event_name = "ingress.slack.command_routed",
                            correlation_id = %ctx.correlation_id,
                            channel_id = %payload.channel_id,
                            command = ?command,
                            "routing slash command"
                        );
                        self.run_command(command, &command_ctx).await
                    }
                    Err(error) => blocks::error_message(&error.to_string(), &ctx.correlation_id),
                };
                self.reply(&payload.channel_id, message).await
            }
            SlackEvent::AppMention(event) => {
                let command = parse_mention(&event.text);
                info!(
                    event_name = "ingress.slack.command_routed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    command = ?command,
                    "routing mention"
                );
                let command_ctx = CommandContext {
                    channel_id: event.channel_id.clone(),
                    user_id: event.user_id.clone(),
                    correlation_id: ctx.correlation_id.clone(),
                };
                let addressed = !matches!(command, BotCommand::Intro);
                let mut message = self.run_command(command, &command_ctx).await;
                if addressed {
                    message = message.addressed_to(&event.user_id);
                }
                self.reply(&event.channel_id, message).await
            }
            SlackEvent::Unsupported { event_type } => {
                info!(
                    event_name = "ingress.slack.event_ignored",
                    correlation_id = %ctx.correlation_id,
                    event_type = %event_type,
                    "ignoring unsupported slack event"
                );
                Ok(HandlerResult::Ignored)
            }
        }
    }
}
