use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::blocks::{self, MessageTemplate};

/// Names listed by `help`, in the order they are shown.
pub const COMMAND_NAMES: &[&str] = &["summary", "reload", "status", "status log", "help"];

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MentionEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    pub ts: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusMode {
    /// Recompute against the remote listing and the catalogue.
    Live,
    /// Read the precomputed status log table.
    Log,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Summary,
    Reload,
    Status(StatusMode),
    Help,
    Intro,
    Unknown { text: String },
}

impl BotCommand {
    /// Progress text sent back with the envelope ack for slow commands.
    pub fn ack_text(&self) -> Option<&'static str> {
        match self {
            Self::Summary => Some("Querying database... 👨🏽‍💻"),
            Self::Reload => Some("Loading database... 👨🏽‍💻"),
            Self::Status(_) => Some("Checking upload status... 👨🏽‍💻"),
            Self::Help | Self::Intro | Self::Unknown { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub channel_id: String,
    pub user_id: String,
    pub correlation_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("{0}")]
    Service(String),
}

pub fn parse_slash_command(payload: &SlashCommandPayload) -> Result<BotCommand, CommandParseError> {
    let args = payload.text.trim().to_ascii_lowercase();
    match payload.command.trim() {
        "/summary" => Ok(BotCommand::Summary),
        "/reload" => Ok(BotCommand::Reload),
        "/status" => Ok(BotCommand::Status(parse_status_mode(&args))),
        "/help" => Ok(BotCommand::Help),
        other => Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    }
}

/// Classifies the text of an `app_mention`. Leading `<@...>` tokens are the
/// bot's own mention and are ignored; a bare mention is an introduction.
pub fn parse_mention(text: &str) -> BotCommand {
    let command_text = text
        .split_whitespace()
        .skip_while(|token| token.starts_with("<@") && token.ends_with('>'))
        .collect::<Vec<_>>()
        .join(" ");

    let normalized = command_text.to_ascii_lowercase();
    let mut words = normalized.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None, _, _) => BotCommand::Intro,
        (Some("summary"), None, _) => BotCommand::Summary,
        (Some("reload"), None, _) => BotCommand::Reload,
        (Some("status"), None, _) => BotCommand::Status(StatusMode::Live),
        (Some("status"), Some("log"), None) => BotCommand::Status(StatusMode::Log),
        (Some("help"), None, _) => BotCommand::Help,
        _ => BotCommand::Unknown { text: command_text },
    }
}

fn parse_status_mode(args: &str) -> StatusMode {
    if args.split_whitespace().next() == Some("log") {
        StatusMode::Log
    } else {
        StatusMode::Live
    }
}

#[async_trait]
pub trait CommandService: Send + Sync {
    async fn summary(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError>;

    async fn reload(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError>;

    async fn upload_status(
        &self,
        mode: StatusMode,
        ctx: &CommandContext,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

#[async_trait]
impl<T> CommandService for std::sync::Arc<T>
where
    T: CommandService + ?Sized,
{
    async fn summary(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError> {
        (**self).summary(ctx).await
    }

    async fn reload(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError> {
        (**self).reload(ctx).await
    }

    async fn upload_status(
        &self,
        mode: StatusMode,
        ctx: &CommandContext,
    ) -> Result<MessageTemplate, CommandRouteError> {
        (**self).upload_status(mode, ctx).await
    }
}

pub struct CommandRouter<S> {
    service: S,
    share_url: Option<String>,
}

impl<S> CommandRouter<S>
where
    S: CommandService,
{
    pub fn new(service: S) -> Self {
        Self { service, share_url: None }
    }

    pub fn with_share_url(mut self, share_url: Option<String>) -> Self {
        self.share_url = share_url;
        self
    }

    pub async fn route(
        &self,
        command: BotCommand,
        ctx: &CommandContext,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match command {
            BotCommand::Summary => self.service.summary(ctx).await,
            BotCommand::Reload => self.service.reload(ctx).await,
            BotCommand::Status(mode) => self.service.upload_status(mode, ctx).await,
            BotCommand::Help => Ok(blocks::help_message()),
            BotCommand::Intro => Ok(blocks::intro_message(self.share_url.as_deref())),
            BotCommand::Unknown { text } => Ok(blocks::unknown_command_message(&text)),
        }
    }
}
