use echolab_core::domain::lookup::ChannelCount;
use echolab_core::domain::upload::YearStatus;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::commands::{StatusMode, COMMAND_NAMES};

pub const SPREADSHEET_BUTTON_ACTION: &str = "candidates.open_sheet.v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<bool>,
    },
    Mrkdwn {
        text: String,
    },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into(), emoji: None }
    }

    pub fn emoji(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into(), emoji: Some(true) }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text, .. } | Self::Mrkdwn { text } => text,
        }
    }

    fn prefixed(&self, prefix: &str) -> Self {
        match self {
            Self::PlainText { text, emoji } => {
                Self::PlainText { text: format!("{prefix}{text}"), emoji: *emoji }
            }
            Self::Mrkdwn { text } => Self::Mrkdwn { text: format!("{prefix}{text}") },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: TextObject) -> Self {
        Self { action_id: action_id.into(), text: label, style: None, value: None, url: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextSpan {
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    RichTextSection { elements: Vec<RichTextSpan> },
    RichTextPreformatted { elements: Vec<RichTextSpan> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<ButtonElement>,
    },
    Actions {
        block_id: String,
        elements: Vec<ButtonElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    RichText {
        block_id: String,
        elements: Vec<RichTextElement>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Prefixes the reply with a user mention, the way mention replies are
    /// addressed.
    pub fn addressed_to(mut self, user_id: &str) -> Self {
        let prefix = format!("<@{user_id}>: ");
        self.fallback_text = format!("{prefix}{}", self.fallback_text);

        match self.blocks.first_mut() {
            Some(Block::Section { text, .. }) => *text = text.prefixed(&prefix),
            _ => self.blocks.insert(
                0,
                Block::Section {
                    block_id: "reply.addressee.v1".to_owned(),
                    text: TextObject::mrkdwn(prefix.trim_end()),
                    accessory: None,
                },
            ),
        }
        self
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn rich_text<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut RichTextBuilder),
    {
        let mut builder = RichTextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::RichText { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<ButtonElement>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, button: ButtonElement) -> &mut Self {
        self.accessory = Some(button);
        self
    }

    fn build(self) -> (TextObject, Option<ButtonElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

#[derive(Default)]
pub struct RichTextBuilder {
    elements: Vec<RichTextElement>,
}

impl RichTextBuilder {
    pub fn section(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(RichTextElement::RichTextSection {
            elements: vec![RichTextSpan::Text { text: text.into() }],
        });
        self
    }

    pub fn preformatted(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(RichTextElement::RichTextPreformatted {
            elements: vec![RichTextSpan::Text { text: text.into() }],
        });
        self
    }

    fn build(self) -> Vec<RichTextElement> {
        self.elements
    }
}

pub fn text_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text.to_owned())
        .section("reply.text.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn intro_message(share_url: Option<&str>) -> MessageTemplate {
    let builder = MessageBuilder::new("EchoLab candidates bot").section(
        "candidates.intro.v1",
        |section| {
            section.mrkdwn(
                "I am research procrastination at its finest, but also an HR assistant. \
                 After a posting, please reload me so we can add the candidates to the database.",
            );
        },
    );

    let Some(url) = share_url else {
        return builder.build();
    };

    builder
        .section("candidates.sheet_link.v1", |section| {
            section.mrkdwn("Access the candidate database").accessory(
                ButtonElement::new(SPREADSHEET_BUTTON_ACTION, TextObject::emoji("🆒"))
                    .value("open_candidate_sheet")
                    .url(url),
            );
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    let listing: String = COMMAND_NAMES.iter().map(|name| format!("{name}\n")).collect();
    let text = format!("Currently I support the following commands:\n{listing}");
    MessageBuilder::new(text.clone())
        .section("candidates.help.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn unknown_command_message(command_text: &str) -> MessageTemplate {
    let help = help_message();
    let text = format!(
        "Sorry I don't understand the command: {command_text}. {}",
        help.fallback_text
    );
    MessageBuilder::new(text.clone())
        .section("candidates.unknown.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("candidates.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("candidates.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn candidate_summary_message(counts: &[ChannelCount]) -> MessageTemplate {
    let mut builder = Builder::default();
    builder.push_record(["channel_name", "count"]);
    for row in counts {
        builder.push_record([
            row.channel_name.clone().unwrap_or_default(),
            row.count.to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    let rendered = table.to_string();

    MessageBuilder::new(format!("Number of candidates by type:\n\n{rendered}"))
        .rich_text("candidates.summary.v1", |rich_text| {
            rich_text.section("Number of candidates by type:\n\n").preformatted(rendered);
        })
        .build()
}

pub fn upload_status_table(rows: &[YearStatus]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["year_query", "station_id", "estimate_time_hr"]);
    for row in rows {
        builder.push_record([
            row.year_query.format("%Y-%m-%d").to_string(),
            row.station_count.to_string(),
            format!("{:.3}", row.estimate_time_hr),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

pub fn upload_status_message(mode: StatusMode, rows: &[YearStatus]) -> MessageTemplate {
    let heading = match mode {
        StatusMode::Live => "Pending uploads by year:",
        StatusMode::Log => "Pending uploads by year (status log):",
    };
    let rendered = if rows.is_empty() {
        "Everything is uploaded.".to_owned()
    } else {
        upload_status_table(rows)
    };

    MessageBuilder::new(format!("{heading}\n{rendered}"))
        .rich_text("uploads.status.v1", |rich_text| {
            rich_text.section(format!("{heading}\n")).preformatted(rendered);
        })
        .build()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use echolab_core::domain::lookup::ChannelCount;
    use echolab_core::domain::upload::YearStatus;
    use serde_json::json;

    use super::{
        candidate_summary_message, help_message, intro_message, text_message,
        unknown_command_message, upload_status_message, Block, SPREADSHEET_BUTTON_ACTION,
    };
    use crate::commands::StatusMode;

    #[test]
    fn intro_links_the_spreadsheet_through_a_button_accessory() {
        let message = intro_message(Some("https://docs.google.com/spreadsheets/d/abc"));
        let value = serde_json::to_value(&message.blocks).expect("serialize");

        assert_eq!(value[1]["type"], "section");
        assert_eq!(value[1]["accessory"]["type"], "button");
        assert_eq!(value[1]["accessory"]["action_id"], SPREADSHEET_BUTTON_ACTION);
        assert_eq!(value[1]["accessory"]["url"], "https://docs.google.com/spreadsheets/d/abc");
        assert_eq!(value[1]["accessory"]["text"], json!({"type": "plain_text", "text": "🆒", "emoji": true}));
    }

    #[test]
    fn intro_without_url_has_no_button() {
        assert_eq!(intro_message(None).blocks.len(), 1);
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_message();
        for name in ["summary", "reload", "status", "status log", "help"] {
            assert!(help.fallback_text.contains(&format!("{name}\n")), "missing {name}");
        }
        assert!(help.fallback_text.starts_with("Currently I support the following commands:"));
    }

    #[test]
    fn unknown_command_echoes_text_and_help() {
        let message = unknown_command_message("dance");
        assert!(message
            .fallback_text
            .starts_with("Sorry I don't understand the command: dance. Currently I support"));
    }

    #[test]
    fn summary_renders_markdown_table_in_preformatted_block() {
        let message = candidate_summary_message(&[
            ChannelCount { channel_name: Some("visiting_scholars".into()), count: 1 },
            ChannelCount { channel_name: Some("graduate_students".into()), count: 4 },
        ]);

        let value = serde_json::to_value(&message.blocks[0]).expect("serialize");
        assert_eq!(value["type"], "rich_text");
        assert_eq!(value["elements"][0]["type"], "rich_text_section");
        assert_eq!(value["elements"][0]["elements"][0]["text"], "Number of candidates by type:\n\n");
        assert_eq!(value["elements"][1]["type"], "rich_text_preformatted");
        let table = value["elements"][1]["elements"][0]["text"].as_str().expect("table text");
        assert!(table.contains("| channel_name"));
        assert!(table.contains("graduate_students"));
    }

    #[test]
    fn status_table_lists_years_and_estimates() {
        let rows = vec![YearStatus {
            year_query: NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"),
            station_count: 10,
            estimate_time_hr: 10.0 / 150.0,
        }];

        let message = upload_status_message(StatusMode::Live, &rows);

        assert!(message.fallback_text.contains("2020-01-01"));
        assert!(message.fallback_text.contains("0.067"));
        assert!(matches!(message.blocks[0], Block::RichText { .. }));
    }

    #[test]
    fn addressed_replies_prefix_the_mention() {
        let section = text_message("done").addressed_to("U1");
        assert_eq!(section.fallback_text, "<@U1>: done");
        let value = serde_json::to_value(&section.blocks[0]).expect("serialize");
        assert_eq!(value["text"]["text"], "<@U1>: done");

        let rich = upload_status_message(StatusMode::Log, &[]).addressed_to("U2");
        assert_eq!(rich.blocks.len(), 2);
        let value = serde_json::to_value(&rich.blocks[0]).expect("serialize");
        assert_eq!(value["text"]["text"], "<@U2>:");
    }
}
