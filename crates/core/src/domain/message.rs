use serde::{Deserialize, Serialize};

/// Width of the `file_1`..`file_5` columns in the `messages` table.
pub const MAX_FILE_LINKS: usize = 5;

/// Attachment as reported by the chat platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub url_private: Option<String>,
}

impl Attachment {
    pub fn is_pdf(&self) -> bool {
        self.filetype.as_deref().is_some_and(|filetype| filetype.eq_ignore_ascii_case("pdf"))
    }
}

/// A channel history entry before filtering, shaped after the
/// `conversations.history` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub ts: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub inviter: Option<String>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub display_as_bot: Option<bool>,
    #[serde(default)]
    pub upload: Option<bool>,
    #[serde(default)]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub reply_users_count: Option<i64>,
    #[serde(default)]
    pub is_locked: Option<bool>,
    #[serde(default)]
    pub subscribed: Option<bool>,
    #[serde(default)]
    pub files: Vec<Attachment>,
}

/// Positional file links; anything past [`MAX_FILE_LINKS`] is dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLinks([Option<String>; MAX_FILE_LINKS]);

impl FileLinks {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut slots: [Option<String>; MAX_FILE_LINKS] = Default::default();
        for (slot, url) in slots.iter_mut().zip(urls) {
            *slot = url.map(Into::into);
        }
        Self(slots)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|slot| slot.as_deref())
    }

    pub fn slots(&self) -> &[Option<String>; MAX_FILE_LINKS] {
        &self.0
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }
}

/// A row of the `messages` table. Keyed by (`ts`, `client_msg_id`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub ts: i64,
    /// Empty when the platform supplied none, so the composite key still collides.
    pub client_msg_id: String,
    pub channel_id: String,
    pub user: Option<String>,
    pub text: String,
    pub message_type: Option<String>,
    pub team: Option<String>,
    pub display_as_bot: Option<bool>,
    pub upload: Option<bool>,
    pub reply_count: Option<i64>,
    pub reply_users_count: Option<i64>,
    pub is_locked: Option<bool>,
    pub subscribed: Option<bool>,
    pub files: FileLinks,
}

/// Projection of a stored message that still lacks a parsed record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnparsedMessage {
    pub text: String,
    pub channel_id: String,
    pub ts: i64,
}

/// Truncates a platform timestamp such as `1710000000.123456` to whole seconds.
pub fn epoch_seconds(ts: &str) -> Option<i64> {
    let whole = ts.trim().split('.').next()?;
    whole.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{epoch_seconds, ChatMessage, FileLinks};

    #[test]
    fn file_links_keep_first_five_positions() {
        let urls = (1..=6).map(|index| Some(format!("https://files/{index}")));
        let links = FileLinks::from_urls(urls);

        assert_eq!(links.count(), 5);
        assert_eq!(links.get(0), Some("https://files/1"));
        assert_eq!(links.get(4), Some("https://files/5"));
        assert_eq!(links.get(5), None);
    }

    #[test]
    fn epoch_seconds_truncates_fraction() {
        assert_eq!(epoch_seconds("1710000000.987654"), Some(1_710_000_000));
        assert_eq!(epoch_seconds("1710000000"), Some(1_710_000_000));
        assert_eq!(epoch_seconds("not-a-ts"), None);
    }

    #[test]
    fn chat_message_deserializes_platform_payload() {
        let message: ChatMessage = serde_json::from_str(
            r#"{
                "type": "message",
                "user": "U06N7CSQQKZ",
                "text": "Candidate intro",
                "ts": "1710000000.000100",
                "client_msg_id": "abc",
                "files": [{"id": "F1", "filetype": "pdf", "url_private": "https://files/F1"}]
            }"#,
        )
        .expect("payload should deserialize");

        assert_eq!(message.message_type.as_deref(), Some("message"));
        assert_eq!(message.files.len(), 1);
        assert!(message.files[0].is_pdf());
        assert!(message.subtype.is_none());
    }
}
