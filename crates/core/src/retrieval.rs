//! Pure filtering and shaping of channel history before it reaches the store.

use crate::domain::message::{epoch_seconds, Attachment, ChatMessage, FileLinks, Message};

/// Drops join/invite events and other system subtypes, then applies the
/// optional author allow-list.
pub fn select_messages(
    messages: Vec<ChatMessage>,
    allowed_authors: Option<&[String]>,
) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .filter(|message| message.inviter.is_none())
        .filter(|message| message.subtype.as_deref().map_or(true, str::is_empty))
        .filter(|message| match allowed_authors {
            Some(authors) if !authors.is_empty() => message
                .user
                .as_deref()
                .is_some_and(|user| authors.iter().any(|allowed| allowed == user)),
            _ => true,
        })
        .collect()
}

/// Builds the store row for a surviving message. Returns `None` when the
/// platform timestamp cannot be read as epoch seconds.
pub fn to_stored_message(message: &ChatMessage, channel_id: &str) -> Option<Message> {
    let ts = epoch_seconds(&message.ts)?;
    Some(Message {
        ts,
        client_msg_id: message.client_msg_id.clone().unwrap_or_default(),
        channel_id: channel_id.to_owned(),
        user: message.user.clone(),
        text: message.text.clone(),
        message_type: message.message_type.clone(),
        team: message.team.clone(),
        display_as_bot: message.display_as_bot,
        upload: message.upload,
        reply_count: message.reply_count,
        reply_users_count: message.reply_users_count,
        is_locked: message.is_locked,
        subscribed: message.subscribed,
        files: FileLinks::from_urls(message.files.iter().map(|file| file.url_private.clone())),
    })
}

/// Attachments worth saving locally: PDFs with a download URL.
pub fn downloadable_attachments(message: &ChatMessage) -> impl Iterator<Item = &Attachment> {
    message.files.iter().filter(|file| file.is_pdf() && file.url_private.is_some())
}

#[cfg(test)]
mod tests {
    use super::{downloadable_attachments, select_messages, to_stored_message};
    use crate::domain::message::{Attachment, ChatMessage};

    fn message(ts: &str, user: &str) -> ChatMessage {
        ChatMessage {
            ts: ts.to_owned(),
            text: format!("posting {ts}"),
            user: Some(user.to_owned()),
            message_type: Some("message".to_owned()),
            ..ChatMessage::default()
        }
    }

    fn attachment(index: usize, filetype: &str) -> Attachment {
        Attachment {
            id: format!("F{index}"),
            filetype: Some(filetype.to_owned()),
            url_private: Some(format!("https://files.slack.com/F{index}")),
        }
    }

    #[test]
    fn drops_invites_and_subtyped_system_events() {
        let mut join = message("1.0", "U1");
        join.inviter = Some("U9".to_owned());
        let mut topic = message("2.0", "U1");
        topic.subtype = Some("channel_topic".to_owned());
        let mut empty_subtype = message("3.0", "U1");
        empty_subtype.subtype = Some(String::new());
        let kept = message("4.0", "U1");

        let selected = select_messages(vec![join, topic, empty_subtype, kept], None);

        let timestamps: Vec<_> = selected.iter().map(|message| message.ts.as_str()).collect();
        assert_eq!(timestamps, vec!["3.0", "4.0"]);
    }

    #[test]
    fn allow_list_keeps_only_listed_authors() {
        let allowed = vec!["U1".to_owned()];
        let mut anonymous = message("3.0", "U1");
        anonymous.user = None;

        let selected =
            select_messages(vec![message("1.0", "U1"), message("2.0", "U2"), anonymous], Some(allowed.as_slice()));

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].ts, "1.0");
    }

    #[test]
    fn empty_allow_list_keeps_everyone() {
        let selected = select_messages(vec![message("1.0", "U1"), message("2.0", "U2")], Some(&[][..]));
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn six_attachments_store_five_links() {
        let mut posting = message("1710000000.000200", "U1");
        posting.files = (1..=6).map(|index| attachment(index, "pdf")).collect();

        let stored = to_stored_message(&posting, "C1").expect("timestamp should parse");

        assert_eq!(stored.ts, 1_710_000_000);
        assert_eq!(stored.client_msg_id, "");
        assert_eq!(stored.files.count(), 5);
        assert_eq!(stored.files.get(4), Some("https://files.slack.com/F5"));
    }

    #[test]
    fn only_pdf_attachments_are_downloadable() {
        let mut posting = message("1.0", "U1");
        posting.files = vec![attachment(1, "pdf"), attachment(2, "docx"), attachment(3, "PDF")];

        let ids: Vec<_> = downloadable_attachments(&posting).map(|file| file.id.as_str()).collect();
        assert_eq!(ids, vec!["F1", "F3"]);
    }
}
