use std::collections::HashSet;
use std::fmt;

use crate::message::{Message, MessageId};

/// Default storage bucket for chat attachments.
pub const ATTACHMENT_BUCKET: &str = "message-attachments";

/// Ordered, duplicate-free list of chat messages for one project.
///
/// History is loaded once, ascending by creation time. Later messages (own sends
/// and realtime inserts) are appended in arrival order. Merging an id that is
/// already present is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from a history fetch. Sorts by `created_at` ascending and
    /// drops repeated ids, keeping the first.
    pub fn from_history(mut history: Vec<Message>) -> Self {
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let mut log = Self::new();
        for message in history {
            log.merge(message);
        }
        log
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Append `message` unless its id is already present. Returns true if it
    /// was appended.
    pub fn merge(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }
}

/// A file picked for upload alongside a chat message.
#[derive(Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// Keep file contents out of logs.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// The message being composed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeDraft {
    pub text: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeError {
    /// Neither text nor an attachment.
    Empty,
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "write a message or attach a file"),
        }
    }
}

impl std::error::Error for ComposeError {}

impl ComposeDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// A draft is sendable with non-blank text, an attachment, or both.
    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.trimmed_text().is_empty() && self.attachment.is_none() {
            return Err(ComposeError::Empty);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachment = None;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.attachment.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::identity::UserId;
    use crate::project::ProjectId;

    fn message(id: &str, minute: u32) -> Message {
        Message {
            id: MessageId::from(id),
            project_id: ProjectId::from("p1"),
            sender_id: UserId::from("u1"),
            content: format!("message {id}"),
            attachment_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            sender: None,
        }
    }

    #[test]
    fn history_is_sorted_ascending() {
        let log = MessageLog::from_history(vec![message("c", 30), message("a", 10), message("b", 20)]);
        let ids: Vec<_> = log.messages().iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn merging_a_known_id_is_a_no_op() {
        let mut log = MessageLog::from_history(vec![message("a", 10)]);
        let mut edited = message("a", 45);
        edited.content = "different body".into();

        assert!(!log.merge(edited));
        assert_eq!(log.len(), 1);
        assert_eq!(log.messages()[0].content, "message a");

        assert!(log.merge(message("b", 5)));
        assert_eq!(log.len(), 2);
        // Appended, not re-sorted.
        assert_eq!(log.messages()[1].id, MessageId::from("b"));
    }

    #[test]
    fn compose_validation() {
        assert_eq!(ComposeDraft::default().validate(), Err(ComposeError::Empty));
        assert_eq!(ComposeDraft::text("   \n").validate(), Err(ComposeError::Empty));
        assert!(ComposeDraft::text("hello").validate().is_ok());

        let draft = ComposeDraft {
            text: String::new(),
            attachment: Some(Attachment::new("plot.png", "image/png", vec![1, 2, 3])),
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn attachment_debug_hides_bytes() {
        let attachment = Attachment::new("data.csv", "text/csv", vec![0; 2048]);
        let debug = format!("{attachment:?}");
        assert!(debug.contains("size: 2048"));
        assert!(!debug.contains("[0, 0"));
    }
}
