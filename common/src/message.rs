use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Profile, UserId};
use crate::nullable;
use crate::project::ProjectId;

/// Unique message identifier (row uuid).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// A chat message posted within a project.
///
/// Rows from history queries carry the sender profile embedded. Realtime insert
/// records do not, and get it attached after a profile lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub project_id: ProjectId,
    pub sender_id: UserId,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Profile>,
}

impl Message {
    pub fn with_sender(mut self, sender: Profile) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn sender_name(&self) -> &str {
        self.sender
            .as_ref()
            .map(|p| p.display_name())
            .unwrap_or("Unknown")
    }

    /// File name portion of the attachment URL, for display.
    pub fn attachment_name(&self) -> Option<&str> {
        let url = self.attachment_url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_record_without_sender_decodes() {
        let json = r#"{
            "id": "7f1c",
            "project_id": "p1",
            "sender_id": "u2",
            "content": "Uploaded the raw reads",
            "attachment_url": "https://cdn.example.org/storage/v1/object/public/message-attachments/1700-ab-reads.fastq?t=1",
            "created_at": "2024-04-02T09:15:00.5+00:00"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.sender.is_none());
        assert_eq!(msg.sender_name(), "Unknown");
        assert_eq!(msg.attachment_name(), Some("1700-ab-reads.fastq"));
    }

    #[test]
    fn null_content_with_attachment_only() {
        let json = r#"{"id":"m","project_id":"p1","sender_id":"u2","content":null,
            "attachment_url":null,"created_at":"2024-04-02T09:15:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.content, "");
        assert_eq!(msg.attachment_name(), None);
    }
}
