use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content placed into a message when its sender deletes it.
pub const DELETED_MESSAGE_PLACEHOLDER: &str = "[Message deleted]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
}

/// Delivery status. Only `Sent` is ever written today; `read_by` is the
/// receipt mechanism actually consumed by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

/// Descriptor only; the blob itself lives in external storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Snapshot of the quoted message, resolved once at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPreview {
    pub message_id: Uuid,
    pub content: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRecord {
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: String,
    pub kind: MessageType,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<Reaction>,
    pub read_by: Vec<ReadReceipt>,
    pub reply_to: Option<ReplyPreview>,
    /// Prior contents, oldest first; each edit pushes the content it replaced
    pub edit_history: Vec<EditRecord>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.iter().any(|r| r.user_id == user_id)
    }

    pub fn has_reaction(&self, user_id: Uuid, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user_id == user_id && r.emoji == emoji)
    }
}
