use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::message::MessageType;
use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Direct,
    /// Direct thread created with a marketplace context attached
    Marketplace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Closed,
}

/// Marketplace scope a conversation was opened for. Conversations with
/// different contexts between the same pair of users stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationContext {
    pub context_type: String,
    pub reference_id: String,
}

/// Per-viewer state embedded in the conversation document. The profile
/// fields are a snapshot taken at conversation creation and are not kept
/// in sync with later directory changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar: Option<String>,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub is_archived: bool,
    pub unread_count: i32,
}

impl Participant {
    pub fn from_profile(
        profile: &UserProfile,
        joined_at: DateTime<Utc>,
        last_read_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: profile.id,
            display_name: profile.name.clone(),
            avatar: profile.avatar.clone(),
            role: profile.role.clone(),
            joined_at,
            last_read_at,
            is_pinned: false,
            is_muted: false,
            is_archived: false,
            unread_count: 0,
        }
    }
}

/// Mirror of the most recent non-deleted message, kept on the conversation
/// so list views need no join against the message collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sent_at: DateTime<Utc>,
    pub kind: MessageType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationType,
    pub participants: Vec<Participant>,
    pub context: Option<ConversationContext>,
    pub last_message: Option<LastMessage>,
    /// Caller-supplied, opaque to this service
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub status: ConversationStatus,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn other_participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id != user_id)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant(user_id).is_some()
    }

    /// Structural validation applied before the document is inserted.
    pub fn validate(&self) -> AppResult<()> {
        if self.participants.len() != 2 {
            return Err(AppError::BadRequest(
                "conversation requires exactly two participants".into(),
            ));
        }
        if self.participants[0].user_id == self.participants[1].user_id {
            return Err(AppError::BadRequest(
                "participants must be distinct users".into(),
            ));
        }
        if self.participants.iter().any(|p| p.display_name.is_empty()) {
            return Err(AppError::BadRequest(
                "participant display name missing".into(),
            ));
        }
        Ok(())
    }
}

/// Per-caller flags, applied only to the calling participant's entry.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ParticipantFlags {
    pub is_pinned: Option<bool>,
    pub is_muted: Option<bool>,
    pub is_archived: Option<bool>,
}

/// Caller-facing list filters. `status`, `pinned` and `archived` are pushed
/// down to the store; `unread_only` and `search` are applied after fetch.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilters {
    pub status: Option<ConversationStatus>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub unread_only: bool,
    pub search: Option<String>,
}
