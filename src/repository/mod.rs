pub mod memory;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::conversation::{
    Conversation, ConversationStatus, LastMessage, ParticipantFlags,
};
use crate::models::message::{EditRecord, Message, Reaction};
use crate::models::UserProfile;

/// Result of an upserting direct-conversation insert. A concurrent loser's
/// insert resolves to `Existing` instead of producing a duplicate thread.
#[derive(Debug, Clone)]
pub enum DedupOutcome {
    Created(Conversation),
    Existing(Conversation),
}

/// Store-level filters for conversation listing. `pinned` and `archived`
/// match the *requesting* participant's embedded entry, not global state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationQuery {
    pub status: Option<ConversationStatus>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
}

#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Insert a two-party conversation, deduplicated on
    /// (sorted participant ids, context) among active conversations.
    async fn insert_direct(&self, conversation: Conversation) -> AppResult<DedupOutcome>;

    /// Single access-control gate: resolves only when the conversation
    /// exists AND the user is one of its participants.
    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>>;

    /// Conversations the user belongs to, sorted by `updated_at` descending.
    async fn list_for_participant(
        &self,
        user_id: Uuid,
        query: &ConversationQuery,
    ) -> AppResult<Vec<Conversation>>;

    /// Mutate the calling participant's pin/mute/archive flags.
    /// Returns false when no such conversation/participant pair exists.
    async fn update_participant_flags(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        flags: ParticipantFlags,
    ) -> AppResult<bool>;

    /// One atomic summary update after a message insert: set `last_message`,
    /// increment `message_count`, increment `unread_count` for every
    /// participant except the sender, bump `updated_at`.
    async fn record_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        summary: LastMessage,
    ) -> AppResult<bool>;

    /// Advance the participant's `last_read_at` (never backwards) and zero
    /// their unread counter. Returns the number of participant rows matched.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Sum of the user's unread counters over conversations whose
    /// participant entry is not archived.
    async fn unread_total(&self, user_id: Uuid) -> AppResult<i64>;
}

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> AppResult<()>;

    async fn find(&self, message_id: Uuid) -> AppResult<Option<Message>>;

    /// Non-deleted messages of a conversation, newest first, strictly older
    /// (by creation order) than the cursor message when one is given. An
    /// unknown cursor id places no bound.
    async fn list_page(
        &self,
        conversation_id: Uuid,
        before: Option<Uuid>,
        limit: usize,
    ) -> AppResult<Vec<Message>>;

    /// Push `previous` onto the edit history and overwrite the content.
    /// Returns the updated message, or None when absent or deleted.
    async fn append_edit(
        &self,
        message_id: Uuid,
        previous: EditRecord,
        new_content: String,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;

    /// Tombstone the message. Matches only `sender_id` and not-yet-deleted;
    /// returns false otherwise, making repeat calls no-ops.
    async fn soft_delete(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        tombstone: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// No-op (false) when the (user, emoji) pair is already present.
    async fn add_reaction(&self, message_id: Uuid, reaction: Reaction) -> AppResult<bool>;

    async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<bool>;

    /// Append a read receipt to every message of the conversation the user
    /// has not read yet. Idempotent; returns the number of rows touched.
    async fn mark_read_fanout(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Non-deleted messages across the given conversations, ranked by text
    /// relevance, capped at `limit`.
    async fn search(
        &self,
        conversation_ids: &[Uuid],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Message>>;
}

/// Read-only collaborator; profile changes there are never fanned back
/// into existing participant snapshots.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<UserProfile>>;

    /// Case-insensitive substring match on name or email; no match string
    /// returns the whole directory.
    async fn search_users(&self, query: Option<&str>) -> AppResult<Vec<UserProfile>>;
}
