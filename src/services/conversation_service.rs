use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::conversation::{
    Conversation, ConversationContext, ConversationFilters, ConversationStatus, ConversationType,
    Participant, ParticipantFlags,
};
use crate::models::message::Message;
use crate::models::{Contact, UserProfile};
use crate::repository::{ConversationQuery, ConversationRepository, DedupOutcome, UserDirectory};
use crate::services::message_service::MessageService;

#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationOutcome {
    pub conversation: Conversation,
    pub message: Option<Message>,
    pub is_existing: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MarkReadOutcome {
    pub success: bool,
    /// Conversation-level participant rows updated (0 or 1); the message
    /// receipt fan-out is best-effort and not counted here.
    pub marked_count: u64,
}

#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    directory: Arc<dyn UserDirectory>,
    messages: MessageService,
    config: Config,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        directory: Arc<dyn UserDirectory>,
        messages: MessageService,
        config: Config,
    ) -> Self {
        Self {
            conversations,
            directory,
            messages,
            config,
        }
    }

    async fn snapshot_profile(&self, user_id: Uuid) -> UserProfile {
        match self.directory.find_user(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::fallback(user_id),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "directory lookup failed, using fallback profile");
                UserProfile::fallback(user_id)
            }
        }
    }

    /// Open (or find) the direct thread between two users, optionally scoped
    /// by a marketplace context, optionally sending an opening message.
    pub async fn create_conversation(
        &self,
        creator_id: Uuid,
        recipient_id: Uuid,
        context: Option<ConversationContext>,
        metadata: serde_json::Map<String, serde_json::Value>,
        initial_message: Option<&str>,
    ) -> AppResult<CreateConversationOutcome> {
        if creator_id == recipient_id {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let creator = self.snapshot_profile(creator_id).await;
        let recipient = self.snapshot_profile(recipient_id).await;

        let now = Utc::now();
        let candidate = Conversation {
            id: Uuid::new_v4(),
            kind: if context.is_some() {
                ConversationType::Marketplace
            } else {
                ConversationType::Direct
            },
            participants: vec![
                // Creator has seen everything so far; the recipient starts
                // with the epoch marker so history counts as unread.
                Participant::from_profile(&creator, now, now),
                Participant::from_profile(&recipient, now, DateTime::<Utc>::UNIX_EPOCH),
            ],
            context,
            last_message: None,
            metadata,
            status: ConversationStatus::Active,
            message_count: 0,
            created_at: now,
            updated_at: now,
        };
        candidate.validate()?;

        // Upserting insert: a concurrent creator losing the race lands on
        // the existing thread instead of forking a duplicate.
        let (mut conversation, is_existing) = match self.conversations.insert_direct(candidate).await? {
            DedupOutcome::Created(c) => {
                tracing::info!(conversation_id = %c.id, %creator_id, %recipient_id, "conversation created");
                (c, false)
            }
            DedupOutcome::Existing(c) => {
                tracing::debug!(conversation_id = %c.id, "existing conversation reused");
                (c, true)
            }
        };

        let mut message = None;
        if let Some(content) = initial_message {
            let sent = self
                .messages
                .send_message(conversation.id, creator_id, content, Vec::new(), None)
                .await?;
            // pick up the summary fields the send just wrote
            conversation = self
                .conversations
                .find_for_participant(conversation.id, creator_id)
                .await?
                .ok_or(AppError::NotFound)?;
            message = Some(sent);
        }

        Ok(CreateConversationOutcome {
            conversation,
            message,
            is_existing,
        })
    }

    pub async fn get_conversations(
        &self,
        user_id: Uuid,
        filters: ConversationFilters,
    ) -> AppResult<Vec<Conversation>> {
        let query = ConversationQuery {
            status: filters.status,
            pinned: filters.pinned,
            archived: filters.archived,
        };
        let mut conversations = self
            .conversations
            .list_for_participant(user_id, &query)
            .await?;

        if filters.unread_only {
            conversations.retain(|c| {
                c.participant(user_id)
                    .is_some_and(|p| p.unread_count > 0)
            });
        }
        if let Some(search) = filters.search.as_deref() {
            let needle = search.to_lowercase();
            conversations.retain(|c| {
                let name_hit = c
                    .other_participant(user_id)
                    .is_some_and(|p| p.display_name.to_lowercase().contains(&needle));
                let content_hit = c
                    .last_message
                    .as_ref()
                    .is_some_and(|m| m.content.to_lowercase().contains(&needle));
                name_hit || content_hit
            });
        }

        Ok(conversations)
    }

    /// NotFound covers both a missing conversation and a caller who is not
    /// a participant; this is the sole access gate.
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        self.conversations
            .find_for_participant(conversation_id, user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Pin/mute/archive, scoped to the calling participant's entry only.
    pub async fn update_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        flags: ParticipantFlags,
    ) -> AppResult<Conversation> {
        let matched = self
            .conversations
            .update_participant_flags(conversation_id, user_id, flags)
            .await?;
        if !matched {
            return Err(AppError::NotFound);
        }
        self.get_conversation(conversation_id, user_id).await
    }

    /// "Delete" archives the caller's view; the conversation and the other
    /// participant's view persist.
    pub async fn delete_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<()> {
        self.update_conversation(
            conversation_id,
            user_id,
            ParticipantFlags {
                is_archived: Some(true),
                ..Default::default()
            },
        )
        .await?;
        Ok(())
    }

    pub async fn mark_as_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<MarkReadOutcome> {
        self.get_conversation(conversation_id, user_id).await?;

        let now = Utc::now();
        let marked = self
            .conversations
            .mark_read(conversation_id, user_id, now)
            .await?;

        // Best-effort receipt fan-out; the participant row above is the
        // authoritative unread signal, so a failure here is logged, not
        // surfaced.
        match self
            .messages
            .fanout_read_receipts(conversation_id, user_id, now)
            .await
        {
            Ok(receipts) => {
                tracing::debug!(%conversation_id, %user_id, receipts, "read receipts fanned out");
            }
            Err(err) => {
                tracing::warn!(%conversation_id, %user_id, error = %err, "read receipt fan-out failed");
            }
        }

        Ok(MarkReadOutcome {
            success: marked > 0,
            marked_count: marked,
        })
    }

    /// Total unread messages across the user's non-archived conversations.
    pub async fn get_unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        self.conversations.unread_total(user_id).await
    }

    /// Contact directory lookup: other users matching the query, capped.
    pub async fn get_contacts(
        &self,
        user_id: Uuid,
        search: Option<&str>,
    ) -> AppResult<Vec<Contact>> {
        let users = self.directory.search_users(search).await?;
        Ok(users
            .into_iter()
            .filter(|u| u.id != user_id)
            .take(self.config.contact_result_cap)
            .map(Contact::from)
            .collect())
    }
}
