use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::conversation::LastMessage;
use crate::models::message::{
    Attachment, AttachmentKind, EditRecord, Message, MessageStatus, MessageType, Reaction,
    ReadReceipt, ReplyPreview, DELETED_MESSAGE_PLACEHOLDER,
};
use crate::models::truncate_chars;
use crate::repository::{ConversationRepository, MessageRepository, UserDirectory};

/// One page of history, chronological ascending. `next_cursor` is the id of
/// the oldest message already returned; pass it back to fetch older ones.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub next_cursor: Option<Uuid>,
}

#[derive(Clone)]
pub struct MessageService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    directory: Arc<dyn UserDirectory>,
    config: Config,
}

impl MessageService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        directory: Arc<dyn UserDirectory>,
        config: Config,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            config,
        }
    }

    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachments: Vec<Attachment>,
        reply_to: Option<Uuid>,
    ) -> AppResult<Message> {
        if content.trim().is_empty() && attachments.is_empty() {
            return Err(AppError::BadRequest(
                "message needs content or at least one attachment".into(),
            ));
        }

        let conversation = self
            .conversations
            .find_for_participant(conversation_id, sender_id)
            .await?
            .ok_or(AppError::NotFound)?;
        // participant list is the access gate; presence checked above
        let sender = conversation
            .participant(sender_id)
            .ok_or(AppError::Forbidden)?;

        let reply_preview = match reply_to {
            Some(reply_id) => self
                .messages
                .find(reply_id)
                .await?
                .filter(|m| m.conversation_id == conversation_id)
                .map(|m| ReplyPreview {
                    message_id: m.id,
                    content: truncate_chars(&m.content, self.config.preview_max_chars),
                    sender_name: m.sender_name,
                }),
            None => None,
        };

        let now = Utc::now();
        let kind = match attachments.first() {
            Some(a) if a.kind == AttachmentKind::Image => MessageType::Image,
            _ => MessageType::Text,
        };
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            sender_name: sender.display_name.clone(),
            sender_avatar: sender.avatar.clone(),
            content: content.to_string(),
            kind,
            attachments,
            reactions: Vec::new(),
            read_by: vec![ReadReceipt {
                user_id: sender_id,
                read_at: now,
            }],
            reply_to: reply_preview,
            edit_history: Vec::new(),
            is_edited: false,
            is_deleted: false,
            status: MessageStatus::Sent,
            created_at: now,
            updated_at: now,
        };

        self.messages.insert(message.clone()).await?;

        // Summary write is separate from the insert; on failure the message
        // history stays authoritative and the caller re-reads (no rollback).
        let summary = LastMessage {
            content: truncate_chars(&message.content, self.config.preview_max_chars),
            sender_id,
            sender_name: message.sender_name.clone(),
            sent_at: now,
            kind,
        };
        self.conversations
            .record_message(conversation_id, sender_id, summary)
            .await?;

        tracing::debug!(%conversation_id, message_id = %message.id, "message sent");
        Ok(message)
    }

    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        cursor: Option<Uuid>,
        limit: Option<usize>,
    ) -> AppResult<MessagePage> {
        self.conversations
            .find_for_participant(conversation_id, user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);

        // Fetch one past the page to learn whether older messages remain.
        let mut fetched = self
            .messages
            .list_page(conversation_id, cursor, limit + 1)
            .await?;
        let has_more = fetched.len() > limit;
        if has_more {
            fetched.truncate(limit);
        }
        let next_cursor = if has_more {
            fetched.last().map(|m| m.id)
        } else {
            None
        };
        fetched.reverse();

        Ok(MessagePage {
            messages: fetched,
            has_more,
            next_cursor,
        })
    }

    pub async fn edit_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        new_content: &str,
    ) -> AppResult<Message> {
        if new_content.trim().is_empty() {
            return Err(AppError::BadRequest("edited content is empty".into()));
        }

        let message = self
            .messages
            .find(message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if message.is_deleted {
            return Err(AppError::NotFound);
        }
        if message.sender_id != user_id {
            return Err(AppError::SenderMismatch);
        }

        let now = Utc::now();
        if now - message.created_at > Duration::minutes(self.config.max_edit_minutes) {
            return Err(AppError::EditWindowExpired {
                created_at: message.created_at,
                max_edit_minutes: self.config.max_edit_minutes,
            });
        }

        let previous = EditRecord {
            content: message.content.clone(),
            edited_at: now,
        };
        let updated = self
            .messages
            .append_edit(message_id, previous, new_content.to_string(), now)
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::debug!(%message_id, edits = updated.edit_history.len(), "message edited");
        Ok(updated)
    }

    /// Soft delete. Returns false when the message is already deleted, so
    /// repeat calls are no-ops.
    pub async fn delete_message(&self, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let Some(message) = self.messages.find(message_id).await? else {
            return Ok(false);
        };
        if message.sender_id != user_id {
            return Err(AppError::SenderMismatch);
        }

        let deleted = self
            .messages
            .soft_delete(message_id, user_id, DELETED_MESSAGE_PLACEHOLDER, Utc::now())
            .await?;
        if deleted {
            tracing::debug!(%message_id, "message deleted");
        }
        Ok(deleted)
    }

    /// Add the (user, emoji) reaction, or remove it when already present.
    /// Returns the message's reaction set after the toggle.
    pub async fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<Vec<Reaction>> {
        if emoji.is_empty() || emoji.len() > 20 {
            return Err(AppError::BadRequest("invalid emoji".into()));
        }

        let message = self
            .messages
            .find(message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.conversations
            .find_for_participant(message.conversation_id, user_id)
            .await?
            .ok_or(AppError::Forbidden)?;

        if message.has_reaction(user_id, emoji) {
            self.messages
                .remove_reaction(message_id, user_id, emoji)
                .await?;
        } else {
            let user_name = match self.directory.find_user(user_id).await {
                Ok(Some(profile)) => profile.name,
                Ok(None) => "User".to_string(),
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "directory lookup failed");
                    "User".to_string()
                }
            };
            self.messages
                .add_reaction(
                    message_id,
                    Reaction {
                        emoji: emoji.to_string(),
                        user_id,
                        user_name,
                        created_at: Utc::now(),
                    },
                )
                .await?;
        }

        Ok(self
            .messages
            .find(message_id)
            .await?
            .map(|m| m.reactions)
            .unwrap_or_default())
    }

    /// Relevance-ranked search over the caller's conversations, or over one
    /// conversation when `conversation_id` is given (with the access gate).
    pub async fn search_messages(
        &self,
        user_id: Uuid,
        query: &str,
        conversation_id: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let scope: Vec<Uuid> = match conversation_id {
            Some(id) => {
                self.conversations
                    .find_for_participant(id, user_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                vec![id]
            }
            None => self
                .conversations
                .list_for_participant(user_id, &Default::default())
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect(),
        };

        self.messages
            .search(&scope, query, self.config.search_result_cap)
            .await
    }

    pub(crate) async fn fanout_read_receipts(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.messages
            .mark_read_fanout(conversation_id, user_id, at)
            .await
    }
}
