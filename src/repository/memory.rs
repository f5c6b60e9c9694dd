use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{
    Conversation, ConversationContext, ConversationStatus, LastMessage, ParticipantFlags,
};
use crate::models::message::{EditRecord, Message, Reaction, ReadReceipt};
use crate::models::UserProfile;
use crate::repository::{
    ConversationQuery, ConversationRepository, DedupOutcome, MessageRepository, UserDirectory,
};

/// In-memory document store backing the repository traits. Every trait call
/// runs under one lock acquisition, which gives it the same guarantee the
/// contracts assume of a real backend: each call is a single atomic
/// document operation, with no transaction spanning calls.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    /// Uniqueness index for active direct threads
    direct_index: HashMap<DirectKey, Uuid>,
    messages: HashMap<Uuid, Message>,
    /// Per-conversation message ids in creation order; drives cursor paging
    message_order: HashMap<Uuid, Vec<Uuid>>,
    users: HashMap<Uuid, UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DirectKey {
    participants: [Uuid; 2],
    context: Option<ConversationContext>,
}

impl DirectKey {
    fn of(conversation: &Conversation) -> AppResult<Self> {
        if conversation.participants.len() != 2 {
            return Err(AppError::Storage(
                "direct conversation must have exactly two participants".into(),
            ));
        }
        let mut participants = [
            conversation.participants[0].user_id,
            conversation.participants[1].user_id,
        ];
        participants.sort();
        Ok(Self {
            participants,
            context: conversation.context.clone(),
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Storage("store lock poisoned".into()))
    }

    /// Test/bootstrap seam for the directory side of the store.
    pub fn seed_user(&self, profile: UserProfile) -> AppResult<()> {
        let mut inner = self.lock()?;
        inner.users.insert(profile.id, profile);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationRepository for MemoryStore {
    async fn insert_direct(&self, conversation: Conversation) -> AppResult<DedupOutcome> {
        let mut inner = self.lock()?;
        let key = DirectKey::of(&conversation)?;
        if let Some(existing_id) = inner.direct_index.get(&key).copied() {
            if let Some(existing) = inner.conversations.get(&existing_id) {
                if existing.status == ConversationStatus::Active {
                    return Ok(DedupOutcome::Existing(existing.clone()));
                }
            }
        }
        inner.direct_index.insert(key, conversation.id);
        inner.message_order.entry(conversation.id).or_default();
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(DedupOutcome::Created(conversation))
    }

    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let inner = self.lock()?;
        Ok(inner
            .conversations
            .get(&conversation_id)
            .filter(|c| c.is_participant(user_id))
            .cloned())
    }

    async fn list_for_participant(
        &self,
        user_id: Uuid,
        query: &ConversationQuery,
    ) -> AppResult<Vec<Conversation>> {
        let inner = self.lock()?;
        let mut out: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| {
                let Some(p) = c.participant(user_id) else {
                    return false;
                };
                if let Some(status) = query.status {
                    if c.status != status {
                        return false;
                    }
                }
                if let Some(pinned) = query.pinned {
                    if p.is_pinned != pinned {
                        return false;
                    }
                }
                if let Some(archived) = query.archived {
                    if p.is_archived != archived {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn update_participant_flags(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        flags: ParticipantFlags,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let Some(conversation) = inner.conversations.get_mut(&conversation_id) else {
            return Ok(false);
        };
        let Some(participant) = conversation
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
        else {
            return Ok(false);
        };
        if let Some(pinned) = flags.is_pinned {
            participant.is_pinned = pinned;
        }
        if let Some(muted) = flags.is_muted {
            participant.is_muted = muted;
        }
        if let Some(archived) = flags.is_archived {
            participant.is_archived = archived;
        }
        conversation.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        summary: LastMessage,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let Some(conversation) = inner.conversations.get_mut(&conversation_id) else {
            return Ok(false);
        };
        conversation.message_count += 1;
        conversation.updated_at = summary.sent_at;
        for participant in conversation
            .participants
            .iter_mut()
            .filter(|p| p.user_id != sender_id)
        {
            participant.unread_count += 1;
        }
        conversation.last_message = Some(summary);
        Ok(true)
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut inner = self.lock()?;
        let Some(conversation) = inner.conversations.get_mut(&conversation_id) else {
            return Ok(0);
        };
        let Some(participant) = conversation
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
        else {
            return Ok(0);
        };
        if at > participant.last_read_at {
            participant.last_read_at = at;
        }
        participant.unread_count = 0;
        conversation.updated_at = at;
        Ok(1)
    }

    async fn unread_total(&self, user_id: Uuid) -> AppResult<i64> {
        let inner = self.lock()?;
        Ok(inner
            .conversations
            .values()
            .filter_map(|c| c.participant(user_id))
            .filter(|p| !p.is_archived)
            .map(|p| i64::from(p.unread_count))
            .sum())
    }
}

#[async_trait::async_trait]
impl MessageRepository for MemoryStore {
    async fn insert(&self, message: Message) -> AppResult<()> {
        let mut inner = self.lock()?;
        inner
            .message_order
            .entry(message.conversation_id)
            .or_default()
            .push(message.id);
        inner.messages.insert(message.id, message);
        Ok(())
    }

    async fn find(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let inner = self.lock()?;
        Ok(inner.messages.get(&message_id).cloned())
    }

    async fn list_page(
        &self,
        conversation_id: Uuid,
        before: Option<Uuid>,
        limit: usize,
    ) -> AppResult<Vec<Message>> {
        let inner = self.lock()?;
        let Some(order) = inner.message_order.get(&conversation_id) else {
            return Ok(Vec::new());
        };
        let upper = before
            .and_then(|cursor| order.iter().position(|id| *id == cursor))
            .unwrap_or(order.len());
        Ok(order[..upper]
            .iter()
            .rev()
            .filter_map(|id| inner.messages.get(id))
            .filter(|m| !m.is_deleted)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_edit(
        &self,
        message_id: Uuid,
        previous: EditRecord,
        new_content: String,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let mut inner = self.lock()?;
        let Some(message) = inner.messages.get_mut(&message_id) else {
            return Ok(None);
        };
        if message.is_deleted {
            return Ok(None);
        }
        message.edit_history.push(previous);
        message.content = new_content;
        message.is_edited = true;
        message.updated_at = at;
        Ok(Some(message.clone()))
    }

    async fn soft_delete(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        tombstone: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let Some(message) = inner.messages.get_mut(&message_id) else {
            return Ok(false);
        };
        if message.sender_id != sender_id || message.is_deleted {
            return Ok(false);
        }
        message.is_deleted = true;
        message.content = tombstone.to_string();
        message.updated_at = at;
        Ok(true)
    }

    async fn add_reaction(&self, message_id: Uuid, reaction: Reaction) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let Some(message) = inner.messages.get_mut(&message_id) else {
            return Ok(false);
        };
        if message.has_reaction(reaction.user_id, &reaction.emoji) {
            return Ok(false);
        }
        message.updated_at = reaction.created_at;
        message.reactions.push(reaction);
        Ok(true)
    }

    async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let Some(message) = inner.messages.get_mut(&message_id) else {
            return Ok(false);
        };
        let before = message.reactions.len();
        message
            .reactions
            .retain(|r| !(r.user_id == user_id && r.emoji == emoji));
        let removed = message.reactions.len() < before;
        if removed {
            message.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn mark_read_fanout(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut inner = self.lock()?;
        let ids = inner
            .message_order
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        let mut touched = 0u64;
        for id in ids {
            if let Some(message) = inner.messages.get_mut(&id) {
                if !message.is_read_by(user_id) {
                    message.read_by.push(ReadReceipt {
                        user_id,
                        read_at: at,
                    });
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn search(
        &self,
        conversation_ids: &[Uuid],
        query: &str,
        limit: usize,
    ) -> AppResult<Vec<Message>> {
        let inner = self.lock()?;
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, Message)> = Vec::new();
        for conversation_id in conversation_ids {
            let Some(order) = inner.message_order.get(conversation_id) else {
                continue;
            };
            for id in order {
                let Some(message) = inner.messages.get(id) else {
                    continue;
                };
                if message.is_deleted {
                    continue;
                }
                let haystack = message.content.to_lowercase();
                let score: usize = terms
                    .iter()
                    .map(|term| haystack.matches(term.as_str()).count())
                    .sum();
                if score > 0 {
                    scored.push((score, message.clone()));
                }
            }
        }
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.created_at.cmp(&a.1.created_at))
        });
        Ok(scored.into_iter().take(limit).map(|(_, m)| m).collect())
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        let inner = self.lock()?;
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn search_users(&self, query: Option<&str>) -> AppResult<Vec<UserProfile>> {
        let inner = self.lock()?;
        let needle = query.map(str::to_lowercase);
        let mut out: Vec<UserProfile> = inner
            .users
            .values()
            .filter(|u| match &needle {
                Some(needle) => {
                    u.name.to_lowercase().contains(needle)
                        || u.email
                            .as_deref()
                            .is_some_and(|email| email.to_lowercase().contains(needle))
                }
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
