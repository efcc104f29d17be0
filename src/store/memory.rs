use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Conversation, Message, MessageStatus};
use crate::store::ChatStore;

/// In-memory store for tests and local development. Messages live in a
/// single Vec in insertion order, which is also chronological order.
#[derive(Default)]
pub struct MemoryChatStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    conversations: HashMap<Uuid, Conversation>,
    by_pair: HashMap<(Uuid, Uuid), Uuid>,
    messages: Vec<Message>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("chat store lock poisoned")
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_or_create_conversation(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        let mut inner = self.lock();
        let pair = Conversation::canonical_pair(a, b);
        if let Some(id) = inner.by_pair.get(&pair) {
            return Ok(inner.conversations[id].clone());
        }
        let conversation = Conversation::new(a, b);
        inner.by_pair.insert(pair, conversation.id);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn conversation_for_pair(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>> {
        let inner = self.lock();
        let pair = Conversation::canonical_pair(a, b);
        Ok(inner
            .by_pair
            .get(&pair)
            .map(|id| inner.conversations[id].clone()))
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.lock().conversations.get(&conversation_id).cloned())
    }

    async fn touch_conversation(&self, conversation_id: Uuid) -> AppResult<()> {
        let mut inner = self.lock();
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        self.lock().messages.push(message.clone());
        Ok(())
    }

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned())
    }

    async fn advance_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool> {
        let mut inner = self.lock();
        if let Some(message) = inner.messages.iter_mut().find(|m| m.id == message_id) {
            if message.status < to {
                message.status = to;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn messages_page(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Message>, i64)> {
        let inner = self.lock();
        let all: Vec<&Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn conversations_for(&self, account_id: Uuid) -> AppResult<Vec<Conversation>> {
        let inner = self.lock();
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.involves(account_id))
            .cloned()
            .collect();
        conversations.sort_by(|x, y| y.updated_at.cmp(&x.updated_at));
        Ok(conversations)
    }

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .rev()
            .find(|m| m.conversation_id == conversation_id)
            .cloned())
    }

    async fn unread_count(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<i64> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.sender_id != reader_id
                    && m.status != MessageStatus::Read
            })
            .count() as i64)
    }

    async fn unread_from(&self, conversation_id: Uuid, sender_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.sender_id == sender_id
                    && m.status != MessageStatus::Read
            })
            .map(|m| m.id)
            .collect())
    }

    async fn delete_message(&self, message_id: Uuid) -> AppResult<()> {
        self.lock().messages.retain(|m| m.id != message_id);
        Ok(())
    }
}
