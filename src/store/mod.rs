//! Conversation store: the single source of truth for message ordering and
//! delivery status. The trait seam keeps the router, receipt tracker and
//! aggregator testable without a database and the backing store swappable.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Conversation, Message, MessageStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Idempotent resolution of the conversation for an unordered pair.
    /// Safe under concurrent callers for the same pair.
    async fn find_or_create_conversation(&self, a: Uuid, b: Uuid) -> AppResult<Conversation>;

    /// Lookup-only variant used by read paths that must not create.
    async fn conversation_for_pair(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>>;

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>>;

    /// Bump `updated_at`, invoked on every new message.
    async fn touch_conversation(&self, conversation_id: Uuid) -> AppResult<()>;

    async fn insert_message(&self, message: &Message) -> AppResult<()>;

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>>;

    /// Conditionally advance delivery status. Returns whether a row changed;
    /// a transition to an equal or lower rank is a no-op, so racing writers
    /// can never regress a status.
    async fn advance_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool>;

    /// One page of messages, newest first, plus the conversation total.
    async fn messages_page(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Message>, i64)>;

    /// All conversations the account participates in, most recent first.
    async fn conversations_for(&self, account_id: Uuid) -> AppResult<Vec<Conversation>>;

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>>;

    /// Messages sent by the partner that the reader has not read yet.
    async fn unread_count(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<i64>;

    /// IDs of not-yet-read messages from `sender_id`, oldest first; feeds
    /// the bulk mark-read path at the history-fetch boundary.
    async fn unread_from(&self, conversation_id: Uuid, sender_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn delete_message(&self, message_id: Uuid) -> AppResult<()>;
}
