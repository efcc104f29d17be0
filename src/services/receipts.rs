//! Read-receipt tracking: monotonic status advancement plus the push that
//! tells the original sender their message was read.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, MessageStatus, ReadReceipt};
use crate::store::ChatStore;
use crate::websocket::{ServerEvent, SessionRegistry};

pub struct ReadReceiptTracker {
    store: Arc<dyn ChatStore>,
    registry: SessionRegistry,
}

impl ReadReceiptTracker {
    pub fn new(store: Arc<dyn ChatStore>, registry: SessionRegistry) -> Self {
        Self { store, registry }
    }

    /// Mark one message read on behalf of `reader_id`. Returns the receipt
    /// when a state change actually happened; `Ok(None)` covers the
    /// idempotent cases (already read, or the reader is the sender).
    /// A missing message is an error so callers can distinguish a stale ID
    /// from a benign repeat. Only the receiving party of the conversation
    /// may set `read`; anyone else is refused.
    pub async fn mark_read(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<Option<ReadReceipt>> {
        let message = self
            .store
            .message(message_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if message.sender_id == reader_id {
            return Ok(None);
        }

        let conversation = self
            .store
            .conversation(message.conversation_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(conversation_id = %message.conversation_id, "stored message without conversation");
                AppError::Internal
            })?;
        if conversation.partner_of(message.sender_id) != Some(reader_id) {
            return Err(AppError::Forbidden);
        }

        if !self
            .store
            .advance_status(message_id, MessageStatus::Read)
            .await?
        {
            return Ok(None);
        }

        let receipt = ReadReceipt {
            message_id,
            conversation_id: message.conversation_id,
            reader_id,
        };

        if let Ok(frame) = ServerEvent::MessageRead(receipt).to_json() {
            if !self.registry.send_to(message.sender_id, frame) {
                tracing::debug!(sender_id = %message.sender_id, "sender offline, read receipt not pushed");
            }
        }

        Ok(Some(receipt))
    }

    /// Mark every unread partner message in a conversation read, as done
    /// when the reader opens the chat history. Returns how many messages
    /// actually transitioned.
    pub async fn mark_conversation_read(
        &self,
        conversation: &Conversation,
        reader_id: Uuid,
    ) -> AppResult<usize> {
        let partner = match conversation.partner_of(reader_id) {
            Some(partner) => partner,
            None => return Err(AppError::Forbidden),
        };

        let unread = self.store.unread_from(conversation.id, partner).await?;
        let mut transitioned = 0;
        for message_id in unread {
            if self.mark_read(message_id, reader_id).await?.is_some() {
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }
}
