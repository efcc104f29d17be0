//! Message routing: validate, persist, then deliver live or fall back to
//! an offline notification.

use std::sync::Arc;

use crate::accounts::AccountDirectory;
use crate::error::{AppError, AppResult};
use crate::models::{EnrichedMessage, Message, MessageBody, MessagePayload, MessageStatus};
use crate::services::parse_account_id;
use crate::store::ChatStore;
use crate::websocket::{ServerEvent, SessionRegistry};

/// Result of routing one message: the enriched wire form (carrying the
/// client's tempId when one was supplied) and whether it reached a live
/// socket.
#[derive(Debug)]
pub struct SendOutcome {
    pub message: EnrichedMessage,
    pub delivered: bool,
}

pub struct MessageRouter {
    store: Arc<dyn ChatStore>,
    accounts: Arc<dyn AccountDirectory>,
    registry: SessionRegistry,
}

impl MessageRouter {
    pub fn new(
        store: Arc<dyn ChatStore>,
        accounts: Arc<dyn AccountDirectory>,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            store,
            accounts,
            registry,
        }
    }

    /// Route one message end to end. The message is durable before any
    /// delivery attempt, and its status is advanced to `delivered` before
    /// the receiving socket sees it, so a crash between the two steps
    /// leaves the message behind rather than ahead of its receipt state.
    pub async fn send(&self, payload: &MessagePayload) -> AppResult<SendOutcome> {
        let sender_id = parse_account_id(&payload.sender_id, "senderId")?;
        let receiver_id = parse_account_id(&payload.receiver_id, "receiverId")?;
        if sender_id == receiver_id {
            return Err(AppError::Validation(
                "cannot send a message to yourself".to_string(),
            ));
        }

        let body = MessageBody::from_payload(payload)?;

        let conversation = self
            .store
            .find_or_create_conversation(sender_id, receiver_id)
            .await?;
        let mut message = Message::new(conversation.id, sender_id, body);
        self.store.insert_message(&message).await?;
        self.store.touch_conversation(conversation.id).await?;

        let sender_profile = self.accounts.lookup(sender_id).await?;

        let delivered = match self.registry.route_to(receiver_id) {
            Some(connection) => {
                // Durable first: the receiver must never see a message the
                // store still considers merely sent.
                if self
                    .store
                    .advance_status(message.id, MessageStatus::Delivered)
                    .await?
                {
                    message.status = MessageStatus::Delivered;
                }
                let enriched = EnrichedMessage::from_message(
                    &message,
                    receiver_id,
                    sender_profile.as_ref(),
                    payload.temp_id.clone(),
                );
                let frame = ServerEvent::ReceiveMessage(enriched)
                    .to_json()
                    .map_err(|_| AppError::Internal)?;
                if !connection.send(frame) {
                    tracing::debug!(receiver_id = %receiver_id, "receiver socket closed mid-send");
                    false
                } else {
                    true
                }
            }
            None => {
                let notification = ServerEvent::NewMessageNotification {
                    sender_id,
                    message: message.body.preview(),
                    timestamp: message.created_at,
                };
                if let Ok(frame) = notification.to_json() {
                    self.registry.broadcast(&frame);
                }
                false
            }
        };

        let enriched = EnrichedMessage::from_message(
            &message,
            receiver_id,
            sender_profile.as_ref(),
            payload.temp_id.clone(),
        );
        Ok(SendOutcome {
            message: enriched,
            delivered,
        })
    }
}
