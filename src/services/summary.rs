//! Per-account conversation summaries for the inbox view: who the partner
//! is, what was said last, and how many messages are still unread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::accounts::AccountDirectory;
use crate::error::AppResult;
use crate::store::ChatStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub partner_id: Uuid,
    pub partner_name: String,
    pub partner_avatar: Option<String>,
    /// Preview text of the latest message, empty for a fresh conversation.
    pub last_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sender_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub unread: i64,
}

pub struct SummaryAggregator {
    store: Arc<dyn ChatStore>,
    accounts: Arc<dyn AccountDirectory>,
}

impl SummaryAggregator {
    pub fn new(store: Arc<dyn ChatStore>, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { store, accounts }
    }

    /// Build the inbox for one account, most recently active conversation
    /// first. Conversations whose partner can no longer be resolved are
    /// skipped rather than failing the whole listing.
    pub async fn summaries(&self, account_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self.store.conversations_for(account_id).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let partner_id = match conversation.partner_of(account_id) {
                Some(partner) => partner,
                None => continue,
            };

            let partner = match self.accounts.lookup(partner_id).await? {
                Some(profile) => profile,
                None => {
                    tracing::warn!(partner_id = %partner_id, "skipping conversation with unresolvable partner");
                    continue;
                }
            };

            let last = self.store.last_message(conversation.id).await?;
            let unread = self.store.unread_count(conversation.id, account_id).await?;

            summaries.push(ConversationSummary {
                conversation_id: conversation.id,
                partner_id,
                partner_name: partner.display_name,
                partner_avatar: partner.avatar_url,
                last_message: last
                    .as_ref()
                    .map(|m| m.body.preview())
                    .unwrap_or_default(),
                last_sender_id: last.as_ref().map(|m| m.sender_id),
                last_message_at: last
                    .as_ref()
                    .map(|m| m.created_at)
                    .unwrap_or(conversation.updated_at),
                unread,
            });
        }

        summaries.sort_by(|x, y| y.last_message_at.cmp(&x.last_message_at));
        Ok(summaries)
    }
}
