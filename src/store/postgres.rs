use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, MediaAttachment, Message, MessageBody, MessageStatus};
use crate::store::ChatStore;

// Rank comparison mirrors MessageStatus's Ord; keeps the conditional
// advance in one round trip so racing writers can never regress a status.
const ADVANCE_STATUS_SQL: &str = "UPDATE messages SET status = $2 \
     WHERE id = $1 \
       AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END) \
         < (CASE $2 WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END)";

pub struct PgChatStore {
    db: Pool<Postgres>,
}

impl PgChatStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    fn conversation_from_row(row: &PgRow) -> Conversation {
        Conversation {
            id: row.get("id"),
            participant_a: row.get("participant_a"),
            participant_b: row.get("participant_b"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn message_from_row(row: &PgRow) -> AppResult<Message> {
        let id: Uuid = row.get("id");
        let message_type: String = row.get("message_type");
        let text_content: String = row.get("text_content");
        let Json(media): Json<Vec<MediaAttachment>> = row.get("media");
        let product_id: Option<Uuid> = row.get("product_id");
        let order_id: Option<Uuid> = row.get("order_id");
        let status_raw: String = row.get("status");
        let created_at: DateTime<Utc> = row.get("created_at");

        let body = match message_type.as_str() {
            "text" => MessageBody::Text { text: text_content },
            "image" | "video" => MessageBody::Media {
                kind: if message_type == "video" {
                    crate::models::MediaKind::Video
                } else {
                    crate::models::MediaKind::Image
                },
                attachments: media,
                caption: text_content,
            },
            "product-reference" => MessageBody::Product {
                product_id: product_id.ok_or_else(|| {
                    tracing::error!(message_id = %id, "product-reference row without product_id");
                    AppError::Internal
                })?,
                caption: text_content,
            },
            "order-reference" => MessageBody::Order {
                order_id: order_id.ok_or_else(|| {
                    tracing::error!(message_id = %id, "order-reference row without order_id");
                    AppError::Internal
                })?,
                caption: text_content,
            },
            other => {
                tracing::error!(message_id = %id, message_type = %other, "unknown message type in store");
                return Err(AppError::Internal);
            }
        };

        let status = MessageStatus::parse(&status_raw).ok_or_else(|| {
            tracing::error!(message_id = %id, status = %status_raw, "unknown status in store");
            AppError::Internal
        })?;

        Ok(Message {
            id,
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            body,
            status,
            created_at,
        })
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_or_create_conversation(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        let (pa, pb) = Conversation::canonical_pair(a, b);

        // Racing inserters for the same pair collide on the unique index;
        // the loser falls through to the select.
        sqlx::query(
            "INSERT INTO conversations (id, participant_a, participant_b) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (participant_a, participant_b) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(pa)
        .bind(pb)
        .execute(&self.db)
        .await?;

        let row = sqlx::query(
            "SELECT id, participant_a, participant_b, created_at, updated_at \
             FROM conversations WHERE participant_a = $1 AND participant_b = $2",
        )
        .bind(pa)
        .bind(pb)
        .fetch_one(&self.db)
        .await?;

        Ok(Self::conversation_from_row(&row))
    }

    async fn conversation_for_pair(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>> {
        let (pa, pb) = Conversation::canonical_pair(a, b);
        let row = sqlx::query(
            "SELECT id, participant_a, participant_b, created_at, updated_at \
             FROM conversations WHERE participant_a = $1 AND participant_b = $2",
        )
        .bind(pa)
        .bind(pb)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.as_ref().map(Self::conversation_from_row))
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, participant_a, participant_b, created_at, updated_at \
             FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.as_ref().map(Self::conversation_from_row))
    }

    async fn touch_conversation(&self, conversation_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        let (product_id, order_id) = match &message.body {
            MessageBody::Product { product_id, .. } => (Some(*product_id), None),
            MessageBody::Order { order_id, .. } => (None, Some(*order_id)),
            _ => (None, None),
        };

        sqlx::query(
            "INSERT INTO messages \
             (id, conversation_id, sender_id, message_type, text_content, media, product_id, order_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.body.kind_str())
        .bind(message.body.text())
        .bind(Json(message.body.attachments().to_vec()))
        .bind(product_id)
        .bind(order_id)
        .bind(message.status.as_str())
        .bind(message.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, conversation_id, sender_id, message_type, text_content, media, \
                    product_id, order_id, status, created_at \
             FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::message_from_row).transpose()
    }

    async fn advance_status(&self, message_id: Uuid, to: MessageStatus) -> AppResult<bool> {
        let result = sqlx::query(ADVANCE_STATUS_SQL)
            .bind(message_id)
            .bind(to.as_str())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn messages_page(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Message>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*)::bigint FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query(
            "SELECT id, conversation_id, sender_id, message_type, text_content, media, \
                    product_id, order_id, status, created_at \
             FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let messages = rows
            .iter()
            .map(Self::message_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((messages, total))
    }

    async fn conversations_for(&self, account_id: Uuid) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, participant_a, participant_b, created_at, updated_at \
             FROM conversations \
             WHERE participant_a = $1 OR participant_b = $1 \
             ORDER BY updated_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(Self::conversation_from_row).collect())
    }

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, conversation_id, sender_id, message_type, text_content, media, \
                    product_id, order_id, status, created_at \
             FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::message_from_row).transpose()
    }

    async fn unread_count(&self, conversation_id: Uuid, reader_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM messages \
             WHERE conversation_id = $1 AND sender_id <> $2 AND status <> 'read'",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn unread_from(&self, conversation_id: Uuid, sender_id: Uuid) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM messages \
             WHERE conversation_id = $1 AND sender_id = $2 AND status <> 'read' \
             ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn delete_message(&self, message_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
