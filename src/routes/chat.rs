//! REST boundary for chat history, summaries, sending and deletion.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessagePayload};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub account_id: Uuid,
}

/// GET /api/v1/chat/conversations?accountId=...
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> AppResult<Json<Value>> {
    let summaries = state.summaries.summaries(query.account_id).await?;
    Ok(Json(json!({ "conversations": summaries })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub account_id: Uuid,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// GET /api/v1/chat/conversations/:partner_id/messages
///
/// Pages are fetched newest-first from the store, then reversed so the
/// client renders them in chronological order. Opening a page also marks
/// the partner's unread messages read.
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<HistoryPage>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(state.config.history_page_size)
        .clamp(1, 100);
    let offset = (page - 1) * limit;

    let conversation = state
        .store
        .conversation_for_pair(query.account_id, partner_id)
        .await?;

    let Some(conversation) = conversation else {
        // No conversation yet is an empty history, not an error.
        return Ok(Json(HistoryPage {
            messages: Vec::new(),
            pagination: Pagination {
                page,
                limit,
                total: 0,
                total_pages: 0,
            },
        }));
    };

    let (mut messages, total) = state.store.messages_page(conversation.id, limit, offset).await?;
    messages.reverse();

    let transitioned = state
        .receipts
        .mark_conversation_read(&conversation, query.account_id)
        .await?;
    if transitioned > 0 {
        tracing::debug!(
            conversation_id = %conversation.id,
            count = transitioned,
            "history fetch marked messages read"
        );
    }

    Ok(Json(HistoryPage {
        messages,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        },
    }))
}

/// POST /api/v1/chat/messages
///
/// Same routing path as the socket `send-message` event; used by clients
/// that upload media out of band and then send the message over HTTP.
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<MessagePayload>,
) -> AppResult<Json<Value>> {
    let outcome = state.router.send(&payload).await?;
    Ok(Json(json!({
        "message": outcome.message,
        "delivered": outcome.delivered,
    })))
}

/// DELETE /api/v1/chat/messages/:message_id?accountId=...
///
/// Only the original sender may delete, and deletion is permanent.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<AccountQuery>,
) -> AppResult<StatusCode> {
    let message = state
        .store
        .message(message_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if message.sender_id != query.account_id {
        return Err(AppError::Forbidden);
    }

    state.store.delete_message(message_id).await?;
    tracing::info!(message_id = %message_id, "message deleted by sender");
    Ok(StatusCode::NO_CONTENT)
}
