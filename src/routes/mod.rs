use axum::routing::{delete, get, post};
use axum::Router;

use crate::logging;
use crate::state::AppState;
use crate::websocket::session::ws_handler;

pub mod chat;

pub fn build_router() -> Router<AppState> {
    let chat = Router::new()
        .route("/conversations", get(chat::list_conversations))
        .route(
            "/conversations/:partner_id/messages",
            get(chat::conversation_history),
        )
        .route("/messages", post(chat::send_message))
        .route("/messages/:message_id", delete(chat::delete_message))
        .route("/ws", get(ws_handler));

    let router = Router::new()
        .route("/health", get(chat::health))
        .nest("/api/v1/chat", chat);

    logging::add_tracing(router)
}
