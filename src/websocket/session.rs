//! Per-socket task: upgrade, pump frames in both directions, dispatch
//! client events, and tear the session down on close.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::parse_account_id;
use crate::state::AppState;
use crate::websocket::{ClientEvent, Connection, ServerEvent};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct SessionState {
    connection: Connection,
    bound: Option<Uuid>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut session = SessionState {
        connection: Connection::new(tx),
        bound: None,
    };

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sink.send(WsMessage::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(&state, &mut session, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(%error, "socket read error");
                        break;
                    }
                }
            }
        }
    }

    if session.bound.is_some() {
        if let Some(account_id) = state.registry.unbind(session.connection.id) {
            tracing::info!(account_id = %account_id, "session closed");
        }
    }
}

async fn handle_frame(state: &AppState, session: &mut SessionState, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(error) => {
            tracing::debug!(%error, "dropping malformed client frame");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom(raw_id) => {
            let account_id = match parse_account_id(&raw_id, "accountId") {
                Ok(id) => id,
                Err(_) => {
                    tracing::warn!(raw_id = %raw_id, "join-room with invalid account id dropped");
                    return;
                }
            };

            let online = state.registry.bind(account_id, session.connection.clone());
            session.bound = Some(account_id);
            tracing::info!(account_id = %account_id, "session joined");
            send_event(session, &ServerEvent::OnlineUsers(online));
        }
        ClientEvent::SendMessage(payload) => match state.router.send(&payload).await {
            Ok(outcome) => {
                send_event(session, &ServerEvent::MessageSent(outcome.message));
            }
            Err(error) => {
                // Validation details go back to the client; everything else
                // stays generic.
                let message = match &error {
                    AppError::Validation(detail) => detail.clone(),
                    _ => {
                        tracing::error!(%error, "message routing failed");
                        "Failed to send message".to_string()
                    }
                };
                send_event(session, &ServerEvent::MessageError { error: message });
            }
        },
        ClientEvent::MarkAsRead(payload) => {
            let reader_id = match parse_account_id(&payload.reader_id, "readerId") {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!("mark-as-read with invalid reader id dropped");
                    return;
                }
            };
            match state.receipts.mark_read(payload.message_id, reader_id).await {
                Ok(_) => {}
                Err(AppError::NotFound) => {
                    tracing::warn!(message_id = %payload.message_id, "mark-as-read for unknown message");
                }
                Err(AppError::Forbidden) => {
                    tracing::warn!(message_id = %payload.message_id, reader_id = %reader_id, "mark-as-read refused for non-participant");
                }
                Err(error) => {
                    tracing::error!(%error, "mark-as-read failed");
                }
            }
        }
        ClientEvent::Typing(payload) => relay_typing(state, &payload, true),
        ClientEvent::StopTyping(payload) => relay_typing(state, &payload, false),
    }
}

fn relay_typing(state: &AppState, payload: &super::events::TypingPayload, typing: bool) {
    let (Ok(sender_id), Ok(receiver_id)) = (
        parse_account_id(&payload.sender_id, "senderId"),
        parse_account_id(&payload.receiver_id, "receiverId"),
    ) else {
        tracing::debug!("typing event with invalid ids dropped");
        return;
    };
    state.typing.set_typing(sender_id, receiver_id, typing);
}

fn send_event(session: &SessionState, event: &ServerEvent) {
    match event.to_json() {
        Ok(frame) => {
            let _ = session.connection.send(frame);
        }
        Err(error) => {
            tracing::error!(%error, event = event.event_name(), "failed to encode server event");
        }
    }
}
