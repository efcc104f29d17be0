//! End-to-end flows through the service layer with the in-memory store
//! and fake socket connections backed by unbounded channels.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use chat_service::accounts::InMemoryAccountDirectory;
use chat_service::config::Config;
use chat_service::models::{MediaAttachment, MediaKind, MessagePayload, MessageStatus};
use chat_service::state::AppState;
use chat_service::store::MemoryChatStore;
use chat_service::websocket::Connection;

struct Harness {
    state: AppState,
    accounts: Arc<InMemoryAccountDirectory>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryChatStore::new());
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let state = AppState::new(store, accounts.clone(), Config::test_defaults());
        Self { state, accounts }
    }

    fn register(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.register(id, name, None);
        id
    }

    /// Bind a fake socket for an account and return its outbound frames.
    fn connect(&self, account_id: Uuid) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.registry.bind(account_id, Connection::new(tx));
        rx
    }
}

fn text_payload(sender: Uuid, receiver: Uuid, text: &str) -> MessagePayload {
    MessagePayload {
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

fn frames(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(&frame).unwrap());
    }
    out
}

#[tokio::test]
async fn online_delivery_end_to_end() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut alice_rx = harness.connect(alice);
    let mut bob_rx = harness.connect(bob);
    frames(&mut alice_rx);
    frames(&mut bob_rx);

    let mut payload = text_payload(alice, bob, "hi bob");
    payload.temp_id = Some("tmp-9".to_string());
    let outcome = harness.state.router.send(&payload).await.unwrap();
    assert!(outcome.delivered);
    assert_eq!(outcome.message.status, MessageStatus::Delivered);
    assert_eq!(outcome.message.sender_name, "Alice");
    assert_eq!(outcome.message.temp_id.as_deref(), Some("tmp-9"));

    let received = frames(&mut bob_rx);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "receive-message");
    assert_eq!(received[0]["data"]["text"], "hi bob");
    assert_eq!(received[0]["data"]["status"], "delivered");
    assert_eq!(received[0]["data"]["tempId"], "tmp-9");

    // The sender socket gets nothing here; the ack is returned to the
    // caller, which the socket loop echoes as message-sent.
    assert!(frames(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn offline_receiver_triggers_notification_broadcast() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");
    let carol = harness.register("Carol");

    let mut alice_rx = harness.connect(alice);
    let mut carol_rx = harness.connect(carol);
    frames(&mut alice_rx);
    frames(&mut carol_rx);

    let outcome = harness
        .state
        .router
        .send(&text_payload(alice, bob, "are you there?"))
        .await
        .unwrap();
    assert!(!outcome.delivered);
    assert_eq!(outcome.message.status, MessageStatus::Sent);

    for rx in [&mut alice_rx, &mut carol_rx] {
        let received = frames(rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["event"], "new-message-notification");
        assert_eq!(received[0]["data"]["senderId"], alice.to_string());
        assert_eq!(received[0]["data"]["message"], "are you there?");
    }
}

#[tokio::test]
async fn read_receipt_reaches_original_sender() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut alice_rx = harness.connect(alice);
    frames(&mut alice_rx);

    let outcome = harness
        .state
        .router
        .send(&text_payload(alice, bob, "ping"))
        .await
        .unwrap();
    frames(&mut alice_rx);

    let receipt = harness
        .state
        .receipts
        .mark_read(outcome.message.id, bob)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.reader_id, bob);

    let received = frames(&mut alice_rx);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "message-read");
    assert_eq!(
        received[0]["data"]["messageId"],
        outcome.message.id.to_string()
    );

    // Second read of the same message is silent.
    assert!(harness
        .state
        .receipts
        .mark_read(outcome.message.id, bob)
        .await
        .unwrap()
        .is_none());
    assert!(frames(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn presence_roster_tracks_connect_and_disconnect() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut alice_rx = harness.connect(alice);

    let (tx, _bob_rx) = mpsc::unbounded_channel();
    let bob_conn = Connection::new(tx);
    let bob_conn_id = bob_conn.id;
    let online = harness.state.registry.bind(bob, bob_conn);
    assert!(online.contains(&alice) && online.contains(&bob));

    let received = frames(&mut alice_rx);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "user-connected");
    assert_eq!(received[0]["data"], bob.to_string());

    assert_eq!(harness.state.registry.unbind(bob_conn_id), Some(bob));
    let received = frames(&mut alice_rx);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "user-disconnected");
    assert!(!harness.state.registry.is_online(bob));
}

#[tokio::test]
async fn typing_indicator_relays_without_persistence() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut bob_rx = harness.connect(bob);
    frames(&mut bob_rx);

    assert!(harness.state.typing.set_typing(alice, bob, true));
    assert!(harness.state.typing.set_typing(alice, bob, false));

    let received = frames(&mut bob_rx);
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["event"], "user-typing");
    assert_eq!(received[0]["data"]["typing"], true);
    assert_eq!(received[1]["data"]["typing"], false);

    // Nothing was stored.
    let conversation = harness
        .state
        .store
        .conversation_for_pair(alice, bob)
        .await
        .unwrap();
    assert!(conversation.is_none());
}

#[tokio::test]
async fn summaries_reflect_traffic_and_reads() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    harness
        .state
        .router
        .send(&text_payload(bob, alice, "one"))
        .await
        .unwrap();
    let second = harness
        .state
        .router
        .send(&text_payload(bob, alice, "two"))
        .await
        .unwrap();

    let summaries = harness.state.summaries.summaries(alice).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].partner_name, "Bob");
    assert_eq!(summaries[0].last_message, "two");
    assert_eq!(summaries[0].unread, 2);

    let conversation = harness
        .state
        .store
        .conversation_for_pair(alice, bob)
        .await
        .unwrap()
        .unwrap();
    harness
        .state
        .receipts
        .mark_conversation_read(&conversation, alice)
        .await
        .unwrap();

    let summaries = harness.state.summaries.summaries(alice).await.unwrap();
    assert_eq!(summaries[0].unread, 0);

    let stored = harness
        .state
        .store
        .message(second.message.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, MessageStatus::Read);
}

#[tokio::test]
async fn media_message_preview_in_offline_notification() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut alice_rx = harness.connect(alice);
    frames(&mut alice_rx);

    let payload = MessagePayload {
        sender_id: alice.to_string(),
        receiver_id: bob.to_string(),
        kind: Some("image".to_string()),
        media: vec![MediaAttachment {
            kind: MediaKind::Image,
            url: "https://cdn.example.com/photo.jpg".to_string(),
            storage_id: "obj-7".to_string(),
            name: "photo.jpg".to_string(),
            size: 2048,
        }],
        ..Default::default()
    };
    let outcome = harness.state.router.send(&payload).await.unwrap();
    assert_eq!(outcome.message.kind, "image");

    let received = frames(&mut alice_rx);
    assert_eq!(received[0]["event"], "new-message-notification");
    assert_eq!(received[0]["data"]["message"], "Sent an image");
}

#[tokio::test]
async fn last_bind_wins_reroutes_delivery() {
    let harness = Harness::new();
    let alice = harness.register("Alice");
    let bob = harness.register("Bob");

    let mut old_rx = harness.connect(bob);
    let mut new_rx = harness.connect(bob);
    frames(&mut old_rx);
    frames(&mut new_rx);

    harness
        .state
        .router
        .send(&text_payload(alice, bob, "hello"))
        .await
        .unwrap();

    assert!(frames(&mut old_rx).is_empty());
    let received = frames(&mut new_rx);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "receive-message");
}
