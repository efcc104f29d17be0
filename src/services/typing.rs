//! Ephemeral typing-indicator relay. Nothing here touches the store; a
//! missing receiver socket simply drops the signal.

use uuid::Uuid;

use crate::websocket::{ServerEvent, SessionRegistry};

pub struct TypingRelay {
    registry: SessionRegistry,
}

impl TypingRelay {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Forward a typing start/stop signal to the receiver, if online.
    /// Returns whether the signal reached a live socket.
    pub fn set_typing(&self, sender_id: Uuid, receiver_id: Uuid, typing: bool) -> bool {
        let event = ServerEvent::UserTyping {
            sender_id,
            receiver_id,
            typing,
        };
        match event.to_json() {
            Ok(frame) => self.registry.send_to(receiver_id, frame),
            Err(error) => {
                tracing::error!(%error, "failed to encode typing event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::Connection;
    use tokio::sync::mpsc;

    #[test]
    fn typing_signal_reaches_online_receiver_only() {
        let registry = SessionRegistry::new();
        let relay = TypingRelay::new(registry.clone());
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();

        assert!(!relay.set_typing(sender, receiver, true));

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.bind(receiver, Connection::new(tx));

        assert!(relay.set_typing(sender, receiver, true));
        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("user-typing"));
        assert!(frame.contains("true"));

        assert!(relay.set_typing(sender, receiver, false));
        let frame = rx.try_recv().unwrap();
        assert!(frame.contains("false"));
    }
}
