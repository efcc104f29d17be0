//! Realtime session registry. One live connection per account; a later
//! bind for the same account supersedes the earlier one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub mod events;
pub mod session;

pub use events::{ClientEvent, ServerEvent};

/// Identifies a single socket lifetime, independent of the account bound
/// to it. Lets a superseded socket's teardown avoid unbinding its
/// replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound half of a socket. Payloads are pre-serialized so the registry
/// never serializes under its lock.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    sender: UnboundedSender<String>,
}

impl Connection {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// Queue a frame; returns false when the socket task has gone away.
    pub fn send(&self, payload: String) -> bool {
        self.sender.send(payload).is_ok()
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<Uuid, Connection>,
    online: HashSet<Uuid>,
}

/// Shared presence map. Cheap to clone; all clones see the same state.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().expect("session registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().expect("session registry lock poisoned")
    }

    /// Bind a connection to an account, superseding any existing binding,
    /// and announce the arrival to everyone else. Returns the full online
    /// list (including the new account) for the joining socket.
    pub fn bind(&self, account_id: Uuid, connection: Connection) -> Vec<Uuid> {
        if account_id.is_nil() {
            tracing::warn!("refusing to bind nil account id");
            return Vec::new();
        }

        let new_id = connection.id;
        let (online, peers, evicted) = {
            let mut inner = self.write();
            // A socket rebinding as a different account gives up its old
            // identity; without this the stale entry would stay online
            // forever.
            let evicted = inner
                .sessions
                .iter()
                .find_map(|(account, conn)| {
                    (conn.id == new_id && *account != account_id).then_some(*account)
                });
            if let Some(evicted) = evicted {
                inner.sessions.remove(&evicted);
                inner.online.remove(&evicted);
            }
            let superseded = inner.sessions.insert(account_id, connection);
            if superseded.is_some() {
                tracing::debug!(account_id = %account_id, "binding superseded an existing session");
            }
            inner.online.insert(account_id);
            let online: Vec<Uuid> = inner.online.iter().copied().collect();
            let peers: Vec<Connection> = inner
                .sessions
                .values()
                .filter(|c| c.id != new_id)
                .cloned()
                .collect();
            (online, peers, evicted)
        };

        if let Some(evicted) = evicted {
            if let Ok(frame) = ServerEvent::UserDisconnected(evicted).to_json() {
                for peer in &peers {
                    let _ = peer.send(frame.clone());
                }
            }
        }
        if let Ok(frame) = ServerEvent::UserConnected(account_id).to_json() {
            for peer in peers {
                let _ = peer.send(frame.clone());
            }
        }

        online
    }

    /// Drop the binding owned by this connection, if it still owns one.
    /// Returns the account that went offline. A superseded or never-bound
    /// connection unbinds nothing.
    pub fn unbind(&self, connection_id: ConnectionId) -> Option<Uuid> {
        let (departed, peers) = {
            let mut inner = self.write();
            let account_id = inner
                .sessions
                .iter()
                .find_map(|(account, conn)| (conn.id == connection_id).then_some(*account))?;
            inner.sessions.remove(&account_id);
            inner.online.remove(&account_id);
            let peers: Vec<Connection> = inner.sessions.values().cloned().collect();
            (account_id, peers)
        };

        if let Ok(frame) = ServerEvent::UserDisconnected(departed).to_json() {
            for peer in peers {
                let _ = peer.send(frame.clone());
            }
        }

        Some(departed)
    }

    /// Snapshot of the connection bound to an account, if any.
    pub fn route_to(&self, account_id: Uuid) -> Option<Connection> {
        self.read().sessions.get(&account_id).cloned()
    }

    /// Deliver one frame to an account. Returns false when the account is
    /// offline or its socket is gone.
    pub fn send_to(&self, account_id: Uuid, payload: String) -> bool {
        match self.route_to(account_id) {
            Some(connection) => connection.send(payload),
            None => false,
        }
    }

    /// Fan one frame out to every live connection, pruning sockets whose
    /// receiving task has exited.
    pub fn broadcast(&self, payload: &str) {
        let targets: Vec<(Uuid, Connection)> = {
            let inner = self.read();
            inner
                .sessions
                .iter()
                .map(|(account, conn)| (*account, conn.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (account, connection) in targets {
            if !connection.send(payload.to_string()) {
                dead.push((account, connection.id));
            }
        }

        if !dead.is_empty() {
            let mut inner = self.write();
            for (account, connection_id) in dead {
                if inner
                    .sessions
                    .get(&account)
                    .is_some_and(|c| c.id == connection_id)
                {
                    inner.sessions.remove(&account);
                    inner.online.remove(&account);
                }
            }
        }
    }

    pub fn is_online(&self, account_id: Uuid) -> bool {
        self.read().online.contains(&account_id)
    }

    pub fn online_accounts(&self) -> Vec<Uuid> {
        self.read().online.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    #[test]
    fn bind_returns_online_list_and_notifies_peers() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (conn_a, mut rx_a) = connection();
        let online = registry.bind(alice, conn_a);
        assert_eq!(online, vec![alice]);

        let (conn_b, _rx_b) = connection();
        let online = registry.bind(bob, conn_b);
        assert_eq!(online.len(), 2);
        assert!(online.contains(&alice) && online.contains(&bob));

        let frame = rx_a.try_recv().unwrap();
        assert!(frame.contains("user-connected"));
        assert!(frame.contains(&bob.to_string()));
    }

    #[test]
    fn nil_account_is_refused() {
        let registry = SessionRegistry::new();
        let (conn, _rx) = connection();
        assert!(registry.bind(Uuid::nil(), conn).is_empty());
        assert!(registry.online_accounts().is_empty());
    }

    #[test]
    fn superseded_connection_cannot_unbind_replacement() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();

        let (old_conn, _rx_old) = connection();
        let old_id = old_conn.id;
        registry.bind(alice, old_conn);

        let (new_conn, _rx_new) = connection();
        registry.bind(alice, new_conn);
        assert!(registry.is_online(alice));

        // The stale socket's teardown must not take the new session down.
        assert_eq!(registry.unbind(old_id), None);
        assert!(registry.is_online(alice));
    }

    #[test]
    fn rebinding_a_connection_as_another_account_evicts_the_first() {
        let registry = SessionRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let watcher = Uuid::new_v4();

        let (watch_conn, mut watch_rx) = connection();
        registry.bind(watcher, watch_conn);

        let (conn, _rx) = connection();
        let conn_id = conn.id;
        registry.bind(first, conn.clone());
        registry.bind(second, conn);

        assert!(!registry.is_online(first));
        assert!(registry.is_online(second));

        // The watcher sees the identity swap as disconnect + connect.
        let frames: Vec<String> = std::iter::from_fn(|| watch_rx.try_recv().ok()).collect();
        assert!(frames
            .iter()
            .any(|f| f.contains("user-disconnected") && f.contains(&first.to_string())));
        assert!(frames
            .iter()
            .any(|f| f.contains("user-connected") && f.contains(&second.to_string())));

        // Closing the socket now takes down only the current identity.
        assert_eq!(registry.unbind(conn_id), Some(second));
        assert!(registry.online_accounts().len() == 1);
    }

    #[test]
    fn unbind_notifies_remaining_peers() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (conn_a, mut rx_a) = connection();
        registry.bind(alice, conn_a);
        let (conn_b, _rx_b) = connection();
        let bob_conn_id = conn_b.id;
        registry.bind(bob, conn_b);
        rx_a.try_recv().unwrap();

        assert_eq!(registry.unbind(bob_conn_id), Some(bob));
        assert!(!registry.is_online(bob));
        let frame = rx_a.try_recv().unwrap();
        assert!(frame.contains("user-disconnected"));
    }

    #[test]
    fn broadcast_prunes_dead_connections() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let (conn, rx) = connection();
        registry.bind(alice, conn);
        drop(rx);

        registry.broadcast("{\"event\":\"ping\"}");
        assert!(!registry.is_online(alice));
        assert!(registry.route_to(alice).is_none());
    }
}
