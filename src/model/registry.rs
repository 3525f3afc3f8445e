//! In-memory bookkeeping of currently connected clients.

use std::time::{Duration, Instant};

use crate::model::client::{Client, ClientId};

/// The set of connected clients, keyed by connection identity.
///
/// All mutation happens on the relay task, so no interior locking is
/// needed. Membership is per connection instance: two entries may announce
/// the same textual peer id during a reconnect race, and only identity
/// comparison keeps them apart.
#[derive(Debug, Default)]
pub struct Registry {
    clients: Vec<Client>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Insert a client unless the same connection is already present.
    ///
    /// Returns `false` on the duplicate no-op.
    pub fn register(&mut self, client: Client) -> bool {
        if self.by_id(client.id).is_some() {
            return false;
        }
        self.clients.push(client);
        true
    }

    /// Remove and return the client with this identity. No-op when absent.
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        let index = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(index))
    }

    /// Number of currently registered clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn by_id(&self, id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn by_id_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    /// Look up by announced peer id, used for routing and duplicate-id
    /// arbitration.
    pub fn by_peer_id(&self, peer_id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.peer_id() == peer_id)
    }

    /// Remove and return every client whose last heartbeat is older than
    /// `timeout`.
    pub fn drain_stale(&mut self, timeout: Duration) -> Vec<Client> {
        let now = Instant::now();
        let (stale, live) = self
            .clients
            .drain(..)
            .partition(|c| now.duration_since(c.last_ping) > timeout);
        self.clients = live;
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::SignalMessage;
    use tokio::sync::mpsc;

    fn probe(peer_id: &str) -> Client {
        let (tx, _rx) = mpsc::unbounded_channel::<SignalMessage>();
        Client::new(peer_id, "token", tx)
    }

    #[test]
    fn count_tracks_registered_clients() {
        let mut registry = Registry::new();
        assert_eq!(registry.count(), 0);

        let a = probe("1");
        let b = probe("2");
        let a_id = a.id;

        registry.register(a);
        registry.register(b);
        assert_eq!(registry.count(), 2);

        registry.unregister(a_id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn double_register_is_a_noop() {
        let mut registry = Registry::new();
        let client = probe("1");

        assert!(registry.register(client.clone()));
        assert!(!registry.register(client));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn unregister_of_absent_client_is_a_noop() {
        let mut registry = Registry::new();
        registry.register(probe("1"));

        let never_registered = probe("2");
        assert!(registry.unregister(never_registered.id).is_none());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn membership_is_by_connection_not_by_peer_id() {
        let mut registry = Registry::new();
        let first = probe("7");
        let second = probe("7");
        let first_id = first.id;

        registry.register(first);
        registry.register(second);
        // Same announced id, different connections: both are members.
        assert_eq!(registry.count(), 2);

        registry.unregister(first_id);
        assert_eq!(registry.count(), 1);
        assert!(registry.by_peer_id("7").is_some());
    }

    #[test]
    fn drain_stale_keeps_fresh_clients() {
        let mut registry = Registry::new();
        let stale = probe("1");
        let stale_id = stale.id;
        registry.register(stale);

        std::thread::sleep(Duration::from_millis(50));
        registry.register(probe("2"));

        let drained = registry.drain_stale(Duration::from_millis(25));
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, stale_id);
        assert_eq!(registry.count(), 1);
        assert!(registry.by_peer_id("2").is_some());
    }
}
