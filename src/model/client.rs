use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use crate::model::message::SignalMessage;

/// One connected peer session.
///
/// The registry entry does not own the WebSocket; it holds the sending half
/// of the connection's outbound channel. Dropping the entry closes that
/// channel, which lets the connection's writer task finish and the socket
/// unwind.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    peer_id: String,
    token: String,
    pub(crate) last_ping: Instant,
    tx: UnboundedSender<SignalMessage>,
}

/// Process-unique connection serial.
///
/// Two sessions announcing the same textual peer id are still distinct
/// connection instances, and the registry tracks instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientId(u64);

impl Deref for ClientId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Client {
    pub fn new(
        peer_id: impl Into<String>,
        token: impl Into<String>,
        tx: UnboundedSender<SignalMessage>,
    ) -> Client {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
        let next_id = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        Client {
            id: ClientId(next_id),
            peer_id: peer_id.into(),
            token: token.into(),
            last_ping: Instant::now(),
            tx,
        }
    }

    /// The short textual identifier the client announced at connect time.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Opaque session credential presented at connect time.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Refresh the liveness timestamp. Called on every HEARTBEAT.
    pub fn touch(&mut self) {
        self.last_ping = Instant::now();
    }

    /// Queue a message on the client's outbound channel.
    ///
    /// Returns `false` when the connection's writer task is gone, which the
    /// relay treats the same as an absent destination.
    pub fn send(&self, message: SignalMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}
