//! The relay event loop.
//!
//! One task owns the client registry and consumes every connect,
//! disconnect and signaling event in arrival order over an mpsc channel.
//! HTTP handlers and socket tasks never touch the registry directly; they
//! hold a [`RelayHandle`] clone.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::model::client::{Client, ClientId};
use crate::model::message::{Envelope, SignalMessage};
use crate::model::registry::Registry;

/// Clients that miss heartbeats for this long get evicted.
const ALIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the eviction sweep runs.
const EXPIRE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Events fed into the relay loop by connection and handler tasks.
pub enum RelayEvent {
    /// A new WebSocket connection announced itself.
    Connect(Client),

    /// A frame arrived from a connected client.
    Message(ClientId, SignalMessage),

    /// A client's socket closed.
    Disconnect(ClientId),

    /// The peers endpoint wants the current registry size.
    PeerCount(oneshot::Sender<usize>),
}

/// Cloneable handle the rest of the process uses to talk to the relay.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayEvent>,
}

impl RelayHandle {
    pub fn connect(&self, client: Client) {
        let _ = self.tx.send(RelayEvent::Connect(client));
    }

    pub fn message(&self, from: ClientId, message: SignalMessage) {
        let _ = self.tx.send(RelayEvent::Message(from, message));
    }

    pub fn disconnect(&self, id: ClientId) {
        let _ = self.tx.send(RelayEvent::Disconnect(id));
    }

    /// Current number of registered clients. Answers 0 if the relay task
    /// is gone, which only happens during shutdown.
    pub async fn peer_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(RelayEvent::PeerCount(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Spawn the relay loop and return a handle to it.
pub fn start() -> RelayHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rx));
    RelayHandle { tx }
}

async fn run(mut rx: mpsc::UnboundedReceiver<RelayEvent>) {
    let mut registry = Registry::new();
    let mut sweep = tokio::time::interval(EXPIRE_CHECK_INTERVAL);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => handle_event(&mut registry, event),
                // All handles dropped; nothing can reach the registry anymore.
                None => return,
            },
            _ = sweep.tick() => expire_stale(&mut registry),
        }
    }
}

fn handle_event(registry: &mut Registry, event: RelayEvent) {
    match event {
        RelayEvent::Connect(client) => handle_connect(registry, client),
        RelayEvent::Message(from, message) => handle_message(registry, from, message),
        RelayEvent::Disconnect(id) => {
            if let Some(client) = registry.unregister(id) {
                info!("Client({}) disconnected: {}", *id, client.peer_id());
            }
        }
        RelayEvent::PeerCount(reply) => {
            let _ = reply.send(registry.count());
        }
    }
}

fn handle_connect(registry: &mut Registry, client: Client) {
    if let Some(existing) = registry.by_peer_id(client.peer_id()) {
        if existing.token() != client.token() {
            warn!(
                "Client({}) rejected, id {} already taken",
                *client.id,
                client.peer_id()
            );
            client.send(SignalMessage::id_taken());
            // Dropping the client closes its outbound channel and with it
            // the socket. The existing session is undisturbed.
            return;
        }

        // Same id, same token: a reconnect. The replaced transport closes
        // when its entry drops, and its late Disconnect event misses the
        // new entry by identity.
        let old_id = existing.id;
        registry.unregister(old_id);
        info!(
            "Client({}) reconnected as Client({})",
            *old_id, *client.id
        );
    }

    info!("Client({}) connected: {}", *client.id, client.peer_id());
    client.send(SignalMessage::Open);
    registry.register(client);
}

fn handle_message(registry: &mut Registry, from: ClientId, message: SignalMessage) {
    match message {
        SignalMessage::Heartbeat => {
            if let Some(client) = registry.by_id_mut(from) {
                client.touch();
            }
        }
        message @ (SignalMessage::Offer(_)
        | SignalMessage::Answer(_)
        | SignalMessage::Candidate(_)
        | SignalMessage::Leave(_)
        | SignalMessage::Expire(_)) => forward(registry, from, message),
        other => {
            // OPEN, ID-TAKEN and ERROR only ever originate on the server.
            debug!("Client({}) sent server-only {}, dropping", *from, other.label());
        }
    }
}

/// Rewrite `src` to the sender's peer id and pass the message to its
/// destination. Undeliverable negotiation messages bounce back as EXPIRE.
fn forward(registry: &mut Registry, from: ClientId, mut message: SignalMessage) {
    let Some(src) = registry.by_id(from).map(|c| c.peer_id().to_string()) else {
        // A connection that lost duplicate-id arbitration can still push
        // frames until its socket finishes closing.
        debug!("dropping {} from unregistered connection", message.label());
        return;
    };

    let label = message.label();
    let should_expire = message.should_expire();

    let dst = match message.envelope_mut() {
        Some(envelope) => {
            envelope.src = Some(src.clone());
            envelope.dst.clone()
        }
        None => None,
    };

    let Some(dst) = dst else {
        debug!("Client({}) sent {} without destination", *from, label);
        return;
    };

    if let Some(target) = registry.by_peer_id(&dst) {
        if target.send(message) {
            debug!("relayed {} from {} to {}", label, src, dst);
            return;
        }
    }

    debug!("destination {} unavailable for {}", dst, label);
    if should_expire {
        if let Some(sender) = registry.by_id(from) {
            sender.send(SignalMessage::Expire(Envelope {
                src: Some(dst),
                dst: Some(src),
                payload: None,
            }));
        }
    }
}

fn expire_stale(registry: &mut Registry) {
    for client in registry.drain_stale(ALIVE_TIMEOUT) {
        info!("Client({}) timed out: {}", *client.id, client.peer_id());
    }
}
