use crate::{
    message::{ChartUpdate, ServerMessage},
    model::{ChartSnapshot, PriceSample},
};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of messages buffered per client before it starts lagging.
pub const DEFAULT_HUB_BUFFER: usize = 1024;

pub type ClientId = u64;

/// Lifecycle of one real-time client.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ClientState {
    /// Handshake in progress, not yet part of the fan-out set.
    Connecting,
    /// Receiving every published message.
    Open,
    /// Removed from the fan-out set; nothing is queued for it.
    Closed,
}

type ClientRegistry = Arc<Mutex<FnvHashMap<ClientId, ClientState>>>;

/// Fans real-time messages out to every open client.
///
/// Each client owns an independent [`broadcast::Receiver`], so a slow or closing client never
/// holds up delivery to the rest. A client that opens after a publish simply misses that
/// message.
#[derive(Debug, Clone)]
pub struct PriceHub {
    tx: broadcast::Sender<Arc<ServerMessage>>,
    clients: ClientRegistry,
    next_id: Arc<AtomicU64>,
}

impl Default for PriceHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_BUFFER)
    }
}

impl PriceHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            clients: Arc::new(Mutex::new(FnvHashMap::default())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a client whose connection is still being established.
    pub fn connect(&self) -> PendingClient {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().insert(id, ClientState::Connecting);

        PendingClient {
            guard: ClientGuard {
                id,
                clients: Arc::clone(&self.clients),
            },
            tx: self.tx.clone(),
        }
    }

    /// Register and immediately open a client.
    pub fn subscribe(&self) -> HubSubscription {
        self.connect().open()
    }

    pub fn client_state(&self, id: ClientId) -> ClientState {
        self.clients
            .lock()
            .get(&id)
            .copied()
            .unwrap_or(ClientState::Closed)
    }

    /// Number of clients currently in the fan-out set.
    pub fn connected_clients(&self) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|state| **state == ClientState::Open)
            .count()
    }

    /// Send `message` to every open client, returning how many received it.
    ///
    /// Publishing with no clients is not an error.
    pub fn publish(&self, message: ServerMessage) -> usize {
        let kind = message.kind().to_string();
        match self.tx.send(Arc::new(message)) {
            Ok(receivers) => {
                debug!(%kind, receivers, "broadcast real-time message");
                receivers
            }
            Err(_) => {
                debug!(%kind, "no real-time clients connected");
                0
            }
        }
    }

    pub fn publish_price(&self, sample: PriceSample) -> usize {
        self.publish(ServerMessage::PriceUpdate(sample))
    }

    pub fn publish_chart(&self, snapshot: ChartSnapshot) -> usize {
        self.publish(ServerMessage::ChartDataUpdate(ChartUpdate::from(snapshot)))
    }
}

/// Removes its client from the registry when dropped.
#[derive(Debug)]
struct ClientGuard {
    id: ClientId,
    clients: ClientRegistry,
}

impl ClientGuard {
    fn set_state(&self, state: ClientState) {
        if let Some(current) = self.clients.lock().get_mut(&self.id) {
            *current = state;
        }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.clients.lock().remove(&self.id);
        debug!(client = self.id, "real-time client closed");
    }
}

/// A client in [`ClientState::Connecting`].
#[derive(Debug)]
pub struct PendingClient {
    guard: ClientGuard,
    tx: broadcast::Sender<Arc<ServerMessage>>,
}

impl PendingClient {
    pub fn id(&self) -> ClientId {
        self.guard.id
    }

    /// Join the fan-out set. Only messages published from now on are received.
    pub fn open(self) -> HubSubscription {
        let rx = self.tx.subscribe();
        self.guard.set_state(ClientState::Open);
        debug!(client = self.guard.id, "real-time client open");

        HubSubscription {
            guard: self.guard,
            rx,
        }
    }
}

/// A client in [`ClientState::Open`]. Dropping it closes the client.
#[derive(Debug)]
pub struct HubSubscription {
    guard: ClientGuard,
    rx: broadcast::Receiver<Arc<ServerMessage>>,
}

impl HubSubscription {
    pub fn id(&self) -> ClientId {
        self.guard.id
    }

    /// Next published message, or `None` once the hub is gone.
    ///
    /// A client that falls behind skips the messages it missed and keeps going.
    pub async fn recv(&mut self) -> Option<Arc<ServerMessage>> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(client = self.guard.id, skipped, "real-time client lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published message without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ServerMessage>> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(client = self.guard.id, skipped, "real-time client lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}
