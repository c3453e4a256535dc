//! The subscriber hub (C10): in-process publish/subscribe fanning out
//! `trending_update`/`viral_alert` messages to connected WebSocket clients.
//!
//! Register/unregister/broadcast all funnel through one channel into a
//! single-threaded reconciliation loop that owns the client set, rather than
//! a lock-guarded map, since every mutation here also needs to run a
//! backpressure check (evict the client whose queue is full) atomically with
//! the set update.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::HubMessage;
use crate::monitoring::metrics::{HUB_CONNECTED_CLIENTS, HUB_EVICTED_CLIENTS_TOTAL};
use crate::processor::Broadcaster;

/// Outbound queue depth per client. A client that can't keep up with this
/// many unread broadcasts gets evicted rather than slow everyone else down.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// How often the server pings an idle client.
pub const PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(54);
/// A client that hasn't ponged within this window is considered dead.
pub const PONG_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
/// Inbound frames larger than this close the connection.
pub const MAX_INBOUND_FRAME_BYTES: usize = 512;

/// The hub's view of one connected client: an id and the sending half of its
/// bounded outbound queue. The receiving half lives with the actix-ws
/// connection task that actually writes frames to the socket.
pub struct ClientHandle {
    pub id: Uuid,
    pub sender: mpsc::Sender<Arc<str>>,
}

enum HubCommand {
    Register(ClientHandle),
    Unregister(Uuid),
    Broadcast(HubMessage),
}

/// A cheaply-cloneable handle to the hub's reconciliation loop.
#[derive(Clone)]
pub struct Hub {
    command_tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Spawns the reconciliation loop and returns a handle to it. The loop
    /// runs until every `Hub` clone (and thus every sender) is dropped.
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::reconciliation_loop(command_rx));
        Self { command_tx }
    }

    pub fn register(&self, client: ClientHandle) {
        let _ = self.command_tx.send(HubCommand::Register(client));
    }

    pub fn unregister(&self, id: Uuid) {
        let _ = self.command_tx.send(HubCommand::Unregister(id));
    }

    async fn reconciliation_loop(mut command_rx: mpsc::UnboundedReceiver<HubCommand>) {
        let mut clients: HashMap<Uuid, ClientHandle> = HashMap::new();

        while let Some(command) = command_rx.recv().await {
            match command {
                HubCommand::Register(client) => {
                    HUB_CONNECTED_CLIENTS.inc();
                    clients.insert(client.id, client);
                }
                HubCommand::Unregister(id) => {
                    if clients.remove(&id).is_some() {
                        HUB_CONNECTED_CLIENTS.dec();
                    }
                }
                HubCommand::Broadcast(message) => {
                    Self::fan_out(&mut clients, &message);
                }
            }
        }
    }

    /// Serialises `message` once and fans it out non-blockingly. A client
    /// whose queue is full is evicted — the backpressure policy is to drop
    /// the slow subscriber, never the message for everyone else.
    fn fan_out(clients: &mut HashMap<Uuid, ClientHandle>, message: &HubMessage) {
        let payload: Arc<str> = match serde_json::to_string(message) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(error = %e, "failed to encode hub message, dropping broadcast");
                return;
            }
        };

        let mut evicted = Vec::new();
        for (id, client) in clients.iter() {
            if let Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) =
                client.sender.try_send(payload.clone())
            {
                evicted.push(*id);
            }
        }

        for id in evicted {
            clients.remove(&id);
            HUB_CONNECTED_CLIENTS.dec();
            HUB_EVICTED_CLIENTS_TOTAL.inc();
            debug!(client_id = %id, "evicted client for backpressure");
        }
    }
}

impl Broadcaster for Hub {
    fn broadcast(&self, message: HubMessage) {
        let _ = self.command_tx.send(HubCommand::Broadcast(message));
    }
}
