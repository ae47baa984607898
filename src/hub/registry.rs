use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::room::{ClientHandle, Delivery, RoomKey};
use crate::protocol::ClientId;
use crate::state::StateBackend;

/// Registration seam between connection actors and the hub they joined
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn register(&self, client: ClientHandle);

    /// Remove a client and close its outbound queue. Returns false if the
    /// client was already gone.
    async fn unregister(&self, client_id: ClientId) -> bool;
}

/// Registry of connected clients for one kind of room, plus the backend that
/// persists that room kind's state.
pub struct Hub<B> {
    name: &'static str,
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
    backend: B,
}

impl<B: StateBackend> Hub<B> {
    pub fn new(name: &'static str, backend: B) -> Self {
        Self {
            name,
            clients: RwLock::new(HashMap::new()),
            backend,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Room of a registered client
    pub async fn context_of(&self, client_id: ClientId) -> Option<RoomKey> {
        let clients = self.clients.read().await;
        clients.get(&client_id).map(|client| client.room.clone())
    }

    /// Queue a frame for one client. A client whose queue is full is evicted.
    #[instrument(skip(self, frame), fields(hub = self.name))]
    pub async fn send_to(&self, client_id: ClientId, frame: String) -> bool {
        let delivery = {
            let clients = self.clients.read().await;
            match clients.get(&client_id) {
                Some(client) => client.try_deliver(frame),
                None => {
                    debug!(client_id = %client_id, "Dropping frame for unregistered client");
                    return false;
                }
            }
        };

        if delivery == Delivery::Queued {
            return true;
        }
        self.evict(&[client_id]).await;
        false
    }

    /// Queue a frame for every client in `room` except `exclude`.
    ///
    /// Each recipient gets exactly one copy. Recipients that cannot take the
    /// frame are evicted after the pass. Returns the number of copies queued.
    #[instrument(skip(self, room, frame), fields(hub = self.name, room = %room))]
    pub async fn broadcast(&self, room: &RoomKey, frame: &str, exclude: Option<ClientId>) -> usize {
        let mut delivered = 0;
        let mut stalled = Vec::new();
        {
            let clients = self.clients.read().await;
            for client in clients.values() {
                if client.room != *room || exclude == Some(client.id) {
                    continue;
                }
                match client.try_deliver(frame.to_string()) {
                    Delivery::Queued => delivered += 1,
                    Delivery::Full | Delivery::Closed => stalled.push(client.id),
                }
            }
        }

        if !stalled.is_empty() {
            self.evict(&stalled).await;
        }
        debug!(delivered, "Broadcast queued");
        delivered
    }

    async fn evict(&self, client_ids: &[ClientId]) {
        let mut clients = self.clients.write().await;
        for client_id in client_ids {
            if clients.remove(client_id).is_some() {
                warn!(hub = self.name, client_id = %client_id, "Evicting client that cannot keep up");
            }
        }
    }

    pub async fn room_size(&self, room: &RoomKey) -> usize {
        let clients = self.clients.read().await;
        clients.values().filter(|client| client.room == *room).count()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[async_trait]
impl<B: StateBackend> ClientRegistry for Hub<B> {
    async fn register(&self, client: ClientHandle) {
        info!(hub = self.name, client_id = %client.id, room = %client.room, "Client registered");
        let mut clients = self.clients.write().await;
        clients.insert(client.id, client);
    }

    async fn unregister(&self, client_id: ClientId) -> bool {
        let mut clients = self.clients.write().await;
        let removed = clients.remove(&client_id).is_some();
        if removed {
            info!(hub = self.name, client_id = %client_id, "Client unregistered");
        }
        removed
    }
}
