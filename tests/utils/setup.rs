#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use statehub::{
    hub::{ClientHandle, ClientRegistry, Hub, RoomKey},
    protocol::ClientId,
    state::AppStateBackend,
    websockets::Filter,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const INSTANCE_ID: &str = "instance-1";
pub const APP_ID: i64 = 7;

pub struct TestSetup {
    pub hub: Arc<Hub<AppStateBackend>>,
    pub filter: Filter<AppStateBackend>,
    pub room: RoomKey,
    pub clients: Vec<(String, ClientId)>,
    inboxes: Mutex<HashMap<String, mpsc::Receiver<String>>>,
}

impl TestSetup {
    pub fn client_id(&self, name: &str) -> ClientId {
        self.clients
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
            .unwrap_or_else(|| panic!("no client named {}", name))
    }

    pub fn backend(&self) -> &AppStateBackend {
        self.hub.backend()
    }

    /// Take the next queued frame for a client, if any
    pub async fn consume_frame_for(&self, name: &str) -> Option<String> {
        let mut inboxes = self.inboxes.lock().await;
        inboxes.get_mut(name)?.try_recv().ok()
    }

    /// Drain every queued frame for a client
    pub async fn frames_for(&self, name: &str) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.consume_frame_for(name).await {
            frames.push(frame);
        }
        frames
    }

    pub async fn clear_frames(&self) {
        for (name, _) in &self.clients {
            self.frames_for(name).await;
        }
    }
}

pub struct TestSetupBuilder {
    clients: Vec<(String, RoomKey)>,
    backend: Option<AppStateBackend>,
    queue_capacity: usize,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            clients: vec![],
            backend: None,
            queue_capacity: 64,
        }
    }

    pub fn with_clients(mut self, names: Vec<&str>) -> Self {
        let room = RoomKey::new(INSTANCE_ID, APP_ID);
        self.clients
            .extend(names.into_iter().map(|n| (n.to_string(), room.clone())));
        self
    }

    pub fn with_two_clients(self) -> Self {
        self.with_clients(vec!["alice", "bob"])
    }

    pub fn with_three_clients(self) -> Self {
        self.with_clients(vec!["alice", "bob", "carol"])
    }

    /// A client in a different room of the same hub
    pub fn with_client_in(mut self, name: &str, room: RoomKey) -> Self {
        self.clients.push((name.to_string(), room));
        self
    }

    pub fn with_backend(mut self, backend: AppStateBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub async fn build(self) -> TestSetup {
        let backend = self.backend.unwrap_or_else(AppStateBackend::in_memory);
        let hub = Arc::new(Hub::new("app", backend));
        let filter = Filter::new(hub.clone());

        let mut clients = Vec::new();
        let mut inboxes = HashMap::new();
        for (name, room) in self.clients {
            let id = Uuid::new_v4();
            let (tx, rx) = mpsc::channel(self.queue_capacity);
            hub.register(ClientHandle::new(id, room, tx)).await;
            clients.push((name.clone(), id));
            inboxes.insert(name, rx);
        }

        TestSetup {
            hub,
            filter,
            room: RoomKey::new(INSTANCE_ID, APP_ID),
            clients,
            inboxes: Mutex::new(inboxes),
        }
    }
}
