use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::ClientId;

/// Broadcast scope: one builder instance, one app
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub instance_id: String,
    pub app_id: i64,
}

impl RoomKey {
    pub fn new(instance_id: impl Into<String>, app_id: i64) -> Self {
        Self {
            instance_id: instance_id.into(),
            app_id,
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance_id, self.app_id)
    }
}

/// Outcome of queueing a frame for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue at capacity; the client cannot keep up
    Full,
    /// Outbound task is gone
    Closed,
}

/// The hub's end of a connected client.
///
/// Holds the only sender of the client's outbound queue, so dropping the
/// handle closes the queue and ends the client's writer.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub room: RoomKey,
    outbound: mpsc::Sender<String>,
}

impl ClientHandle {
    pub fn new(id: ClientId, room: RoomKey, outbound: mpsc::Sender<String>) -> Self {
        Self { id, room, outbound }
    }

    pub fn try_deliver(&self, frame: String) -> Delivery {
        match self.outbound.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
