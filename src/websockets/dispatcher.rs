use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::socket::MessageHandler;
use crate::hub::{ClientRegistry, Hub, RoomKey};
use crate::protocol::{
    ClientId, Feedback, Message, Outcome, PayloadError, ProtocolError, Signal, StateOp, Target,
};
use crate::state::{StateBackend, StateMutation, StoreError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("client {0} is not registered")]
    UnknownClient(ClientId),

    #[error("payload item {index}: {source}")]
    InvalidPayload {
        index: usize,
        #[source]
        source: PayloadError,
    },

    #[error("payload item {index}: {source}")]
    Store {
        index: usize,
        #[source]
        source: StoreError,
    },
}

impl DispatchError {
    pub fn outcome(&self) -> Outcome {
        match self {
            DispatchError::Store {
                source: StoreError::Conflict { .. },
                ..
            } => Outcome::Conflict,
            _ => Outcome::Failed,
        }
    }
}

/// Routes decoded messages: applies state mutations through the hub's
/// backend, answers the sender and relays to the room.
pub struct Filter<B> {
    hub: Arc<Hub<B>>,
}

impl<B: StateBackend> Filter<B> {
    pub fn new(hub: Arc<Hub<B>>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<Hub<B>> {
        &self.hub
    }

    #[instrument(skip(self, message), fields(hub = self.hub.name(), client_id = %message.client_id, signal = %message.signal, target = %message.target))]
    pub async fn dispatch(&self, mut message: Message) -> Result<(), DispatchError> {
        let sender = message.client_id;
        let room = self
            .hub
            .context_of(sender)
            .await
            .ok_or(DispatchError::UnknownClient(sender))?;
        message.app_id = room.app_id;

        match message.signal {
            Signal::Ping => {
                self.reply(&message, Outcome::Ok, "").await;
            }
            Signal::Enter => {
                message.rewrite_broadcast();
                self.reply(&message, Outcome::Ok, "").await;
                self.relay(&mut message, &room).await;
            }
            Signal::Leave => {
                message.rewrite_broadcast();
                self.reply(&message, Outcome::Ok, "").await;
                self.relay(&mut message, &room).await;
                self.hub.unregister(sender).await;
            }
            Signal::OnlyBroadcast => {
                self.relay(&mut message, &room).await;
            }
            Signal::CreateState
            | Signal::DeleteState
            | Signal::UpdateState
            | Signal::MoveState
            | Signal::CreateOrUpdateState
            | Signal::PutState => {
                if let Some(op) = message.signal.state_op() {
                    self.apply_state(op, &mut message, &room).await?;
                }
            }
        }
        Ok(())
    }

    async fn apply_state(
        &self,
        op: StateOp,
        message: &mut Message,
        room: &RoomKey,
    ) -> Result<(), DispatchError> {
        if message.target == Target::Nothing {
            debug!("Nothing to apply");
            return Ok(());
        }
        message.rewrite_broadcast();

        if !message.target.is_relay_only() {
            if let Err(e) = self.apply_items(op, message).await {
                info!(error = %e, "State update rejected");
                self.reply(message, e.outcome(), &e.to_string()).await;
                return Err(e);
            }
        }

        self.reply(message, Outcome::Ok, "").await;
        self.relay(message, room).await;
        Ok(())
    }

    /// Apply payload items in order, stopping at the first failure.
    /// Items already applied stay applied.
    async fn apply_items(&self, op: StateOp, message: &Message) -> Result<(), DispatchError> {
        for (index, item) in message.payload.iter().enumerate() {
            let mutations = StateMutation::decode(message.app_id, op, message.target, item)
                .map_err(|source| DispatchError::InvalidPayload { index, source })?;
            for mutation in mutations {
                self.hub
                    .backend()
                    .apply(mutation)
                    .await
                    .map_err(|source| DispatchError::Store { index, source })?;
            }
        }
        Ok(())
    }

    async fn reply(&self, message: &Message, outcome: Outcome, error_message: &str) {
        let feedback = Feedback::new(message, outcome, error_message);
        match feedback.to_json() {
            Ok(frame) => {
                self.hub.send_to(message.client_id, frame).await;
            }
            Err(e) => warn!(error = %e, "Failed to serialize feedback"),
        }
    }

    /// Relay to the room, including the sender only when the option asks for it
    async fn relay(&self, message: &mut Message, room: &RoomKey) {
        message.rewrite_broadcast();
        let exclude = if message.option.broadcasts_to_room() {
            None
        } else {
            Some(message.client_id)
        };
        match message.to_json() {
            Ok(frame) => {
                self.hub.broadcast(room, &frame, exclude).await;
            }
            Err(e) => warn!(error = %e, "Failed to serialize relayed message"),
        }
    }
}

#[async_trait]
impl<B: StateBackend> MessageHandler for Filter<B> {
    async fn handle_message(
        &self,
        client_id: ClientId,
        app_id: i64,
        raw: String,
    ) -> Result<(), ProtocolError> {
        let message = Message::decode(client_id, app_id, &raw).map_err(|e| {
            warn!(client_id = %client_id, error = %e, "Dropping client after malformed frame");
            e
        })?;

        if let Err(e) = self.dispatch(message).await {
            debug!(client_id = %client_id, error = %e, "Dispatch finished with error");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ClientHandle;
    use crate::protocol::Broadcast;
    use crate::state::{AppStateBackend, DashboardBackend, TreeStateKind};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn join<B: StateBackend>(
        hub: &Hub<B>,
        room: &RoomKey,
    ) -> (ClientId, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        hub.register(ClientHandle::new(id, room.clone(), tx)).await;
        (id, rx)
    }

    fn next_json(rx: &mut mpsc::Receiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().expect("expected a frame")).unwrap()
    }

    fn update_button(sender: ClientId) -> Message {
        let mut message = Message::new(Signal::UpdateState, Target::Components)
            .with_payload(vec![json!({"displayName": "button1", "parentNode": "root"})])
            .with_broadcast(Broadcast::new("update", json!({})));
        message.client_id = sender;
        message
    }

    #[tokio::test]
    async fn test_update_replies_then_relays() {
        let hub = Arc::new(Hub::new("app", AppStateBackend::in_memory()));
        let filter = Filter::new(hub.clone());
        let room = RoomKey::new("inst", 3);
        let (a, mut rx_a) = join(&hub, &room).await;
        let (_b, mut rx_b) = join(&hub, &room).await;

        filter.dispatch(update_button(a)).await.unwrap();

        let feedback = next_json(&mut rx_a);
        assert_eq!(feedback["code"], "UPDATE_STATE_OK");
        assert_eq!(feedback["errorCode"], 0);
        assert!(rx_a.try_recv().is_err(), "sender is excluded from the relay");

        let relayed = next_json(&mut rx_b);
        assert_eq!(relayed["broadcast"]["type"], "update/remote");
        assert_eq!(relayed["appID"], 3);
        assert_eq!(relayed["clientID"], json!(a));

        let stored = hub
            .backend()
            .tree
            .get(3, TreeStateKind::Components, "button1")
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_dashboard_mutation_fails_without_relay() {
        let hub = Arc::new(Hub::new("dashboard", DashboardBackend));
        let filter = Filter::new(hub.clone());
        let room = RoomKey::new("inst", 0);
        let (a, mut rx_a) = join(&hub, &room).await;
        let (_b, mut rx_b) = join(&hub, &room).await;

        let result = filter.dispatch(update_button(a)).await;

        assert!(matches!(result, Err(DispatchError::Store { index: 0, .. })));
        assert_eq!(next_json(&mut rx_a)["code"], "UPDATE_STATE_FAILED");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_sender_is_dropped() {
        let hub = Arc::new(Hub::new("app", AppStateBackend::in_memory()));
        let filter = Filter::new(hub);

        let result = filter.dispatch(update_button(Uuid::new_v4())).await;

        assert!(matches!(result, Err(DispatchError::UnknownClient(_))));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_protocol_error() {
        let hub = Arc::new(Hub::new("app", AppStateBackend::in_memory()));
        let filter = Filter::new(hub.clone());
        let room = RoomKey::new("inst", 1);
        let (a, mut rx_a) = join(&hub, &room).await;

        let result = filter
            .handle_message(a, 1, r#"{"signal": 42}"#.to_string())
            .await;

        assert!(result.is_err());
        assert!(rx_a.try_recv().is_err(), "no feedback for protocol errors");
    }

    #[test]
    fn test_conflict_maps_to_conflict_outcome() {
        let conflict = DispatchError::Store {
            index: 1,
            source: StoreError::Conflict {
                expected: "input1".to_string(),
            },
        };
        assert_eq!(conflict.outcome(), Outcome::Conflict);
        assert_eq!(
            DispatchError::UnknownClient(Uuid::nil()).outcome(),
            Outcome::Failed
        );
    }
}
