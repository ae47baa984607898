#![allow(dead_code)]

use serde_json::{json, Value};

use statehub::{
    protocol::{MessageOption, ProtocolError, Signal, Target},
    websockets::MessageHandler,
};

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Push a raw frame through the filter as if `client` had sent it
    pub async fn send_raw(&self, client: &str, raw: &str) -> Result<(), ProtocolError> {
        let client_id = self.client_id(client);
        let room = self
            .hub
            .context_of(client_id)
            .await
            .unwrap_or_else(|| self.room.clone());
        self.filter
            .handle_message(client_id, room.app_id, raw.to_string())
            .await
    }

    pub async fn send(
        &self,
        client: &str,
        signal: Signal,
        target: Target,
        payload: Vec<Value>,
        broadcast_type: &str,
    ) {
        self.send_with_option(client, signal, target, payload, broadcast_type, MessageOption::default())
            .await;
    }

    pub async fn send_with_option(
        &self,
        client: &str,
        signal: Signal,
        target: Target,
        payload: Vec<Value>,
        broadcast_type: &str,
        option: MessageOption,
    ) {
        let frame = json!({
            "clientID": "",
            "signal": u8::from(signal),
            "appID": 0,
            "option": option.0,
            "target": u8::from(target),
            "payload": payload,
            "broadcast": {"type": broadcast_type, "payload": {}}
        });
        self.send_raw(client, &frame.to_string())
            .await
            .expect("frame should decode");
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn ping(&self, client: &str) {
        self.send(client, Signal::Ping, Target::Nothing, vec![], "ping")
            .await;
    }

    pub async fn enter(&self, client: &str) {
        self.send(client, Signal::Enter, Target::Nothing, vec![], "enter")
            .await;
    }

    pub async fn leave(&self, client: &str) {
        self.send(client, Signal::Leave, Target::Nothing, vec![], "leave")
            .await;
    }

    pub async fn update_components(&self, client: &str, names: &[&str]) {
        let payload = names
            .iter()
            .map(|name| json!({"displayName": name, "parentNode": "root", "type": "BUTTON_WIDGET"}))
            .collect();
        self.send(
            client,
            Signal::UpdateState,
            Target::Components,
            payload,
            "components/update",
        )
        .await;
    }

    /// Registers names the way the editor does: one item holding the list
    pub async fn create_display_names(&self, client: &str, names: &[&str]) {
        self.send(
            client,
            Signal::CreateState,
            Target::DisplayName,
            vec![json!(names)],
            "displayName/add",
        )
        .await;
    }

    pub async fn delete_display_names(&self, client: &str, names: &[&str]) {
        self.send(
            client,
            Signal::DeleteState,
            Target::DisplayName,
            vec![json!(names)],
            "displayName/remove",
        )
        .await;
    }

    pub async fn rename(&self, client: &str, before: &str, after: &str) {
        self.send(
            client,
            Signal::UpdateState,
            Target::DisplayName,
            vec![json!({"before": before, "after": after})],
            "displayName/update",
        )
        .await;
    }
}
