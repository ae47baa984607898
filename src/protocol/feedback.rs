use serde::{Deserialize, Serialize};

use super::message::{Broadcast, ClientId, Message, Signal, Target};

/// Outcome reported back to the sender of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Ok,
    Failed,
    Conflict,
}

impl Outcome {
    pub fn error_code(self) -> i32 {
        match self {
            Outcome::Ok => 0,
            Outcome::Failed => 1,
            Outcome::Conflict => 2,
        }
    }
}

/// Unicast reply delivered only to the originating client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
    pub signal: Signal,
    pub target: Target,
    /// `<SIGNAL>_<OUTCOME>`, e.g. `UPDATE_STATE_OK`
    pub code: String,
    pub error_code: i32,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Broadcast>,
}

impl Feedback {
    pub fn new(message: &Message, outcome: Outcome, error_message: impl Into<String>) -> Self {
        Self {
            client_id: message.client_id,
            signal: message.signal,
            target: message.target,
            code: format!("{}_{}", message.signal, outcome),
            error_code: outcome.error_code(),
            error_message: error_message.into(),
            broadcast: message.broadcast.clone(),
        }
    }

    pub fn ok(message: &Message) -> Self {
        Self::new(message, Outcome::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == Outcome::Ok.error_code()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
