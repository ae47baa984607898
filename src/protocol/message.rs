use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Server-generated connection identifier
pub type ClientId = Uuid;

/// App scope of dashboard rooms, which are not bound to any app
pub const DEFAULT_APP_ID: i64 = 0;

/// Appended to `broadcast.type` when a message is relayed to peers
pub const BROADCAST_TYPE_SUFFIX: &str = "/remote";

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownDiscriminant {
    pub kind: &'static str,
    pub value: u8,
}

/// Errors that make an inbound frame impossible to correlate
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Verb of a protocol message
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::FromRepr,
    strum_macros::EnumIter,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Signal {
    Ping = 0,
    Enter = 1,
    Leave = 2,
    CreateState = 3,
    DeleteState = 4,
    UpdateState = 5,
    MoveState = 6,
    CreateOrUpdateState = 7,
    OnlyBroadcast = 8,
    PutState = 9,
}

/// Which store operation a state signal requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StateOp {
    Create,
    Delete,
    Update,
    Move,
    CreateOrUpdate,
    Put,
}

impl Signal {
    /// The state operation for the CREATE/DELETE/UPDATE/MOVE/CREATE_OR_UPDATE/PUT family
    pub fn state_op(self) -> Option<StateOp> {
        match self {
            Signal::CreateState => Some(StateOp::Create),
            Signal::DeleteState => Some(StateOp::Delete),
            Signal::UpdateState => Some(StateOp::Update),
            Signal::MoveState => Some(StateOp::Move),
            Signal::CreateOrUpdateState => Some(StateOp::CreateOrUpdate),
            Signal::PutState => Some(StateOp::Put),
            Signal::Ping | Signal::Enter | Signal::Leave | Signal::OnlyBroadcast => None,
        }
    }
}

impl TryFrom<u8> for Signal {
    type Error = UnknownDiscriminant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Signal::from_repr(value).ok_or(UnknownDiscriminant {
            kind: "signal",
            value,
        })
    }
}

impl From<Signal> for u8 {
    fn from(signal: Signal) -> Self {
        signal as u8
    }
}

/// Noun of a protocol message
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::FromRepr,
    strum_macros::EnumIter,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Target {
    #[default]
    Nothing = 0,
    Components = 1,
    Dependencies = 2,
    DragShadow = 3,
    DottedLineSquare = 4,
    DisplayName = 5,
    Apps = 6,
    Resource = 7,
    Action = 8,
}

impl Target {
    /// Targets served by the REST API; the hub only relays them
    pub fn is_relay_only(self) -> bool {
        matches!(self, Target::Apps | Target::Resource)
    }
}

impl TryFrom<u8> for Target {
    type Error = UnknownDiscriminant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Target::from_repr(value).ok_or(UnknownDiscriminant {
            kind: "target",
            value,
        })
    }
}

impl From<Target> for u8 {
    fn from(target: Target) -> Self {
        target as u8
    }
}

/// Option bit flags, sent by browsers as a signed 32-bit integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageOption(pub i32);

impl MessageOption {
    pub const BROADCAST_ROOM: i32 = 1;

    pub fn room_wide() -> Self {
        Self(Self::BROADCAST_ROOM)
    }

    /// Whether the relay should include the sender
    pub fn broadcasts_to_room(self) -> bool {
        self.0 & Self::BROADCAST_ROOM != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Broadcast {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// A decoded protocol message
///
/// `clientID` and `appID` are never read from the frame; they are stamped
/// from the connection that received it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "clientID", skip_deserializing)]
    pub client_id: ClientId,
    pub signal: Signal,
    #[serde(rename = "appID", skip_deserializing)]
    pub app_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub option: MessageOption,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: Target,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: Vec<Value>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,
    #[serde(skip)]
    rewritten: bool,
}

/// Clients send `null` for empty fields; treat it like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    pub fn new(signal: Signal, target: Target) -> Self {
        Self {
            client_id: Uuid::nil(),
            signal,
            app_id: DEFAULT_APP_ID,
            option: MessageOption::default(),
            target,
            payload: Vec::new(),
            broadcast: None,
            rewritten: false,
        }
    }

    /// Decode a raw frame received on a connection
    pub fn decode(client_id: ClientId, app_id: i64, raw: &str) -> Result<Self, ProtocolError> {
        let mut message: Message = serde_json::from_str(raw)?;
        message.client_id = client_id;
        message.app_id = app_id;
        Ok(message)
    }

    pub fn with_payload(mut self, payload: Vec<Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_broadcast(mut self, broadcast: Broadcast) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn with_option(mut self, option: MessageOption) -> Self {
        self.option = option;
        self
    }

    /// Mark the message as relayed by this hop, suffixing `broadcast.type`.
    /// Calling it again on the same message does nothing.
    pub fn rewrite_broadcast(&mut self) {
        if self.rewritten {
            return;
        }
        if let Some(broadcast) = self.broadcast.as_mut() {
            broadcast.kind.push_str(BROADCAST_TYPE_SUFFIX);
        }
        self.rewritten = true;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
