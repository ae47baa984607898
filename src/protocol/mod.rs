// Public API - wire schema shared by the hub, the filter and the clients
pub use feedback::{Feedback, Outcome};
pub use message::{
    Broadcast, ClientId, Message, MessageOption, ProtocolError, Signal, StateOp, Target,
    UnknownDiscriminant, BROADCAST_TYPE_SUFFIX, DEFAULT_APP_ID,
};
pub use payload::PayloadError;

// Internal modules
mod feedback;
mod message;
pub mod payload;
