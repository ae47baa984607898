// Library crate for the state sync hub
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod hub;
pub mod protocol;
pub mod routes;
pub mod shared;
pub mod state;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::{ConnectionConfig, ServerConfig};
pub use hub::{ClientRegistry, Hub, RoomKey};
pub use protocol::{Feedback, Message, Signal, Target};
pub use routes::router;
pub use shared::{AppError, AppState};
pub use websockets::{Client, Filter, MessageHandler};
