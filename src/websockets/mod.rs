// Public API
pub use dispatcher::{DispatchError, Filter};
pub use handler::{app_handler, dashboard_handler};
pub use socket::{
    Client, FrameSink, FrameStream, InboundFrame, MessageHandler, SocketError,
};

// Internal modules
mod dispatcher;
mod handler;
mod socket;
