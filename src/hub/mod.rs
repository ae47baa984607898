// Public API
pub use registry::{ClientRegistry, Hub};
pub use room::{ClientHandle, Delivery, RoomKey};

// Internal modules
mod registry;
mod room;
