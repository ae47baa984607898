use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::dispatcher::Filter;
use super::socket::Client;
use crate::config::ConnectionConfig;
use crate::hub::{ClientRegistry, RoomKey};
use crate::protocol::DEFAULT_APP_ID;
use crate::shared::AppState;
use crate::state::StateBackend;

/// WebSocket endpoint for dashboard rooms
/// GET /room/{instance_id}/dashboard
pub async fn dashboard_handler(
    ws: WebSocketUpgrade,
    Path(instance_id): Path<String>,
    State(app_state): State<AppState>,
) -> Response {
    info!(instance_id = %instance_id, "Dashboard connection requested");
    let room = RoomKey::new(instance_id, DEFAULT_APP_ID);
    upgrade(ws, room, app_state.dashboard, app_state.connection)
}

/// WebSocket endpoint for app editing rooms
/// GET /room/{instance_id}/app/{app_id}
pub async fn app_handler(
    ws: WebSocketUpgrade,
    Path((instance_id, app_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
) -> Response {
    let app_id = app_id.parse::<i64>().unwrap_or_else(|_| {
        warn!(instance_id = %instance_id, app_id = %app_id, "Unparsable app id, using the default app");
        DEFAULT_APP_ID
    });
    info!(instance_id = %instance_id, app_id, "App connection requested");
    let room = RoomKey::new(instance_id, app_id);
    upgrade(ws, room, app_state.apps, app_state.connection)
}

fn upgrade<B: StateBackend>(
    ws: WebSocketUpgrade,
    room: RoomKey,
    filter: Arc<Filter<B>>,
    config: ConnectionConfig,
) -> Response {
    ws.max_message_size(config.max_message_bytes)
        .on_upgrade(move |socket| serve_client(socket, room, filter, config))
}

/// Run one upgraded connection until it closes
async fn serve_client<B: StateBackend>(
    socket: WebSocket,
    room: RoomKey,
    filter: Arc<Filter<B>>,
    config: ConnectionConfig,
) {
    let client_id = Uuid::new_v4();
    info!(client_id = %client_id, room = %room, "WebSocket connection established");

    let (sink, stream) = socket.split();
    let registry: Arc<dyn ClientRegistry> = filter.hub().clone();
    let client = Client::new(client_id, room.clone(), registry, filter, config);

    match client.run(sink, stream).await {
        Ok(()) => info!(client_id = %client_id, room = %room, "WebSocket connection closed cleanly"),
        Err(e) => warn!(client_id = %client_id, room = %room, error = %e, "WebSocket connection dropped"),
    }
}
