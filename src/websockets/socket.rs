use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::hub::{ClientHandle, ClientRegistry, RoomKey};
use crate::protocol::{ClientId, ProtocolError};

/// What the connection loop needs from an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    /// Ping, pong or binary frame; only refreshes the read deadline
    Control,
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("write deadline exceeded")]
    WriteTimeout,

    #[error("no frame from peer within the read deadline")]
    ReadTimeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Write half of a client socket
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<(), SocketError>;

    async fn send_ping(&mut self) -> Result<(), SocketError>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Read half of a client socket
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Next inbound frame, or None once the peer has closed
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, SocketError>;
}

/// Handler for raw inbound text frames.
///
/// Returning an error ends the connection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(
        &self,
        client_id: ClientId,
        app_id: i64,
        raw: String,
    ) -> Result<(), ProtocolError>;
}

#[async_trait]
impl FrameSink for SplitSink<WebSocket, WsMessage> {
    async fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        self.send(WsMessage::Text(text))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SocketError> {
        self.send(WsMessage::Ping(Vec::new()))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(WsMessage::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl FrameStream for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, SocketError> {
        match self.next().await {
            Some(Ok(WsMessage::Text(text))) => Ok(Some(InboundFrame::Text(text))),
            Some(Ok(WsMessage::Binary(_) | WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                Ok(Some(InboundFrame::Control))
            }
            Some(Ok(WsMessage::Close(_))) | None => Ok(None),
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
        }
    }
}

/// One connected client.
///
/// The inbound loop runs on the caller's task; outbound frames are written by
/// a spawned task draining the client's bounded queue. Whichever side stops
/// first brings the other down, and the client is unregistered on the way out.
pub struct Client {
    pub id: ClientId,
    pub room: RoomKey,
    registry: Arc<dyn ClientRegistry>,
    handler: Arc<dyn MessageHandler>,
    config: ConnectionConfig,
}

impl Client {
    pub fn new(
        id: ClientId,
        room: RoomKey,
        registry: Arc<dyn ClientRegistry>,
        handler: Arc<dyn MessageHandler>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            id,
            room,
            registry,
            handler,
            config,
        }
    }

    /// Run the connection until either side closes
    pub async fn run<S: FrameSink, R: FrameStream>(
        self,
        sink: S,
        stream: R,
    ) -> Result<(), SocketError> {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        self.registry
            .register(ClientHandle::new(self.id, self.room.clone(), outbound_tx))
            .await;

        let (closed_tx, closed_rx) = oneshot::channel();
        let writer = tokio::spawn(write_pump(
            self.id,
            sink,
            outbound_rx,
            closed_tx,
            self.config.clone(),
        ));

        let read_result = self.read_pump(stream, closed_rx).await;

        // Dropping the registry's sender lets the writer flush and close.
        self.registry.unregister(self.id).await;
        let write_result = match writer.await {
            Ok(result) => result,
            Err(e) => {
                warn!(client_id = %self.id, error = %e, "Writer task failed");
                Ok(())
            }
        };

        read_result.and(write_result)
    }

    async fn read_pump<R: FrameStream>(
        &self,
        mut stream: R,
        mut closed: oneshot::Receiver<()>,
    ) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                _ = &mut closed => {
                    debug!(client_id = %self.id, "Writer stopped, ending read loop");
                    return Ok(());
                }
                frame = timeout(self.config.pong_wait, stream.next_frame()) => {
                    match frame {
                        Err(_) => {
                            info!(client_id = %self.id, "Read deadline exceeded");
                            return Err(SocketError::ReadTimeout);
                        }
                        Ok(Ok(Some(InboundFrame::Text(raw)))) => {
                            self.handler
                                .handle_message(self.id, self.room.app_id, raw)
                                .await?;
                        }
                        Ok(Ok(Some(InboundFrame::Control))) => {}
                        Ok(Ok(None)) => {
                            debug!(client_id = %self.id, "Peer closed the connection");
                            return Ok(());
                        }
                        Ok(Err(e)) => return Err(e),
                    }
                }
            }
        }
    }
}

async fn write_pump<S: FrameSink>(
    client_id: ClientId,
    mut sink: S,
    mut outbound: mpsc::Receiver<String>,
    closed: oneshot::Sender<()>,
    config: ConnectionConfig,
) -> Result<(), SocketError> {
    let mut ping = interval_at(Instant::now() + config.ping_period, config.ping_period);

    let result = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = within(config.write_wait, sink.send_text(text)).await {
                        break Err(e);
                    }
                }
                None => {
                    debug!(client_id = %client_id, "Outbound queue closed, closing socket");
                    let _ = within(config.write_wait, sink.close()).await;
                    break Ok(());
                }
            },
            _ = ping.tick() => {
                if let Err(e) = within(config.write_wait, sink.send_ping()).await {
                    break Err(e);
                }
            }
        }
    };

    if let Err(e) = &result {
        warn!(client_id = %client_id, error = %e, "Write failed, dropping connection");
    }
    let _ = closed.send(());
    result
}

async fn within<F>(deadline: Duration, write: F) -> Result<(), SocketError>
where
    F: Future<Output = Result<(), SocketError>>,
{
    timeout(deadline, write)
        .await
        .map_err(|_| SocketError::WriteTimeout)?
}
