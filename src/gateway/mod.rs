//! Generative model gateway boundary
//!
//! The session controller only sees `LiveGateway`: open a session, push
//! client events through the returned connection, drain server events from
//! the returned channel. Transport failures after open arrive as
//! `ServerEvent::Error` on that channel, never through `send`.

pub mod events;
pub mod gemini;
pub mod nats;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayError;

pub use events::{ClientEvent, OpenRequest, RealtimeAudio, ServerEvent};
pub use gemini::GeminiLiveGateway;
pub use nats::NatsGateway;

/// Capacity of per-session event channels
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Opens live sessions with the model service
#[async_trait]
pub trait LiveGateway: Send + Sync {
    async fn open(&self, request: OpenRequest) -> Result<GatewaySession, GatewayError>;

    /// Get gateway name for logging
    fn name(&self) -> &str;
}

/// Client side of an open session
#[async_trait]
pub trait GatewayConnection: Send + Sync {
    /// Queue an event without waiting for the transport
    fn send(&self, event: ClientEvent) -> Result<(), GatewayError>;

    /// Close the stream; safe to call more than once
    async fn close(&mut self) -> Result<(), GatewayError>;
}

/// An opened session: the connection handle and its inbound events
pub struct GatewaySession {
    pub connection: Box<dyn GatewayConnection>,
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Connection that forwards client events into a bounded channel drained by a
/// transport writer task
pub struct ChannelConnection {
    outbound: Option<mpsc::Sender<ClientEvent>>,
}

impl ChannelConnection {
    pub fn new(outbound: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            outbound: Some(outbound),
        }
    }
}

#[async_trait]
impl GatewayConnection for ChannelConnection {
    fn send(&self, event: ClientEvent) -> Result<(), GatewayError> {
        match &self.outbound {
            Some(tx) => tx
                .try_send(event)
                .map_err(|e| GatewayError::new(format!("outbound queue: {}", e))),
            None => Err(GatewayError::new("connection closed")),
        }
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.outbound.take() {
            tx.send(ClientEvent::Close)
                .await
                .map_err(|_| GatewayError::new("transport already gone"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_connection_close_is_idempotent() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut conn = ChannelConnection::new(tx);

        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(rx.recv().await, Some(ClientEvent::Close));
        assert!(conn.send(ClientEvent::Close).is_err());
    }

    #[tokio::test]
    async fn test_channel_connection_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ChannelConnection::new(tx);

        let audio = ClientEvent::RealtimeAudio(RealtimeAudio::from_samples(&[0.0], 16000));
        assert!(conn.send(audio.clone()).is_ok());
        assert!(conn.send(audio).is_err());
    }
}
