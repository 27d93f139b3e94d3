//! Gateway that talks to a model bridge over NATS
//!
//! Subjects:
//! - `interview.open`: open request (JSON `OpenRequest`)
//! - `interview.<session>.client`: client events (JSON `ClientEvent`)
//! - `interview.<session>.server`: server events (JSON `ServerEvent`)

use async_nats::Client;
use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::events::{ClientEvent, OpenRequest, ServerEvent};
use super::{ChannelConnection, GatewaySession, LiveGateway, EVENT_CHANNEL_CAPACITY};
use crate::error::GatewayError;

pub const OPEN_SUBJECT: &str = "interview.open";

pub fn client_subject(session_id: &str) -> String {
    format!("interview.{}.client", session_id)
}

pub fn server_subject(session_id: &str) -> String {
    format!("interview.{}.server", session_id)
}

pub struct NatsGateway {
    client: Client,
}

impl NatsGateway {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self, GatewayError> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .map_err(|e| GatewayError::new(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }
}

#[async_trait]
impl LiveGateway for NatsGateway {
    async fn open(&self, request: OpenRequest) -> Result<GatewaySession, GatewayError> {
        let session_id = request.session_id.clone();
        let inbound = server_subject(&session_id);
        let outbound = client_subject(&session_id);

        // Subscribe before announcing so the bridge's first event is not lost
        let mut subscriber = self
            .client
            .subscribe(inbound.clone())
            .await
            .map_err(|e| GatewayError::new(format!("Failed to subscribe to {}: {}", inbound, e)))?;

        info!("Subscribed to {}", inbound);

        let payload = serde_json::to_vec(&request)
            .map_err(|e| GatewayError::new(format!("Failed to encode open request: {}", e)))?;
        self.client
            .publish(OPEN_SUBJECT, payload.into())
            .await
            .map_err(|e| GatewayError::new(format!("Failed to publish open request: {}", e)))?;

        info!("Requested live session {} via NATS", session_id);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (client_tx, mut client_rx) = mpsc::channel::<ClientEvent>(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        // Reader: server subject -> event channel
        let reader_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    msg = subscriber.next() => {
                        let Some(msg) = msg else {
                            let _ = reader_tx.send(ServerEvent::Closed { reason: Some("subscription ended".to_string()) }).await;
                            break;
                        };

                        match serde_json::from_slice::<ServerEvent>(&msg.payload) {
                            Ok(event) => {
                                if reader_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse server event: {}", e);
                            }
                        }
                    }
                }
            }

            if let Err(e) = subscriber.unsubscribe().await {
                debug!("Unsubscribe failed: {}", e);
            }
        });

        // Writer: client events -> client subject
        let client = self.client.clone();
        tokio::spawn(async move {
            while let Some(event) = client_rx.recv().await {
                let closing = event == ClientEvent::Close;

                let payload = match serde_json::to_vec(&event) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Failed to encode client event: {}", e);
                        continue;
                    }
                };

                if let Err(e) = client.publish(outbound.clone(), payload.into()).await {
                    let _ = event_tx
                        .send(ServerEvent::Error(GatewayError::new(format!(
                            "Failed to publish to {}: {}",
                            outbound, e
                        ))))
                        .await;
                    break;
                }

                if closing {
                    break;
                }
            }

            let _ = stop_tx.send(());
            debug!("NATS writer for {} stopped", outbound);
        });

        Ok(GatewaySession {
            connection: Box::new(ChannelConnection::new(client_tx)),
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "NATS bridge"
    }
}
