//! Live model gateway over the vendor's bidirectional WebSocket protocol
//!
//! The first client message is `setup`; the server acknowledges with
//! `setupComplete`, after which `realtimeInput` audio flows up and
//! `serverContent` (transcriptions, audio parts, turn markers) flows down.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use super::events::{ClientEvent, OpenRequest, ServerEvent};
use super::{ChannelConnection, GatewaySession, LiveGateway, EVENT_CHANNEL_CAPACITY};
use crate::audio::pcm;
use crate::error::GatewayError;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

pub struct GeminiLiveGateway {
    endpoint: String,
    api_key: String,
}

impl GeminiLiveGateway {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

/// Build the `setup` message for a session
pub fn setup_message(request: &OpenRequest) -> serde_json::Value {
    let model = if request.model.starts_with("models/") {
        request.model.clone()
    } else {
        format!("models/{}", request.model)
    };

    let mut setup = json!({
        "model": model,
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": request.voice } }
            }
        },
        "systemInstruction": { "parts": [{ "text": request.system_prompt }] }
    });

    if request.input_transcription {
        setup["inputAudioTranscription"] = json!({});
    }
    if request.output_transcription {
        setup["outputAudioTranscription"] = json!({});
    }

    json!({ "setup": setup })
}

/// Encode a client event as a protocol message; `None` for `Close`
pub fn client_message(event: &ClientEvent) -> Option<serde_json::Value> {
    match event {
        ClientEvent::RealtimeAudio(audio) => Some(json!({
            "realtimeInput": {
                "audio": { "data": audio.data, "mimeType": audio.mime_type }
            }
        })),
        ClientEvent::Close => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    go_away: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<Content>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<Blob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}

fn rate_from_mime(mime: Option<&str>) -> u32 {
    mime.and_then(|m| m.split(";rate=").nth(1))
        .and_then(|rate| rate.trim().parse().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(pcm::OUTPUT_SAMPLE_RATE)
}

/// Translate one server message into events, in processing order
pub fn parse_server_message(text: &str) -> Result<Vec<ServerEvent>, serde_json::Error> {
    let message: LiveServerMessage = serde_json::from_str(text)?;
    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(ServerEvent::Opened);
    }

    if let Some(content) = message.server_content {
        if let Some(t) = content.output_transcription {
            events.push(ServerEvent::OutputTranscript { text: t.text });
        }
        if let Some(t) = content.input_transcription {
            events.push(ServerEvent::InputTranscript { text: t.text });
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete);
        }
        if let Some(turn) = content.model_turn {
            for blob in turn.parts.into_iter().filter_map(|p| p.inline_data) {
                events.push(ServerEvent::Audio {
                    sample_rate: rate_from_mime(blob.mime_type.as_deref()),
                    data: blob.data,
                });
            }
        }
        if content.interrupted {
            events.push(ServerEvent::Interrupted);
        }
    }

    if message.go_away.is_some() {
        debug!("Server announced go-away");
    }

    Ok(events)
}

fn connect_error(err: WsError) -> GatewayError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            let body = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default();
            GatewayError::with_code(status.as_u16(), format!("{} {}", status, body).trim().to_string())
        }
        other => GatewayError::new(other.to_string()),
    }
}

#[async_trait]
impl LiveGateway for GeminiLiveGateway {
    async fn open(&self, request: OpenRequest) -> Result<GatewaySession, GatewayError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let ws_request = url
            .into_client_request()
            .map_err(|e| GatewayError::new(format!("bad endpoint {}: {}", self.endpoint, e)))?;

        info!("Connecting to live model at {}", self.endpoint);

        let (ws, _response) = tokio_tungstenite::connect_async(ws_request)
            .await
            .map_err(connect_error)?;

        let (mut sink, mut stream) = ws.split();

        let setup = setup_message(&request).to_string();
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| GatewayError::new(format!("send setup failed: {}", e)))?;

        info!("Sent setup for session {} (model {})", request.session_id, request.model);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (client_tx, mut client_rx) = mpsc::channel::<ClientEvent>(EVENT_CHANNEL_CAPACITY);

        // Reader: socket -> events
        let reader_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
                    Ok(Message::Close(frame)) => {
                        let event = match frame {
                            Some(frame) if frame.code != CloseCode::Normal => {
                                ServerEvent::Error(GatewayError::with_code(
                                    u16::from(frame.code),
                                    frame.reason.to_string(),
                                ))
                            }
                            Some(frame) => ServerEvent::Closed {
                                reason: Some(frame.reason.to_string()),
                            },
                            None => ServerEvent::Closed { reason: None },
                        };
                        let _ = reader_tx.send(event).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = reader_tx
                            .send(ServerEvent::Error(GatewayError::new(e.to_string())))
                            .await;
                        return;
                    }
                };

                match parse_server_message(&text) {
                    Ok(events) => {
                        for event in events {
                            if reader_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Unrecognized live server message: {}", e),
                }
            }

            let _ = reader_tx.send(ServerEvent::Closed { reason: None }).await;
        });

        // Writer: client events -> socket
        tokio::spawn(async move {
            while let Some(event) = client_rx.recv().await {
                let Some(message) = client_message(&event) else {
                    if let Err(e) = sink.close().await {
                        debug!("WebSocket close failed: {}", e);
                    }
                    break;
                };

                if let Err(e) = sink.send(Message::Text(message.to_string())).await {
                    let _ = event_tx
                        .send(ServerEvent::Error(GatewayError::new(format!(
                            "send failed: {}",
                            e
                        ))))
                        .await;
                    break;
                }
            }
            debug!("Live model writer stopped");
        });

        Ok(GatewaySession {
            connection: Box::new(ChannelConnection::new(client_tx)),
            events: event_rx,
        })
    }

    fn name(&self) -> &str {
        "Gemini Live"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RealtimeAudio;

    fn request() -> OpenRequest {
        OpenRequest {
            session_id: "s1".to_string(),
            model: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
            voice: "Zephyr".to_string(),
            system_prompt: "You are an interviewer.".to_string(),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            input_transcription: true,
            output_transcription: true,
        }
    }

    #[test]
    fn test_setup_message_shape() {
        let msg = setup_message(&request());
        let setup = &msg["setup"];
        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-12-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(
            setup["systemInstruction"]["parts"][0]["text"],
            "You are an interviewer."
        );
        assert!(setup.get("inputAudioTranscription").is_some());
        assert!(setup.get("outputAudioTranscription").is_some());
    }

    #[test]
    fn test_client_audio_message() {
        let event = ClientEvent::RealtimeAudio(RealtimeAudio {
            data: "AAA=".to_string(),
            mime_type: "audio/pcm;rate=16000".to_string(),
        });
        let msg = client_message(&event).unwrap();
        assert_eq!(msg["realtimeInput"]["audio"]["data"], "AAA=");
        assert_eq!(msg["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
        assert!(client_message(&ClientEvent::Close).is_none());
    }

    #[test]
    fn test_parse_setup_complete() {
        let events = parse_server_message(r#"{"setupComplete":{}}"#).unwrap();
        assert_eq!(events, vec![ServerEvent::Opened]);
    }

    #[test]
    fn test_parse_server_content_order() {
        let text = r#"{
            "serverContent": {
                "outputTranscription": {"text": "Hel"},
                "inputTranscription": {"text": "Hi"},
                "turnComplete": true,
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}}]},
                "interrupted": true
            }
        }"#;

        let events = parse_server_message(text).unwrap();
        assert_eq!(
            events,
            vec![
                ServerEvent::OutputTranscript { text: "Hel".to_string() },
                ServerEvent::InputTranscript { text: "Hi".to_string() },
                ServerEvent::TurnComplete,
                ServerEvent::Audio { data: "AAA=".to_string(), sample_rate: 24000 },
                ServerEvent::Interrupted,
            ]
        );
    }

    #[test]
    fn test_parse_ignores_text_parts() {
        let text = r#"{"serverContent":{"modelTurn":{"parts":[{"text":"thinking"}]}}}"#;
        assert!(parse_server_message(text).unwrap().is_empty());
    }

    #[test]
    fn test_rate_from_mime() {
        assert_eq!(rate_from_mime(Some("audio/pcm;rate=16000")), 16000);
        assert_eq!(rate_from_mime(Some("audio/pcm")), 24000);
        assert_eq!(rate_from_mime(None), 24000);
        assert_eq!(rate_from_mime(Some("audio/pcm;rate=0")), 24000);
    }
}
