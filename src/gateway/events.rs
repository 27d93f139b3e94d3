use serde::{Deserialize, Serialize};

use crate::audio::pcm;
use crate::error::GatewayError;

/// Parameters for opening a live session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub session_id: String,
    pub model: String,
    /// Prebuilt voice name (e.g. "Zephyr")
    pub voice: String,
    pub system_prompt: String,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

/// Base64 PCM block sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeAudio {
    pub data: String,
    pub mime_type: String,
}

impl RealtimeAudio {
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: pcm::encode_frame(samples),
            mime_type: pcm::mime_type(sample_rate),
        }
    }
}

/// Events sent from the client to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    RealtimeAudio(RealtimeAudio),
    Close,
}

/// Events delivered by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Session accepted; audio may flow
    Opened,
    /// Transcription of the model's speech
    OutputTranscript { text: String },
    /// Transcription of the candidate's speech
    InputTranscript { text: String },
    TurnComplete,
    /// Base64 PCM16 LE mono audio
    Audio { data: String, sample_rate: u32 },
    /// The model stopped speaking because the candidate barged in
    Interrupted,
    Error(GatewayError),
    Closed { reason: Option<String> },
}
