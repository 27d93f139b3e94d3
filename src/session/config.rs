use serde::{Deserialize, Serialize};

use crate::audio::pcm;
use crate::error::ErrorClassifier;

/// Configuration for live interview sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// Live model name
    pub model: String,

    /// Prebuilt interviewer voice
    pub voice: String,

    /// Rate of audio sent to the model (16kHz)
    pub input_sample_rate: u32,

    /// Rate of audio produced by the model (24kHz)
    pub output_sample_rate: u32,

    /// How gateway failures map to availability vs transport errors
    pub classifier: ErrorClassifier,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
            voice: "Zephyr".to_string(),
            input_sample_rate: pcm::INPUT_SAMPLE_RATE,
            output_sample_rate: pcm::OUTPUT_SAMPLE_RATE,
            classifier: ErrorClassifier::default(),
        }
    }
}
