use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::audio::{pcm, AudioBackendConfig, AudioSink, AudioSource, DeviceSet};
use crate::error::ErrorClassifier;
use crate::gateway::{gemini, GeminiLiveGateway, LiveGateway, NatsGateway};
use crate::session::LiveSessionConfig;

/// Prefix of environment overrides, e.g. `CAREER__SERVICE__HTTP__PORT=9000`
pub const ENV_PREFIX: &str = "CAREER";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub gateway: GatewayConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// `microphone` or a path to a WAV file replayed as the microphone
    pub input: String,
    /// `speaker`, `null` or a path to a WAV file to render into
    pub output: String,
    pub block_size: usize,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Gemini,
    Nats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub kind: GatewayKind,
    pub model: String,
    pub voice: String,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub nats_url: String,
    pub availability_codes: Vec<u16>,
    pub availability_signatures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Config {
    /// Load defaults, then `path` (if it exists), then `CAREER__*` overrides
    pub fn load(path: &str) -> Result<Self> {
        let defaults = ErrorClassifier::default();
        let session = LiveSessionConfig::default();

        let builder = config::Config::builder()
            .set_default("service.name", "career-strategist")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8787_i64)?
            .set_default("audio.input", "microphone")?
            .set_default("audio.output", "speaker")?
            .set_default("audio.block_size", 4096_i64)?
            .set_default("audio.input_sample_rate", pcm::INPUT_SAMPLE_RATE as i64)?
            .set_default("audio.output_sample_rate", pcm::OUTPUT_SAMPLE_RATE as i64)?
            .set_default("gateway.kind", "gemini")?
            .set_default("gateway.model", session.model)?
            .set_default("gateway.voice", session.voice)?
            .set_default("gateway.endpoint", gemini::DEFAULT_ENDPOINT)?
            .set_default("gateway.api_key_env", "GEMINI_API_KEY")?
            .set_default("gateway.nats_url", "nats://localhost:4222")?
            .set_default(
                "gateway.availability_codes",
                defaults
                    .availability_codes
                    .iter()
                    .map(|c| *c as i64)
                    .collect::<Vec<_>>(),
            )?
            .set_default("gateway.availability_signatures", defaults.availability_signatures)?
            .set_default("store.path", "data/positions.json")?;

        let settings = builder
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gateway.availability_signatures")
                    .with_list_parse_key("gateway.availability_codes")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn session_config(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            model: self.gateway.model.clone(),
            voice: self.gateway.voice.clone(),
            input_sample_rate: self.audio.input_sample_rate,
            output_sample_rate: self.audio.output_sample_rate,
            classifier: ErrorClassifier {
                availability_codes: self.gateway.availability_codes.clone(),
                availability_signatures: self.gateway.availability_signatures.clone(),
            },
        }
    }

    pub fn devices(&self) -> DeviceSet {
        DeviceSet {
            source: self.audio.source(),
            sink: self.audio.sink(),
            capture: AudioBackendConfig {
                target_sample_rate: self.audio.input_sample_rate,
                block_size: self.audio.block_size,
                realtime: true,
            },
            output_sample_rate: self.audio.output_sample_rate,
        }
    }
}

impl AudioConfig {
    pub fn source(&self) -> AudioSource {
        match self.input.as_str() {
            "microphone" | "mic" => AudioSource::Microphone,
            path => AudioSource::File(path.to_string()),
        }
    }

    pub fn sink(&self) -> AudioSink {
        match self.output.as_str() {
            "speaker" => AudioSink::Speaker,
            "null" | "none" => AudioSink::Null,
            path => AudioSink::Wav(path.to_string()),
        }
    }
}

impl GatewayConfig {
    /// Build the configured gateway (connects when the transport needs it)
    pub async fn connect(&self) -> Result<Arc<dyn LiveGateway>> {
        match self.kind {
            GatewayKind::Gemini => {
                let api_key = std::env::var(&self.api_key_env).unwrap_or_default();
                if api_key.is_empty() {
                    bail!(
                        "Environment variable {} is not set; the live model needs an API key",
                        self.api_key_env
                    );
                }
                Ok(Arc::new(GeminiLiveGateway::new(self.endpoint.clone(), api_key)))
            }
            GatewayKind::Nats => {
                let gateway = NatsGateway::connect(&self.nats_url)
                    .await
                    .with_context(|| format!("Failed to connect to NATS at {}", self.nats_url))?;
                Ok(Arc::new(gateway))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let cfg = Config::load(missing.to_str().unwrap()).unwrap();

        assert_eq!(cfg.gateway.kind, GatewayKind::Gemini);
        assert_eq!(cfg.audio.input_sample_rate, 16000);
        assert_eq!(cfg.audio.output_sample_rate, 24000);
        assert_eq!(cfg.session_config().classifier, ErrorClassifier::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("career.toml");
        std::fs::write(
            &path,
            r#"
[audio]
input = "rehearsal.wav"
output = "null"

[gateway]
kind = "nats"
availability_codes = [403, 451]
"#,
        )
        .unwrap();

        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.gateway.kind, GatewayKind::Nats);
        assert_eq!(cfg.gateway.availability_codes, vec![403, 451]);
        assert_eq!(cfg.audio.source(), AudioSource::File("rehearsal.wav".to_string()));
        assert_eq!(cfg.audio.sink(), AudioSink::Null);
        assert_eq!(cfg.service.http.port, 8787);
    }

    #[test]
    fn test_audio_selection() {
        let audio = AudioConfig {
            input: "microphone".to_string(),
            output: "out/interviewer.wav".to_string(),
            block_size: 1024,
            input_sample_rate: 16000,
            output_sample_rate: 24000,
        };
        assert_eq!(audio.source(), AudioSource::Microphone);
        assert_eq!(audio.sink(), AudioSink::Wav("out/interviewer.wav".to_string()));
    }
}
