use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{LiveError, LiveResult};

/// Block of captured microphone samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono samples, normalized to -1.0..=1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Samples per outbound block
    pub block_size: usize,
    /// Pace file playback at real time (false = as fast as the channel drains)
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // Live model input rate
            block_size: 4096,          // ~256ms at 16kHz
            realtime: true,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - File: replay a WAV file as if it were a microphone (tests, rehearsal)
/// - cpal: default input device (feature `cpal`)
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive fixed-size blocks
    async fn start(&mut self) -> LiveResult<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> LiveResult<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default microphone (requires the `cpal` feature)
    Microphone,
    /// WAV file input (for testing/rehearsal)
    File(String),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create a capture backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> LiveResult<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "cpal")]
                {
                    let backend = super::cpal_device::CpalMicrophone::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "cpal"))]
                {
                    let _ = config;
                    Err(LiveError::Device(
                        "microphone capture requires the `cpal` feature".to_string(),
                    ))
                }
            }

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::open(&path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_default() {
        let config = AudioBackendConfig::default();
        assert_eq!(config.target_sample_rate, 16000);
        assert_eq!(config.block_size, 4096);
        assert!(config.realtime);
    }

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame {
            samples: vec![0.0; 1600],
            sample_rate: 16000,
            timestamp_ms: 0,
        };
        assert!((frame.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_device_error() {
        let result = AudioBackendFactory::create(
            AudioSource::File("/nonexistent/interview.wav".to_string()),
            AudioBackendConfig::default(),
        );
        assert!(matches!(result, Err(LiveError::Device(_))));
    }
}
