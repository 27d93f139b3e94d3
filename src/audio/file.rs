use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::pcm;
use crate::error::{LiveError, LiveResult};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples normalized to -1.0..=1.0
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at the requested rate
    pub fn to_mono(&self, target_rate: u32) -> Vec<f32> {
        let mono = pcm::downmix_to_mono(&self.samples, self.channels);
        pcm::resample(&mono, self.sample_rate, target_rate)
    }
}

/// Capture backend that replays a WAV file as microphone input
pub struct FileBackend {
    path: String,
    config: AudioBackendConfig,
    samples: Vec<f32>,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl FileBackend {
    pub fn open(path: &str, config: AudioBackendConfig) -> LiveResult<Self> {
        let file = AudioFile::open(path).map_err(|e| LiveError::Device(format!("{:#}", e)))?;
        let samples = file.to_mono(config.target_sample_rate);

        Ok(Self {
            path: file.path,
            config,
            samples,
            task: None,
            capturing: false,
        })
    }
}

#[async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> LiveResult<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            return Err(LiveError::Device("Already capturing".to_string()));
        }

        info!("Starting file capture from {}", self.path);

        let (tx, rx) = mpsc::channel(32);
        let samples = self.samples.clone();
        let block_size = self.config.block_size.max(1);
        let sample_rate = self.config.target_sample_rate;
        let realtime = self.config.realtime;

        let task = tokio::spawn(async move {
            let period = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);
            let mut ticker = tokio::time::interval(period);

            for (index, block) in samples.chunks(block_size).enumerate() {
                if realtime {
                    ticker.tick().await;
                }

                let frame = AudioFrame {
                    samples: block.to_vec(),
                    sample_rate,
                    timestamp_ms: (index * block_size) as u64 * 1000 / sample_rate as u64,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            debug!("File capture exhausted");
        });

        self.task = Some(task);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> LiveResult<()> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;

        info!("File capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
