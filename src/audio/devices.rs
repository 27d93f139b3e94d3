use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource};
use super::output::{AudioSink, ChunkId, OutputDevice, RenderedOutput};
use crate::error::{LiveError, LiveResult};

/// Hands out the exclusive audio resources a live session needs
#[async_trait]
pub trait AudioDevices: Send + Sync {
    /// Acquire the microphone (capture is not started yet)
    async fn open_microphone(&self) -> LiveResult<Box<dyn AudioBackend>>;

    /// Open the output device; finished chunk ids are sent on `finished_tx`
    fn open_output(
        &self,
        finished_tx: mpsc::UnboundedSender<ChunkId>,
    ) -> LiveResult<Box<dyn OutputDevice>>;
}

/// Devices selected by configuration
#[derive(Debug, Clone)]
pub struct DeviceSet {
    pub source: AudioSource,
    pub sink: AudioSink,
    pub capture: AudioBackendConfig,
    pub output_sample_rate: u32,
}

#[async_trait]
impl AudioDevices for DeviceSet {
    async fn open_microphone(&self) -> LiveResult<Box<dyn AudioBackend>> {
        let backend = AudioBackendFactory::create(self.source.clone(), self.capture.clone())?;
        info!("Acquired capture backend: {}", backend.name());
        Ok(backend)
    }

    fn open_output(
        &self,
        finished_tx: mpsc::UnboundedSender<ChunkId>,
    ) -> LiveResult<Box<dyn OutputDevice>> {
        match &self.sink {
            AudioSink::Speaker => {
                #[cfg(feature = "cpal")]
                {
                    let speaker = super::cpal_device::CpalSpeaker::open(finished_tx)?;
                    Ok(Box::new(speaker))
                }

                #[cfg(not(feature = "cpal"))]
                {
                    let _ = finished_tx;
                    Err(LiveError::Output(
                        "speaker output requires the `cpal` feature".to_string(),
                    ))
                }
            }
            AudioSink::Wav(path) => Ok(Box::new(RenderedOutput::new(
                self.output_sample_rate,
                Some(PathBuf::from(path)),
                finished_tx,
            ))),
            AudioSink::Null => Ok(Box::new(RenderedOutput::new(
                self.output_sample_rate,
                None,
                finished_tx,
            ))),
        }
    }
}
