//! Microphone and speaker backed by cpal
//!
//! cpal streams are not `Send`, so each stream lives on its own thread and
//! is dropped when that thread is told to shut down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::output::{ChunkId, OutputDevice};
use super::pcm;
use crate::error::{LiveError, LiveResult};

struct StreamThread {
    shutdown: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamThread {
    fn stop(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            warn!("Audio stream thread panicked");
        }
    }
}

/// Default input device
pub struct CpalMicrophone {
    config: AudioBackendConfig,
    stream: Option<StreamThread>,
}

impl CpalMicrophone {
    pub fn new(config: AudioBackendConfig) -> LiveResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| LiveError::Device("No input device available".to_string()))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            config,
            stream: None,
        })
    }
}

#[async_trait]
impl AudioBackend for CpalMicrophone {
    async fn start(&mut self) -> LiveResult<mpsc::Receiver<AudioFrame>> {
        if self.stream.is_some() {
            return Err(LiveError::Device("Already capturing".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(32);
        let (ready_tx, ready_rx) = std_mpsc::channel::<LiveResult<()>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();
        let block_size = self.config.block_size;
        let target_rate = self.config.target_sample_rate;

        let handle = std::thread::spawn(move || {
            let built = build_input_stream(block_size, target_rate, frame_tx);
            match built {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let ready = ready_rx
            .recv()
            .map_err(|_| LiveError::Device("capture thread exited".to_string()))?;
        ready?;

        self.stream = Some(StreamThread {
            shutdown: shutdown_tx,
            handle,
        });

        info!("Microphone capture started");

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> LiveResult<()> {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!("Microphone capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

fn build_input_stream(
    block_size: usize,
    target_rate: u32,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> LiveResult<cpal::Stream> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| LiveError::Device("No input device available".to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| LiveError::Device(e.to_string()))?;
    let stream_config: cpal::StreamConfig = supported.config();
    let channels = stream_config.channels;
    let device_rate = stream_config.sample_rate.0;

    let mut pending: Vec<f32> = Vec::with_capacity(block_size * 2);
    let mut emitted: u64 = 0;

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = pcm::downmix_to_mono(data, channels);
                pending.extend(pcm::resample(&mono, device_rate, target_rate));

                while pending.len() >= block_size {
                    let block: Vec<f32> = pending.drain(..block_size).collect();
                    let frame = AudioFrame {
                        samples: block,
                        sample_rate: target_rate,
                        timestamp_ms: emitted * 1000 / target_rate as u64,
                    };
                    emitted += block_size as u64;

                    // Capture must never block the audio thread
                    if frame_tx.try_send(frame).is_err() {
                        warn!("Capture channel full, dropping block");
                    }
                }
            },
            move |err| {
                warn!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| LiveError::Device(e.to_string()))?;

    stream.play().map_err(|e| LiveError::Device(e.to_string()))?;

    Ok(stream)
}

struct SpeakerChunk {
    id: ChunkId,
    start_frame: u64,
    samples: Vec<f32>,
}

#[derive(Default)]
struct SpeakerTimeline {
    chunks: Vec<SpeakerChunk>,
}

/// Default output device with a frame-accurate clock
pub struct CpalSpeaker {
    sample_rate: u32,
    frames_played: Arc<AtomicU64>,
    timeline: Arc<Mutex<SpeakerTimeline>>,
    stream: Option<StreamThread>,
}

impl CpalSpeaker {
    pub fn open(finished_tx: mpsc::UnboundedSender<ChunkId>) -> LiveResult<Self> {
        let frames_played = Arc::new(AtomicU64::new(0));
        let timeline = Arc::new(Mutex::new(SpeakerTimeline::default()));

        let (ready_tx, ready_rx) = std_mpsc::channel::<LiveResult<u32>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread_frames = Arc::clone(&frames_played);
        let thread_timeline = Arc::clone(&timeline);

        let handle = std::thread::spawn(move || {
            match build_output_stream(thread_frames, thread_timeline, finished_tx) {
                Ok((stream, rate)) => {
                    let _ = ready_tx.send(Ok(rate));
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| LiveError::Output("output thread exited".to_string()))??;

        info!("Speaker output opened at {}Hz", sample_rate);

        Ok(Self {
            sample_rate,
            frames_played,
            timeline,
            stream: Some(StreamThread {
                shutdown: shutdown_tx,
                handle,
            }),
        })
    }
}

fn build_output_stream(
    frames_played: Arc<AtomicU64>,
    timeline: Arc<Mutex<SpeakerTimeline>>,
    finished_tx: mpsc::UnboundedSender<ChunkId>,
) -> LiveResult<(cpal::Stream, u32)> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| LiveError::Output("No output device available".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| LiveError::Output(e.to_string()))?;
    let stream_config: cpal::StreamConfig = supported.config();
    let channels = stream_config.channels as usize;
    let rate = stream_config.sample_rate.0;

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let base = frames_played.load(Ordering::Acquire);
                let frames = data.len() / channels;

                let Ok(mut timeline) = timeline.lock() else {
                    data.iter_mut().for_each(|s| *s = 0.0);
                    return;
                };

                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let position = base + i as u64;
                    let mut value = 0.0f32;
                    for chunk in &timeline.chunks {
                        if position >= chunk.start_frame {
                            if let Some(s) = chunk.samples.get((position - chunk.start_frame) as usize) {
                                value += s;
                            }
                        }
                    }
                    frame.iter_mut().for_each(|s| *s = value.clamp(-1.0, 1.0));
                }

                let end = base + frames as u64;
                timeline.chunks.retain(|chunk| {
                    let done = chunk.start_frame + chunk.samples.len() as u64 <= end;
                    if done {
                        let _ = finished_tx.send(chunk.id);
                    }
                    !done
                });

                frames_played.store(end, Ordering::Release);
            },
            move |err| {
                warn!("Audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| LiveError::Output(e.to_string()))?;

    stream.play().map_err(|e| LiveError::Output(e.to_string()))?;

    Ok((stream, rate))
}

impl OutputDevice for CpalSpeaker {
    fn name(&self) -> &str {
        "cpal speaker"
    }

    fn current_time(&self) -> f64 {
        self.frames_played.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn schedule(
        &mut self,
        id: ChunkId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> LiveResult<()> {
        if self.stream.is_none() {
            return Err(LiveError::Output("device closed".to_string()));
        }

        let samples = pcm::resample(&samples, sample_rate, self.sample_rate);
        let start_frame = (start_at * self.sample_rate as f64).round() as u64;

        let mut timeline = self
            .timeline
            .lock()
            .map_err(|_| LiveError::Output("timeline lock poisoned".to_string()))?;
        timeline.chunks.push(SpeakerChunk {
            id,
            start_frame,
            samples,
        });

        Ok(())
    }

    fn stop_chunk(&mut self, id: ChunkId) {
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.chunks.retain(|chunk| chunk.id != id);
        }
    }

    fn close(&mut self) -> LiveResult<()> {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!("Speaker output closed");
        }
        Ok(())
    }
}
