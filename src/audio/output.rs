//! Playback devices for inbound model audio
//!
//! A device exposes its own clock and accepts chunks scheduled at absolute
//! times on that clock. Completion of a chunk is reported on the channel the
//! device was opened with.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::pcm;
use crate::error::{LiveError, LiveResult};

/// Identifier of one scheduled chunk
pub type ChunkId = u64;

pub trait OutputDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Device clock in seconds
    fn current_time(&self) -> f64;

    /// Schedule mono samples to start at `start_at` on the device clock
    fn schedule(
        &mut self,
        id: ChunkId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> LiveResult<()>;

    /// Stop a chunk immediately, whether or not it started
    fn stop_chunk(&mut self, id: ChunkId);

    /// Release the device; scheduled audio past "now" is discarded
    fn close(&mut self) -> LiveResult<()>;
}

/// Audio output sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSink {
    /// Default output device (requires the `cpal` feature)
    Speaker,
    /// Render the played timeline to a WAV file on close
    Wav(String),
    /// Discard audio, only keep the clock
    Null,
}

struct PendingChunk {
    start_at: f64,
    samples: Vec<f32>,
    timer: JoinHandle<()>,
}

/// Virtual-clock output device
///
/// The clock is wall time since the device was opened. Completion is
/// signalled by a timer per chunk. When a path is set, everything that was
/// actually played is mixed into a mono 16-bit WAV file on close.
pub struct RenderedOutput {
    sample_rate: u32,
    opened_at: Instant,
    finished_tx: mpsc::UnboundedSender<ChunkId>,
    pending: HashMap<ChunkId, PendingChunk>,
    played: Vec<(f64, Vec<f32>)>,
    path: Option<PathBuf>,
    closed: bool,
}

impl RenderedOutput {
    pub fn new(
        sample_rate: u32,
        path: Option<PathBuf>,
        finished_tx: mpsc::UnboundedSender<ChunkId>,
    ) -> Self {
        info!(
            "Rendered output opened ({}Hz, file: {:?})",
            sample_rate, path
        );

        Self {
            sample_rate,
            opened_at: Instant::now(),
            finished_tx,
            pending: HashMap::new(),
            played: Vec::new(),
            path,
            closed: false,
        }
    }

    /// Number of chunks scheduled but not yet swept as finished
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn sweep_finished(&mut self, now: f64) {
        let rate = self.sample_rate as f64;
        let done: Vec<ChunkId> = self
            .pending
            .iter()
            .filter(|(_, c)| c.start_at + c.samples.len() as f64 / rate <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in done {
            if let Some(chunk) = self.pending.remove(&id) {
                self.keep_played(chunk.start_at, chunk.samples);
            }
        }
    }

    fn cut_at(&mut self, id: ChunkId, now: f64) {
        if let Some(mut chunk) = self.pending.remove(&id) {
            chunk.timer.abort();
            let played = ((now - chunk.start_at).max(0.0) * self.sample_rate as f64) as usize;
            chunk.samples.truncate(played);
            self.keep_played(chunk.start_at, chunk.samples);
        }
    }

    fn keep_played(&mut self, start_at: f64, samples: Vec<f32>) {
        if self.path.is_some() && !samples.is_empty() {
            self.played.push((start_at, samples));
        }
    }

    fn render(&self, path: &PathBuf) -> anyhow::Result<()> {
        let rate = self.sample_rate as f64;
        let total = self
            .played
            .iter()
            .map(|(start, s)| (start * rate).round() as usize + s.len())
            .max()
            .unwrap_or(0);

        let mut timeline = vec![0.0f32; total];
        for (start, samples) in &self.played {
            let offset = (start * rate).round() as usize;
            for (i, s) in samples.iter().enumerate() {
                timeline[offset + i] += s;
            }
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer: hound::WavWriter<BufWriter<File>> = hound::WavWriter::create(path, spec)?;
        for sample in pcm::float_to_pcm16(&timeline) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        info!(
            "Rendered {:.1}s of interviewer audio to {}",
            total as f64 / rate,
            path.display()
        );

        Ok(())
    }
}

impl OutputDevice for RenderedOutput {
    fn name(&self) -> &str {
        if self.path.is_some() {
            "WAV render"
        } else {
            "null"
        }
    }

    fn current_time(&self) -> f64 {
        self.opened_at.elapsed().as_secs_f64()
    }

    fn schedule(
        &mut self,
        id: ChunkId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> LiveResult<()> {
        if self.closed {
            return Err(LiveError::Output("device closed".to_string()));
        }

        let now = self.current_time();
        self.sweep_finished(now);

        let samples = pcm::resample(&samples, sample_rate, self.sample_rate);
        let end_at = start_at + pcm::duration_secs(samples.len(), self.sample_rate);
        let delay = Duration::from_secs_f64((end_at - now).max(0.0));

        let finished_tx = self.finished_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = finished_tx.send(id);
        });

        self.pending.insert(
            id,
            PendingChunk {
                start_at,
                samples,
                timer,
            },
        );

        Ok(())
    }

    fn stop_chunk(&mut self, id: ChunkId) {
        let now = self.current_time();
        self.cut_at(id, now);
    }

    fn close(&mut self) -> LiveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let now = self.current_time();
        self.sweep_finished(now);
        let remaining: Vec<ChunkId> = self.pending.keys().copied().collect();
        debug!("Discarding {} unfinished chunks on close", remaining.len());
        for id in remaining {
            self.cut_at(id, now);
        }

        if let Some(path) = self.path.clone() {
            if let Err(e) = self.render(&path) {
                warn!("Failed to render output WAV: {:#}", e);
                return Err(LiveError::Output(e.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completion_is_reported_after_chunk_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = RenderedOutput::new(24000, None, tx);

        output.schedule(7, vec![0.0; 12000], 24000, 0.0).unwrap();
        assert_eq!(output.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_chunk_never_completes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = RenderedOutput::new(24000, None, tx);

        output.schedule(1, vec![0.0; 24000], 24000, 0.0).unwrap();
        output.stop_chunk(1);
        assert_eq!(output.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_keeps_only_played_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interviewer.wav");
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut output = RenderedOutput::new(1000, Some(path.clone()), tx);

        output.schedule(1, vec![0.5; 1000], 1000, 0.0).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        output.close().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 1000);
        assert_eq!(reader.len(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_after_close_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut output = RenderedOutput::new(24000, None, tx);
        output.close().unwrap();
        output.close().unwrap();
        assert!(output.schedule(1, vec![0.0; 10], 24000, 0.0).is_err());
    }
}
