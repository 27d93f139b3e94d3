use std::collections::HashMap;

use crate::audio::ChunkId;

/// Placement of one decoded chunk on the output clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub id: ChunkId,
    pub start_at: f64,
    pub duration: f64,
}

impl ScheduledChunk {
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// Gapless playback scheduler
///
/// Keeps a single `next_start_time` on the output device clock. Each chunk
/// starts at `max(next_start_time, now)`, so chunks play back to back while
/// the device is ahead and start immediately once it has drained. The device
/// buffers future chunks itself; here we only track which ids are still
/// scheduled so an interruption can stop them.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: f64,
    scheduled: HashMap<ChunkId, ScheduledChunk>,
    next_id: ChunkId,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a chunk of `duration` seconds given the device time `now`
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledChunk {
        let start_at = self.next_start_time.max(now);
        self.next_start_time = start_at + duration;

        let chunk = ScheduledChunk {
            id: self.next_id,
            start_at,
            duration,
        };
        self.next_id += 1;
        self.scheduled.insert(chunk.id, chunk);

        chunk
    }

    /// Untrack a chunk whose playback ended; false if it was not tracked
    pub fn finished(&mut self, id: ChunkId) -> bool {
        self.scheduled.remove(&id).is_some()
    }

    /// Barge-in: forget every unfinished chunk and reset the clock
    ///
    /// Returns the ids the caller must stop on the device.
    pub fn interrupt(&mut self) -> Vec<ChunkId> {
        self.next_start_time = 0.0;
        let mut ids: Vec<ChunkId> = self.scheduled.drain().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_scheduled(&self, id: ChunkId) -> bool {
        self.scheduled.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_back_while_device_is_ahead() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(0.5, 0.0);
        let b = s.schedule(0.5, 0.1);
        let c = s.schedule(0.25, 0.2);

        assert_eq!(a.start_at, 0.0);
        assert_eq!(b.start_at, a.end_at());
        assert_eq!(c.start_at, b.end_at());
        assert_eq!(s.next_start_time(), 1.25);
        assert_eq!(s.pending(), 3);
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let mut s = PlaybackScheduler::new();
        s.schedule(0.5, 0.0);
        let late = s.schedule(0.5, 2.0);

        assert_eq!(late.start_at, 2.0);
        assert_eq!(s.next_start_time(), 2.5);
    }

    #[test]
    fn test_interrupt_resets_clock_and_returns_unfinished() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(1.0, 0.0);
        let b = s.schedule(1.0, 0.0);
        let c = s.schedule(1.0, 0.0);
        assert!(s.finished(a.id));

        let stopped = s.interrupt();
        assert_eq!(stopped, vec![b.id, c.id]);
        assert_eq!(s.next_start_time(), 0.0);
        assert_eq!(s.pending(), 0);

        // Next chunk starts at "now", not at the stale clock
        let d = s.schedule(1.0, 1.5);
        assert_eq!(d.start_at, 1.5);
    }

    #[test]
    fn test_finished_is_idempotent() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(0.1, 0.0);
        assert!(s.finished(a.id));
        assert!(!s.finished(a.id));
        assert!(!s.is_scheduled(a.id));
    }

    #[test]
    fn test_ids_are_unique_across_interrupts() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(0.1, 0.0);
        s.interrupt();
        let b = s.schedule(0.1, 0.0);
        assert_ne!(a.id, b.id);
    }
}
