//! Live interview session management
//!
//! This module provides the `LiveSessionController` that manages:
//! - Microphone capture and outbound PCM frames
//! - Inbound model audio decoding and gapless playback scheduling
//! - Transcript assembly from transcription fragments
//! - Barge-in handling and teardown

mod config;
mod controller;
mod scheduler;
mod state;
mod transcript;

pub use config::LiveSessionConfig;
pub use controller::LiveSessionController;
pub use scheduler::{PlaybackScheduler, ScheduledChunk};
pub use state::{SessionReport, SessionState, SessionStatus};
pub use transcript::{Role, TranscriptAssembler, Turn};
