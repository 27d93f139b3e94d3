use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transcript::Turn;

/// Lifecycle state of the live session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }
}

/// Snapshot of the controller for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Id of the current (or last) session
    pub session_id: Option<String>,

    /// The one user-visible error message, if any
    pub error: Option<String>,

    /// When the current (or last) session started
    pub started_at: Option<DateTime<Utc>>,

    /// Number of transcript turns so far
    pub turn_count: usize,
}

/// Outcome of a finished session, handed out once for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub error: Option<String>,
    pub frames_sent: u64,
    pub frames_dropped: u64,
}
