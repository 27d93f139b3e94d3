use crate::session::{LiveSessionController, SessionReport};
use crate::store::{PositionStore, StoreError};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single live interview controller
    pub controller: Arc<LiveSessionController>,

    /// Positions and their histories
    pub store: Arc<RwLock<PositionStore>>,

    /// Position the current (or last) interview was started for
    pub active_position: Arc<Mutex<Option<String>>>,

    /// Held by the start handler for the whole attempt
    pub starting: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(controller: LiveSessionController, store: PositionStore) -> Self {
        Self {
            controller: Arc::new(controller),
            store: Arc::new(RwLock::new(store)),
            active_position: Arc::new(Mutex::new(None)),
            starting: Arc::new(Mutex::new(())),
        }
    }

    /// Save a finished interview to the position it was started for
    ///
    /// Returns whether a record was written. Empty transcripts are skipped.
    pub async fn persist_report(&self, report: SessionReport) -> Result<bool, StoreError> {
        let Some(position_id) = self.active_position.lock().await.take() else {
            return Ok(false);
        };

        if report.turns.is_empty() {
            info!("Interview {} ended without transcript, nothing saved", report.session_id);
            return Ok(false);
        }

        let mut store = self.store.write().await;
        match store.append_interview(&position_id, report.turns) {
            Ok(record) => {
                info!("Saved interview {} to position {}", record.id, position_id);
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => {
                warn!("Position {} was removed during the interview", position_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
