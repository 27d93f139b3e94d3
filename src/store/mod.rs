//! Persistent job positions and their histories

mod position;
mod prompt;
#[allow(clippy::module_inception)]
mod store;

pub use position::{
    AnalysisRecord, ChatLink, ChatMessage, ChatRole, InterviewRecord, Metric, NewPosition, Position,
    PositionUpdate,
};
pub use prompt::interview_system_prompt;
pub use store::{PositionStore, StoreError};
