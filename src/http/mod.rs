//! HTTP API for driving mock interviews from a local UI
//!
//! - GET /positions, POST /positions - List or create positions
//! - GET /positions/:id, PATCH /positions/:id, DELETE /positions/:id - Read,
//!   edit (interview date, logo, banner) or remove a position
//! - POST /positions/:id/research, DELETE /positions/:id/research - Append to
//!   or clear the research chat
//! - POST /positions/:id/analysis, DELETE /positions/:id/analysis/:record_id -
//!   Record or remove an interview analysis
//! - POST /positions/:id/interview/start - Start a live interview
//! - POST /interview/stop - Stop it and save the transcript
//! - GET /interview/status - Lifecycle state and error message
//! - GET /interview/transcript - Transcript so far
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
