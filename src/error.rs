//! Error types for live interview sessions
//!
//! `LiveError` is the taxonomy the session controller reasons about.
//! `ErrorClassifier` decides whether a gateway failure means the live model
//! is unavailable from the caller's network (no retry makes sense) or is an
//! ordinary transport failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for live session operations
pub type LiveResult<T> = Result<T, LiveError>;

/// Failure reported by a gateway, either while opening or mid-session
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct GatewayError {
    /// Structured status code when the transport has one (HTTP status,
    /// WebSocket close code)
    pub code: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Errors that can occur around a live interview session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiveError {
    /// Microphone permission denied or no input device
    #[error("Microphone unavailable: {0}")]
    Device(String),

    /// The gateway refused the session (e.g. unsupported region)
    #[error("Live audio unavailable: {0}")]
    Availability(GatewayError),

    /// Generic stream failure
    #[error("Transport error: {0}")]
    Transport(GatewayError),

    /// A single outbound frame could not be queued
    #[error("Frame dropped: {0}")]
    FrameDrop(String),

    #[error("A live session is already running")]
    AlreadyActive,

    #[error("Output device error: {0}")]
    Output(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The session task died without tearing down
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

/// Phase in which an error surfaced; the user-facing wording differs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Starting,
    Active,
}

impl LiveError {
    /// Human-readable message shown to the user
    pub fn user_message(&self, phase: ErrorPhase) -> String {
        match (self, phase) {
            (LiveError::Device(_), _) => {
                "Microphone access was denied or no input device is available.".to_string()
            }
            (LiveError::Availability(_), ErrorPhase::Starting) => {
                "Failed to start: Region not supported for Multimodal Live. Please try using a VPN."
                    .to_string()
            }
            (LiveError::Availability(_), ErrorPhase::Active) => {
                "Error: Region not supported for Multimodal Live. Please try using a VPN (USA or Japan node) and reload."
                    .to_string()
            }
            (LiveError::Transport(_), ErrorPhase::Active) => {
                "Connection error occurred. Check network or API key.".to_string()
            }
            (LiveError::Transport(e), ErrorPhase::Starting) => {
                if e.message.is_empty() {
                    "Failed to start".to_string()
                } else {
                    e.message.clone()
                }
            }
            (LiveError::TaskFailed(_), _) => {
                "The interview stopped unexpectedly. Please start a new session.".to_string()
            }
            (other, _) => other.to_string(),
        }
    }
}

/// Classifies gateway failures into availability vs transport errors
///
/// Structured codes are checked first; message signatures are a fallback
/// because vendors change their wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassifier {
    pub availability_codes: Vec<u16>,
    pub availability_signatures: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            availability_codes: vec![403],
            availability_signatures: vec![
                "Region not supported".to_string(),
                "User location is not supported".to_string(),
                "403".to_string(),
            ],
        }
    }
}

impl ErrorClassifier {
    pub fn classify(&self, error: GatewayError) -> LiveError {
        if self.is_availability(&error) {
            LiveError::Availability(error)
        } else {
            LiveError::Transport(error)
        }
    }

    fn is_availability(&self, error: &GatewayError) -> bool {
        if let Some(code) = error.code {
            if self.availability_codes.contains(&code) {
                return true;
            }
        }

        self.availability_signatures
            .iter()
            .any(|signature| error.message.contains(signature.as_str()))
    }
}
