use serde::{Deserialize, Serialize};

use crate::session::Turn;

/// A job position the candidate is preparing for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub research_history: Vec<ChatMessage>,
    /// Newest first
    #[serde(default)]
    pub analysis_history: Vec<AnalysisRecord>,
    /// Newest first
    #[serde(default)]
    pub interview_history: Vec<InterviewRecord>,
}

/// Fields supplied when creating a position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosition {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub interview_date: Option<String>,
}

/// Editable details of an existing position
///
/// Absent fields are left as they are; an empty string clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    #[serde(default)]
    pub interview_date: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
}

impl PositionUpdate {
    pub fn apply(self, position: &mut Position) {
        fn merge(field: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                *field = if value.trim().is_empty() { None } else { Some(value) };
            }
        }

        merge(&mut position.interview_date, self.interview_date);
        merge(&mut position.logo_url, self.logo_url);
        merge(&mut position.banner_url, self.banner_url);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLink {
    pub title: String,
    pub uri: String,
}

/// One message of the research chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ChatLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub subject: String,
    #[serde(rename = "A")]
    pub score: f64,
    pub full_mark: f64,
}

/// Scored analysis of a recorded interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Assigned by the store
    #[serde(default)]
    pub id: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    pub transcript: String,
}

/// Transcript of a finished live mock interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRecord {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub turns: Vec<Turn>,
}
