use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::position::{AnalysisRecord, ChatMessage, InterviewRecord, NewPosition, Position};
use crate::session::Turn;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Position {0} not found")]
    NotFound(String),

    #[error("Analysis record {0} not found")]
    RecordNotFound(String),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// Positions persisted as one JSON document
///
/// Loaded once on open; every mutation rewrites the whole document.
pub struct PositionStore {
    path: PathBuf,
    positions: Vec<Position>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

impl PositionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let positions = if path.exists() {
            let data = fs::read(&path)?;
            serde_json::from_slice(&data)?
        } else {
            Vec::new()
        };

        info!(
            "Position store loaded: {} ({} positions)",
            path.display(),
            positions.len()
        );

        Ok(Self { path, positions })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Newest first
    pub fn list(&self) -> &[Position] {
        &self.positions
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn add(&mut self, new: NewPosition) -> Result<Position, StoreError> {
        let position = Position {
            id: new_id(),
            title: new.title,
            company: new.company,
            description: new.description,
            requirements: new.requirements,
            created_at: Utc::now().timestamp_millis(),
            interview_date: new.interview_date,
            logo_url: None,
            banner_url: None,
            research_history: Vec::new(),
            analysis_history: Vec::new(),
            interview_history: Vec::new(),
        };

        self.positions.insert(0, position.clone());
        self.save()?;

        info!("Added position {} ({} @ {})", position.id, position.title, position.company);

        Ok(position)
    }

    /// Apply an in-place change to one position and persist
    pub fn update<F>(&mut self, id: &str, change: F) -> Result<&Position, StoreError>
    where
        F: FnOnce(&mut Position),
    {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        change(&mut self.positions[index]);
        self.save()?;

        Ok(&self.positions[index])
    }

    pub fn remove(&mut self, id: &str) -> Result<Position, StoreError> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let removed = self.positions.remove(index);
        self.save()?;

        info!("Removed position {}", id);

        Ok(removed)
    }

    pub fn append_research_message(&mut self, id: &str, message: ChatMessage) -> Result<(), StoreError> {
        self.update(id, |p| p.research_history.push(message))?;
        Ok(())
    }

    pub fn clear_research_history(&mut self, id: &str) -> Result<(), StoreError> {
        self.update(id, |p| p.research_history.clear())?;
        Ok(())
    }

    /// Record an analysis; id and timestamp are assigned here
    pub fn append_analysis_record(
        &mut self,
        id: &str,
        mut record: AnalysisRecord,
    ) -> Result<AnalysisRecord, StoreError> {
        record.id = new_id();
        record.timestamp = Utc::now().timestamp_millis();

        let stored = record.clone();
        self.update(id, |p| p.analysis_history.insert(0, record))?;
        Ok(stored)
    }

    pub fn remove_analysis_record(&mut self, id: &str, record_id: &str) -> Result<(), StoreError> {
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let before = position.analysis_history.len();
        position.analysis_history.retain(|r| r.id != record_id);
        if position.analysis_history.len() == before {
            return Err(StoreError::RecordNotFound(record_id.to_string()));
        }

        self.save()?;
        info!("Removed analysis record {} from position {}", record_id, id);

        Ok(())
    }

    /// Record a finished mock interview transcript
    pub fn append_interview(&mut self, id: &str, turns: Vec<Turn>) -> Result<InterviewRecord, StoreError> {
        let record = InterviewRecord {
            id: new_id(),
            timestamp: Utc::now().timestamp_millis(),
            turns,
        };

        let stored = record.clone();
        self.update(id, |p| p.interview_history.insert(0, record))?;
        Ok(stored)
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.positions)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Position store saved to {}", self.path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::store::position::ChatRole;
    use tempfile::TempDir;

    fn new_position(title: &str) -> NewPosition {
        NewPosition {
            title: title.to_string(),
            company: "Acme".to_string(),
            description: "Build things".to_string(),
            requirements: vec!["Rust".to_string()],
            interview_date: None,
        }
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = PositionStore::open(dir.path().join("positions.json")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_add_prepends_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("positions.json");

        let mut store = PositionStore::open(&path).unwrap();
        store.add(new_position("First")).unwrap();
        let second = store.add(new_position("Second")).unwrap();

        assert_eq!(store.list()[0].id, second.id);
        assert_eq!(second.id.len(), 9);

        let reopened = PositionStore::open(&path).unwrap();
        let titles: Vec<&str> = reopened.list().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[test]
    fn test_histories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        let mut store = PositionStore::open(&path).unwrap();
        let pos = store.add(new_position("Engineer")).unwrap();

        store
            .append_research_message(
                &pos.id,
                ChatMessage {
                    role: ChatRole::User,
                    text: "What does Acme do?".to_string(),
                    links: vec![],
                },
            )
            .unwrap();

        let first = store
            .append_interview(
                &pos.id,
                vec![Turn { role: Role::Interviewer, text: "Hello".to_string() }],
            )
            .unwrap();
        let second = store.append_interview(&pos.id, vec![]).unwrap();

        let reopened = PositionStore::open(&path).unwrap();
        let stored = reopened.get(&pos.id).unwrap();
        assert_eq!(stored.research_history.len(), 1);
        assert_eq!(stored.interview_history[0].id, second.id);
        assert_eq!(stored.interview_history[1], first);

        store.clear_research_history(&pos.id).unwrap();
        assert!(store.get(&pos.id).unwrap().research_history.is_empty());
    }

    fn analysis(score: f64) -> AnalysisRecord {
        AnalysisRecord {
            id: String::new(),
            timestamp: 0,
            score,
            feedback: "Solid answers".to_string(),
            strengths: vec!["Structure".to_string()],
            weaknesses: vec![],
            metrics: vec![],
            transcript: "Interviewer: Hello".to_string(),
        }
    }

    #[test]
    fn test_analysis_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        let mut store = PositionStore::open(&path).unwrap();
        let pos = store.add(new_position("Engineer")).unwrap();

        let older = store.append_analysis_record(&pos.id, analysis(70.0)).unwrap();
        let newer = store.append_analysis_record(&pos.id, analysis(85.0)).unwrap();
        assert_eq!(newer.id.len(), 9);
        assert!(newer.timestamp > 0);
        assert_eq!(store.get(&pos.id).unwrap().analysis_history[0].id, newer.id);

        store.remove_analysis_record(&pos.id, &older.id).unwrap();
        assert!(matches!(
            store.remove_analysis_record(&pos.id, &older.id),
            Err(StoreError::RecordNotFound(_))
        ));

        let reopened = PositionStore::open(&path).unwrap();
        let history = &reopened.get(&pos.id).unwrap().analysis_history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score, 85.0);
    }

    #[test]
    fn test_unknown_position() {
        let dir = TempDir::new().unwrap();
        let mut store = PositionStore::open(dir.path().join("positions.json")).unwrap();
        assert!(matches!(store.remove("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.append_interview("nope", vec![]), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_reads_camel_case_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(
            &path,
            r#"[{"id":"abc123xyz","title":"PM","company":"Acme","description":"","requirements":[],"createdAt":1700000000000,
                 "analysisHistory":[{"id":"r1","timestamp":1,"score":80,"feedback":"ok","strengths":[],"weaknesses":[],
                 "metrics":[{"subject":"Clarity","A":8,"fullMark":10}],"transcript":""}]}]"#,
        )
        .unwrap();

        let store = PositionStore::open(&path).unwrap();
        let pos = store.get("abc123xyz").unwrap();
        assert_eq!(pos.analysis_history[0].metrics[0].score, 8.0);
        assert!(pos.interview_history.is_empty());
    }
}
