use serde::{Deserialize, Serialize};

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
}

/// One contiguous block of speech by a single role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Folds transcript fragments and turn-complete markers into turns
///
/// A fragment extends the in-progress turn when it has the same role;
/// otherwise it starts a new turn. A turn-complete marker closes the
/// in-progress turn so the next fragment of either role starts fresh.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAssembler {
    turns: Vec<Turn>,
    /// Role of the turn still accepting fragments (always the last turn)
    in_progress: Option<Role>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fragment(&mut self, role: Role, text: &str) {
        if text.is_empty() {
            return;
        }

        match self.turns.last_mut() {
            Some(last) if self.in_progress == Some(role) => last.text.push_str(text),
            _ => {
                self.turns.push(Turn {
                    role,
                    text: text.to_string(),
                });
                self.in_progress = Some(role);
            }
        }
    }

    pub fn turn_complete(&mut self) {
        self.in_progress = None;
    }

    pub fn in_progress(&self) -> Option<Role> {
        self.in_progress
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.in_progress = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_accumulate_within_turn() {
        let mut t = TranscriptAssembler::new();
        t.push_fragment(Role::Interviewer, "Hello, ");
        t.push_fragment(Role::Interviewer, "welcome.");

        assert_eq!(t.turns().len(), 1);
        assert_eq!(t.turns()[0].text, "Hello, welcome.");
        assert_eq!(t.in_progress(), Some(Role::Interviewer));
    }

    #[test]
    fn test_turn_complete_starts_fresh_turn_for_same_role() {
        let mut t = TranscriptAssembler::new();
        t.push_fragment(Role::Interviewer, "First.");
        t.turn_complete();
        t.push_fragment(Role::Interviewer, "Second.");

        assert_eq!(
            t.turns(),
            &[
                Turn { role: Role::Interviewer, text: "First.".to_string() },
                Turn { role: Role::Interviewer, text: "Second.".to_string() },
            ]
        );
    }

    #[test]
    fn test_role_switch_does_not_duplicate_text() {
        let mut t = TranscriptAssembler::new();
        t.push_fragment(Role::Interviewer, "A");
        t.push_fragment(Role::Candidate, "B");
        t.push_fragment(Role::Interviewer, "C");

        let texts: Vec<&str> = t.turns().iter().map(|turn| turn.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_empty_fragments_are_ignored() {
        let mut t = TranscriptAssembler::new();
        t.push_fragment(Role::Candidate, "");
        t.turn_complete();
        assert!(t.turns().is_empty());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Turn {
            role: Role::Candidate,
            text: "Hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"role":"candidate","text":"Hi"}"#);
    }
}
