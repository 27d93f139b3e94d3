use super::position::Position;

/// System instruction for the live interviewer of a position
pub fn interview_system_prompt(position: &Position) -> String {
    let requirements = if position.requirements.is_empty() {
        "the core skills of the role".to_string()
    } else {
        position.requirements.join(", ")
    };

    format!(
        "You are a senior interviewer from {company}. You are interviewing a candidate \
         for the position of {title}.\n\
         \n\
         Job description: {description}\n\
         \n\
         Process:\n\
         1. Politely welcome the candidate and confirm they are ready.\n\
         2. Start formally by asking for a 1-2 minute self-introduction.\n\
         3. Based on the introduction, dig into the core requirements one at a time: {requirements}.\n\
         4. Stay professional, sharp and friendly. If an answer is vague, ask follow-up questions about the details.\n\
         \n\
         Keep it a natural conversation and never list several questions at once.",
        company = position.company,
        title = position.title,
        description = position.description,
        requirements = requirements,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(requirements: Vec<&str>) -> Position {
        Position {
            id: "p1".to_string(),
            title: "Staff Engineer".to_string(),
            company: "Acme".to_string(),
            description: "Own the storage layer".to_string(),
            requirements: requirements.into_iter().map(String::from).collect(),
            created_at: 0,
            interview_date: None,
            logo_url: None,
            banner_url: None,
            research_history: vec![],
            analysis_history: vec![],
            interview_history: vec![],
        }
    }

    #[test]
    fn test_prompt_mentions_position() {
        let prompt = interview_system_prompt(&position(vec!["Rust", "Distributed systems"]));
        assert!(prompt.contains("from Acme"));
        assert!(prompt.contains("Staff Engineer"));
        assert!(prompt.contains("Own the storage layer"));
        assert!(prompt.contains("Rust, Distributed systems"));
    }

    #[test]
    fn test_prompt_without_requirements() {
        let prompt = interview_system_prompt(&position(vec![]));
        assert!(prompt.contains("the core skills of the role"));
    }
}
