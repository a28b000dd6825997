use chrono::{DateTime, Utc};
use outbox_domain::aggregate::Aggregate;
use outbox_domain::entity::Entity;
use outbox_domain::error::{DomainError, DomainResult};
use outbox_macros::{aggregate, domain_event};

pub const MAX_TITLE_LEN: usize = 200;

#[aggregate(id = String, name = "prompt")]
#[derive(Debug, Clone)]
pub struct Prompt {
    title: String,
    content: String,
    author_id: String,
    created_at: DateTime<Utc>,
}

#[domain_event(name = "PromptCreated")]
#[derive(Debug, Clone)]
pub struct PromptCreated {
    pub prompt_id: String,
    pub author_id: String,
    pub title: String,
}

impl Prompt {
    /// 创建提示词并记录 `PromptCreated`
    pub fn create(id: String, title: &str, content: &str, author_id: &str) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::invalid_value("prompt title must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::invalid_value(format!(
                "prompt title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        if content.trim().is_empty() {
            return Err(DomainError::invalid_value("prompt content must not be empty"));
        }

        let mut prompt = Prompt::new(id);
        prompt.title = title.to_string();
        prompt.content = content.to_string();
        prompt.author_id = author_id.to_string();
        prompt.created_at = Utc::now();

        let event = PromptCreated {
            prompt_id: prompt.id().clone(),
            author_id: prompt.author_id.clone(),
            title: prompt.title.clone(),
        };
        prompt.record_event(&event)?;
        Ok(prompt)
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_records_exactly_one_event() {
        let mut prompt = Prompt::create("p-1".into(), "  Rust tips ", "Use ?", "u-1").unwrap();
        assert_eq!(prompt.title(), "Rust tips");

        let events = prompt.pull_events();
        assert_eq!(events.len(), 1);
        let created: PromptCreated = events[0].decode().unwrap();
        assert_eq!(created.prompt_id, "p-1");
        assert_eq!(created.author_id, "u-1");
        assert!(!prompt.has_events());
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(Prompt::create("p-1".into(), " ", "x", "u-1").is_err());
        assert!(Prompt::create("p-1".into(), "t", "", "u-1").is_err());
        assert!(Prompt::create("p-1".into(), &"x".repeat(201), "c", "u-1").is_err());
    }
}
