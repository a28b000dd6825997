use outbox_domain::entity::Entity;
use outbox_macros::aggregate;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
struct PromptId(String);

impl std::fmt::Display for PromptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PromptId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[aggregate(id = PromptId)]
struct Prompt {
    title: String,
}

fn main() {
    let p = Prompt::new(PromptId("p-1".into()));
    assert_eq!(p.id(), &PromptId("p-1".into()));
    assert!(p.title.is_empty());
}
