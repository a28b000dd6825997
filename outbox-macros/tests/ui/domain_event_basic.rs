use outbox_domain::domain_event::EventPayload;
use outbox_macros::domain_event;
use serde::{Deserialize, Serialize};

#[domain_event]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PromptCreated {
    prompt_id: String,
}

#[domain_event(name = "prompt.archived")]
struct PromptArchived {
    prompt_id: String,
}

fn main() {
    assert_eq!(PromptCreated::NAME, "PromptCreated");
    assert_eq!(PromptArchived::NAME, "prompt.archived");
    let _ = PromptArchived {
        prompt_id: "p-1".into(),
    }
    .prompt_id;
}
