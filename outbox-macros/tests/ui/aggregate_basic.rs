use outbox_domain::aggregate::Aggregate;
use outbox_domain::entity::Entity;
use outbox_macros::{aggregate, domain_event};

#[aggregate(id = String, name = "account")]
#[derive(Debug, Clone)]
struct Account {
    name: String,
}

#[domain_event]
#[derive(Debug, Clone)]
struct Opened {
    name: String,
}

fn main() {
    let mut acc = Account::new("a-1".to_string());
    acc.name = "alice".into();
    acc.record_event(&Opened { name: acc.name.clone() }).unwrap();
    assert_eq!(Account::TYPE, "account");
    assert_eq!(acc.pull_events().len(), 1);
}
