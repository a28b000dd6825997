use anyhow::Result as AnyResult;
use chrono::Utc;
use outbox_domain::aggregate::Aggregate;
use outbox_domain::entity::Entity;
use outbox_domain::error::{DomainError, DomainResult};
use outbox_domain::outbox::{OutboxRecord, OutboxStatus};
use outbox_macros::{aggregate, domain_event};

#[aggregate(id = String, name = "vote")]
#[derive(Debug, Clone)]
struct PromptVotes {
    up: u32,
    down: u32,
}

#[domain_event(name = "VoteCast")]
#[derive(Debug, Clone, PartialEq)]
struct VoteCast {
    prompt_id: String,
    up: bool,
}

impl PromptVotes {
    fn cast(&mut self, up: bool) -> DomainResult<()> {
        if up {
            self.up += 1;
        } else {
            self.down += 1;
        }
        let event = VoteCast {
            prompt_id: self.id().clone(),
            up,
        };
        self.record_event(&event)?;
        Ok(())
    }
}

#[test]
fn drained_events_become_pending_records() -> AnyResult<()> {
    let mut votes = PromptVotes::new("p-7".to_string());
    votes.cast(true)?;
    votes.cast(false)?;

    let records: Vec<OutboxRecord> = votes
        .pull_events()
        .iter()
        .map(OutboxRecord::from_event)
        .collect();
    assert!(votes.pull_events().is_empty());
    assert_eq!(records.len(), 2);

    for record in &records {
        assert_eq!(record.aggregate_id(), "p-7");
        assert_eq!(record.event_type(), "VoteCast");
        assert_eq!(record.status(), OutboxStatus::Pending);
        assert_eq!(record.retry_count(), 0);
        assert!(record.published_at().is_none());
        assert!(record.last_error().is_none());
    }
    assert!(records[0].occurred_at() <= records[1].occurred_at());
    assert_eq!(
        records[1].payload_as::<VoteCast>()?,
        VoteCast {
            prompt_id: "p-7".into(),
            up: false,
        }
    );
    Ok(())
}

#[test]
fn retried_then_published_record_keeps_its_failure_count() -> AnyResult<()> {
    let mut votes = PromptVotes::new("p-1".to_string());
    votes.cast(true)?;
    let mut record = OutboxRecord::from_event(&votes.pull_events()[0]);

    assert_eq!(record.record_failure("handler down", 3)?, OutboxStatus::Pending);
    record.mark_published(Utc::now())?;

    assert_eq!(record.status(), OutboxStatus::Published);
    assert_eq!(record.retry_count(), 1);
    assert_eq!(record.last_error(), Some("handler down"));
    assert!(matches!(
        record.record_failure("late", 3),
        Err(DomainError::InvalidState { .. })
    ));
    Ok(())
}

#[test]
fn stored_document_round_trips_through_the_persisted_shape() -> AnyResult<()> {
    let mut votes = PromptVotes::new("p-2".to_string());
    votes.cast(true)?;
    let mut record = OutboxRecord::from_event(&votes.pull_events()[0]);
    record.record_failure("boom", 1)?;

    let doc = serde_json::to_value(&record)?;
    assert_eq!(doc["status"], "FAILED");
    assert_eq!(doc["retryCount"], 1);
    assert_eq!(doc["lastError"], "boom");
    assert_eq!(doc["eventType"], "VoteCast");

    let restored: OutboxRecord = serde_json::from_value(doc)?;
    assert_eq!(restored, record);
    Ok(())
}
