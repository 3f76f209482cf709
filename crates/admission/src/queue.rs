use chrono::{DateTime, Utc};
use serde::Serialize;
use sy_domain::Result;
use uuid::Uuid;

/// A request parked until its provider has rate budget again.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedRequest {
    pub id: Uuid,
    pub provider: String,
    pub estimated_tokens: u64,
    /// Higher drains first; FIFO among equals.
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
    /// When the provider's minute window next resets, i.e. the earliest
    /// this request could plausibly run.
    pub estimated_execution_time: DateTime<Utc>,
}

/// Callback the drain worker hands each dequeued request to.
#[async_trait::async_trait]
pub trait QueueProcessor: Send + Sync {
    async fn process(&self, request: &QueuedRequest) -> Result<()>;
}

/// Insert keeping the queue sorted by descending priority, FIFO among
/// equal priorities.
pub(crate) fn insert_by_priority(queue: &mut Vec<QueuedRequest>, request: QueuedRequest) {
    let pos = queue
        .iter()
        .position(|q| q.priority < request.priority)
        .unwrap_or(queue.len());
    queue.insert(pos, request);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_queued(priority: u8) -> QueuedRequest {
        QueuedRequest {
            id: Uuid::new_v4(),
            provider: "groq".into(),
            estimated_tokens: 100,
            priority,
            enqueued_at: Utc::now(),
            estimated_execution_time: Utc::now(),
        }
    }

    #[test]
    fn drains_by_priority_then_fifo() {
        let mut queue = Vec::new();
        let first_five = make_queued(5);
        insert_by_priority(&mut queue, make_queued(1));
        insert_by_priority(&mut queue, make_queued(10));
        insert_by_priority(&mut queue, first_five.clone());
        insert_by_priority(&mut queue, make_queued(5));

        let priorities: Vec<u8> = queue.iter().map(|q| q.priority).collect();
        assert_eq!(priorities, vec![10, 5, 5, 1]);
        // FIFO among the two priority-5 entries.
        assert_eq!(queue[1].id, first_five.id);
    }
}
