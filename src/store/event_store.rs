//! Event Store: append-only persistence of routed events. Like the
//! subscription store, the real document-store driver is out of scope;
//! this is the trait plus an in-memory default.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::AppError;
use crate::model::Event;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Duplicate `event_id` is benign — logged and treated as already
    /// persisted rather than surfaced as an error.
    async fn append(&self, event: Event) -> Result<(), AppError>;
    async fn get(&self, id: &str) -> Result<Option<Event>, AppError>;
    async fn list(&self, limit: i64, skip: i64, address: Option<&str>) -> Result<(Vec<Event>, i64), AppError>;
    async fn get_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<Event>, AppError>;
}

#[derive(Default)]
pub struct InMemoryEventStore {
    rows: DashMap<String, Event>,
}

impl InMemoryEventStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: Event) -> Result<(), AppError> {
        if self.rows.contains_key(&event.event_id) {
            warn!(event_id = %event.event_id, "duplicate event id, skipping insert");
            return Ok(());
        }
        self.rows.insert(event.event_id.clone(), event);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Event>, AppError> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn list(&self, limit: i64, skip: i64, address: Option<&str>) -> Result<(Vec<Event>, i64), AppError> {
        let mut all: Vec<Event> = self
            .rows
            .iter()
            .filter(|r| address.map(|a| r.address == a).unwrap_or(true))
            .map(|r| r.clone())
            .collect();
        all.sort_by_key(|e| e.created_at);
        all.reverse();
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn get_by_tx_hash(&self, tx_hash: &str) -> Result<Vec<Event>, AppError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.tx_hash == tx_hash)
            .map(|r| r.clone())
            .collect())
    }
}
