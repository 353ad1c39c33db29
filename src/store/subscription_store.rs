//! Subscription Store: CRUD + status/block-cursor updates. The
//! document-store driver backing a real deployment is an out-of-scope
//! external collaborator — this module defines the trait the rest of
//! the core programs against, plus an in-memory implementation suitable for
//! tests and small deployments.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::model::{Subscription, SubscriptionStatus};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn create(&self, subscription: Subscription) -> Result<(), AppError>;
    async fn get(&self, id: &str) -> Result<Option<Subscription>, AppError>;
    /// Current behaviour permits multiple active subscriptions per address
    /// (treated as benign, not a conflict); returns the first active one found.
    async fn get_by_address(&self, address: &str) -> Result<Option<Subscription>, AppError>;
    async fn find_stopped_by_address(&self, address: &str) -> Result<Option<Subscription>, AppError>;
    async fn list(&self, limit: i64, skip: i64) -> Result<(Vec<Subscription>, i64), AppError>;
    async fn list_active(&self) -> Result<Vec<Subscription>, AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
    /// Single-field status update; also snapshots `last_seen_block` when
    /// provided, atomically with the status change (matching the
    /// Unsubscribe invariant).
    async fn set_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
        last_seen_block: Option<i64>,
    ) -> Result<(), AppError>;
    async fn set_current_block(&self, id: &str, current_block: i64) -> Result<(), AppError>;
    async fn record_event(&self, id: &str) -> Result<(), AppError>;
    /// Reactivates a previously-stopped record for Resubscribe: flips
    /// status back to active and applies the caller's new webhook/filters.
    /// `last_seen_block`/`current_block` are left untouched so the gap-scan
    /// boundary survives the reactivation.
    async fn reactivate(
        &self,
        id: &str,
        webhook_url: String,
        filters: crate::model::SubscriptionFilters,
    ) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    rows: DashMap<String, Subscription>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn create(&self, subscription: Subscription) -> Result<(), AppError> {
        if self.rows.contains_key(&subscription.subscription_id) {
            return Err(AppError::Conflict(format!(
                "subscription {} already exists",
                subscription.subscription_id
            )));
        }
        self.rows.insert(subscription.subscription_id.clone(), subscription);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.address == address && r.status == SubscriptionStatus::Active)
            .map(|r| r.clone())
            .next())
    }

    async fn find_stopped_by_address(&self, address: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.address == address && r.status == SubscriptionStatus::Stopped && r.last_seen_block > 0)
            .map(|r| r.clone())
            .next())
    }

    async fn list(&self, limit: i64, skip: i64) -> Result<(Vec<Subscription>, i64), AppError> {
        let mut all: Vec<Subscription> = self.rows.iter().map(|r| r.clone()).collect();
        all.sort_by_key(|s| s.created_at);
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_active(&self) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.status == SubscriptionStatus::Active)
            .map(|r| r.clone())
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.rows.remove(id);
        Ok(())
    }

    async fn set_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
        last_seen_block: Option<i64>,
    ) -> Result<(), AppError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        row.status = status;
        if let Some(block) = last_seen_block {
            row.last_seen_block = block;
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn set_current_block(&self, id: &str, current_block: i64) -> Result<(), AppError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        if current_block > row.current_block {
            row.current_block = current_block;
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn record_event(&self, id: &str) -> Result<(), AppError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        row.events_count += 1;
        row.last_event_at = Some(Utc::now());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn reactivate(
        &self,
        id: &str,
        webhook_url: String,
        filters: crate::model::SubscriptionFilters,
    ) -> Result<(), AppError> {
        let mut row = self
            .rows
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
        row.status = SubscriptionStatus::Active;
        row.webhook_url = webhook_url;
        row.filters = filters;
        row.updated_at = Utc::now();
        Ok(())
    }
}
