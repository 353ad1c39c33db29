//! REST request/response bodies. All JSON is camelCase; the wire shape
//! is deliberately decoupled from the internal `model` types so storage
//! layout can change without moving the HTTP contract.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Event, Network, Subscription, SubscriptionFilters, SubscriptionStatus, WalletType};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription_id: String,
    pub address: String,
    pub network: Network,
    pub webhook_url: Option<String>,
    pub filters: SubscriptionFilters,
    pub status: SubscriptionStatus,
    pub events_count: i64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub start_block: i64,
    pub current_block: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            subscription_id: s.subscription_id,
            address: s.address,
            network: s.network,
            webhook_url: (!s.webhook_url.is_empty()).then_some(s.webhook_url),
            filters: s.filters,
            status: s.status,
            events_count: s.events_count,
            last_event_at: s.last_event_at,
            start_block: s.start_block,
            current_block: s.current_block,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Adds watchlist-specific context (`walletType`, `label`, `userId`) to the
/// base subscription fields, used by the `/watchlist*` family of endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchListResponse {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub wallet_type: WalletType,
    pub user_id: Option<String>,
    pub label: Option<String>,
}

impl From<Subscription> for WatchListResponse {
    fn from(s: Subscription) -> Self {
        Self {
            wallet_type: s.wallet_type,
            user_id: s.user_id.clone(),
            label: s.label.clone(),
            subscription: s.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub event_id: String,
    pub subscription_id: String,
    pub network: Network,
    #[serde(rename = "type")]
    pub event_type: String,
    pub address: String,
    pub tx_hash: String,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub data: Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(e: Event) -> Self {
        Self {
            event_id: e.event_id,
            subscription_id: e.subscription_id,
            network: e.network,
            event_type: e.event_type,
            address: e.address,
            tx_hash: e.tx_hash,
            block_number: e.block_number,
            block_timestamp: e.block_timestamp,
            data: e.data,
            processed: e.processed,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub address: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub filters: SubscriptionFilters,
    #[serde(default)]
    pub start_block: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchAddressRequest {
    pub address: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub filters: SubscriptionFilters,
    #[serde(default)]
    pub start_block: Option<i64>,
    #[serde(default)]
    pub wallet_type: WalletType,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWatchRequest {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWatchResponse {
    pub success: Vec<String>,
    pub failed: Vec<BulkWatchFailure>,
    pub total: usize,
    pub added: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWatchFailure {
    pub address: String,
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubscribeRequest {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub scan_gap: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubscribeResponse {
    pub subscription: SubscriptionResponse,
    pub gap_detected: bool,
    pub gap_start: i64,
    pub gap_end: i64,
    pub gap_scanning: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub from_block: i64,
    #[serde(default)]
    pub to_block: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct EventListQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct WatchlistQuery {
    pub wallet_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub active_monitors: usize,
    pub uptime: String,
}

#[derive(Debug, Serialize)]
pub struct SimpleStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}
