//! REST handlers: thin adapters translating HTTP to `Manager`
//! operations. Validation beyond what the manager already performs (address
//! shape, pagination bounds) lives here so the manager stays transport-
//! agnostic.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::manager::{Manager, ResubscribeResult, SubscribeOptions};
use crate::model::SubscriptionStatus;

use super::dto::*;

const DEFAULT_SUBSCRIPTION_LIMIT: i64 = 20;
const DEFAULT_EVENT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    match limit {
        Some(l) if l >= 1 && l <= MAX_LIMIT => l,
        _ => default,
    }
}

pub async fn health(State(manager): State<Arc<Manager>>) -> Json<HealthResponse> {
    let uptime = manager.uptime();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        active_monitors: manager.active_monitor_count(),
        uptime: format!("{}s", uptime.num_seconds().max(0)),
    })
}

pub async fn ready(State(manager): State<Arc<Manager>>) -> impl axum::response::IntoResponse {
    if manager.subscription_store().list_active().await.is_ok() {
        (
            StatusCode::OK,
            Json(SimpleStatus { status: "ready", timestamp: Utc::now() }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse { error: "not_ready", message: "subscription store unavailable".to_string() }),
        )
            .into_response()
    }
}

pub async fn live() -> Json<SimpleStatus> {
    Json(SimpleStatus { status: "alive", timestamp: Utc::now() })
}

pub async fn create_subscription(
    State(manager): State<Arc<Manager>>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    let subscription = manager
        .subscribe(SubscribeOptions {
            address: req.address,
            webhook_url: req.webhook_url,
            filters: req.filters,
            start_block: req.start_block,
            ..Default::default()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
    pub total: i64,
    pub limit: i64,
    pub skip: i64,
}

pub async fn list_subscriptions(
    State(manager): State<Arc<Manager>>,
    Query(q): Query<PageQuery>,
) -> AppResult<Json<SubscriptionListResponse>> {
    let limit = clamp_limit(q.limit, DEFAULT_SUBSCRIPTION_LIMIT);
    let skip = q.skip.unwrap_or(0).max(0);
    let (rows, total) = manager.subscription_store().list(limit, skip).await?;
    Ok(Json(SubscriptionListResponse {
        subscriptions: rows.into_iter().map(Into::into).collect(),
        total,
        limit,
        skip,
    }))
}

pub async fn get_subscription(
    State(manager): State<Arc<Manager>>,
    Path(id): Path<String>,
) -> AppResult<Json<SubscriptionResponse>> {
    let sub = manager
        .subscription_store()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;
    Ok(Json(sub.into()))
}

pub async fn delete_subscription(
    State(manager): State<Arc<Manager>>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    manager.delete(&id).await?;
    Ok(Json(DeleteResponse { success: true, message: format!("subscription {id} deleted") }))
}

pub async fn watch_address(
    State(manager): State<Arc<Manager>>,
    Json(req): Json<WatchAddressRequest>,
) -> AppResult<(StatusCode, Json<WatchListResponse>)> {
    let subscription = manager
        .subscribe(SubscribeOptions {
            address: req.address,
            webhook_url: req.webhook_url,
            filters: req.filters,
            start_block: req.start_block,
            wallet_type: req.wallet_type,
            user_id: req.user_id,
            label: req.label,
            metadata: req.metadata,
            ..Default::default()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn bulk_watch(
    State(manager): State<Arc<Manager>>,
    Json(req): Json<BulkWatchRequest>,
) -> AppResult<Json<BulkWatchResponse>> {
    if req.addresses.len() > 1000 {
        return Err(AppError::Validation("at most 1000 addresses per bulk request".to_string()));
    }
    let items: Vec<SubscribeOptions> = req
        .addresses
        .iter()
        .map(|addr| SubscribeOptions {
            address: addr.clone(),
            webhook_url: req.webhook_url.clone(),
            ..Default::default()
        })
        .collect();
    let total = items.len();
    let result = manager.batch_subscribe(items).await;
    let added = result.success.len();
    Ok(Json(BulkWatchResponse {
        success: result.success.into_iter().map(|s| s.address).collect(),
        failed: result
            .failed
            .into_iter()
            .map(|(address, error)| BulkWatchFailure { address, error })
            .collect(),
        total,
        added,
    }))
}

async fn lookup_by_address(manager: &Manager, address: &str) -> AppResult<String> {
    manager
        .subscription_store()
        .get_by_address(address)
        .await?
        .map(|s| s.subscription_id)
        .ok_or_else(|| AppError::NotFound(format!("no active subscription for address {address}")))
}

pub async fn resubscribe(
    State(manager): State<Arc<Manager>>,
    Path(address): Path<String>,
    Json(req): Json<ResubscribeRequest>,
) -> AppResult<Json<ResubscribeResponse>> {
    let ResubscribeResult { subscription, gap_detected, gap_start, gap_end, gap_scanning } =
        manager.resubscribe(&address, req.webhook_url, None, req.scan_gap).await?;
    Ok(Json(ResubscribeResponse {
        subscription: subscription.into(),
        gap_detected,
        gap_start,
        gap_end,
        gap_scanning,
    }))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: &'static str,
    pub subscription_id: String,
    pub from_block: i64,
    pub to_block: i64,
}

pub async fn scan(
    State(manager): State<Arc<Manager>>,
    Path(address): Path<String>,
    Json(req): Json<ScanRequest>,
) -> AppResult<(StatusCode, Json<ScanResponse>)> {
    let id = lookup_by_address(&manager, &address).await?;
    let to_block = match req.to_block {
        Some(b) => b,
        None => manager
            .subscription_store()
            .get(&id)
            .await?
            .map(|s| s.current_block)
            .unwrap_or(req.from_block),
    };

    let scan_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = manager.scan_historical(&scan_id, req.from_block, to_block).await {
            tracing::warn!(subscription_id = %scan_id, error = %e, "on-demand scan failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanResponse { status: "scanning", subscription_id: id, from_block: req.from_block, to_block }),
    ))
}

pub async fn unwatch(
    State(manager): State<Arc<Manager>>,
    Path(address): Path<String>,
) -> AppResult<Json<DeleteResponse>> {
    let id = lookup_by_address(&manager, &address).await?;
    manager.delete(&id).await?;
    Ok(Json(DeleteResponse { success: true, message: format!("address {address} unwatched") }))
}

pub async fn list_watchlist(
    State(manager): State<Arc<Manager>>,
    Query(q): Query<WatchlistQuery>,
) -> AppResult<Json<Vec<WatchListResponse>>> {
    let (rows, _total) = manager.subscription_store().list(MAX_LIMIT, 0).await?;
    let filtered = rows
        .into_iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
        .filter(|s| {
            q.wallet_type
                .as_deref()
                .map(|wt| format!("{:?}", s.wallet_type).eq_ignore_ascii_case(wt))
                .unwrap_or(true)
        })
        .map(Into::into)
        .collect();
    Ok(Json(filtered))
}

pub async fn list_events(
    State(manager): State<Arc<Manager>>,
    Query(q): Query<EventListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = clamp_limit(q.limit, DEFAULT_EVENT_LIMIT);
    let skip = q.skip.unwrap_or(0).max(0);
    let (rows, total) = manager.event_store().list(limit, skip, q.address.as_deref()).await?;
    Ok(Json(serde_json::json!({
        "events": rows.into_iter().map(EventResponse::from).collect::<Vec<_>>(),
        "total": total,
        "limit": limit,
        "skip": skip,
    })))
}

pub async fn get_event(
    State(manager): State<Arc<Manager>>,
    Path(id): Path<String>,
) -> AppResult<Json<EventResponse>> {
    let event = manager
        .event_store()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {id}")))?;
    Ok(Json(event.into()))
}

pub async fn get_events_by_tx(
    State(manager): State<Arc<Manager>>,
    Path(hash): Path<String>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let events = manager.event_store().get_by_tx_hash(&hash).await?;
    if events.is_empty() {
        return Err(AppError::NotFound(format!("no events for tx {hash}")));
    }
    Ok(Json(events.into_iter().map(Into::into).collect()))
}
