//! WebSocket upgrade entry point. Pre-upgrade checks happen here so
//! the hub itself never has to reason about whether the subscription exists.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::manager::Manager;
use crate::model::SubscriptionStatus;

pub async fn stream_events(
    State(manager): State<Arc<Manager>>,
    Path(subscription_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    match manager.subscription_store().get(&subscription_id).await {
        Ok(Some(sub)) if sub.status == SubscriptionStatus::Active => {
            let registry = manager.ws_registry().clone();
            ws.on_upgrade(move |socket| crate::ws::handle_socket(socket, subscription_id, registry))
        }
        Ok(Some(_)) => (
            StatusCode::NOT_FOUND,
            format!("subscription {subscription_id} is not active"),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("subscription {subscription_id} not found"),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
