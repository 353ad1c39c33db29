//! HTTP/WS surface. Builds the axum `Router`; all handlers share a
//! single piece of state, the `Manager`, which is the only thing that talks
//! to the chain or the stores.

pub mod dto;
pub mod handlers;
pub mod ws_handler;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::manager::Manager;

pub fn build_router(manager: Arc<Manager>) -> Router {
    let v1 = Router::new()
        .route("/subscriptions", post(handlers::create_subscription).get(handlers::list_subscriptions))
        .route(
            "/subscriptions/:id",
            get(handlers::get_subscription).delete(handlers::delete_subscription),
        )
        .route("/watchlist", post(handlers::watch_address).get(handlers::list_watchlist))
        .route("/watchlist/bulk", post(handlers::bulk_watch))
        .route("/watchlist/:address/resubscribe", post(handlers::resubscribe))
        .route("/watchlist/:address/scan", post(handlers::scan))
        .route("/watchlist/:address", delete(handlers::unwatch))
        .route("/events", get(handlers::list_events))
        .route("/events/:id", get(handlers::get_event))
        .route("/events/tx/:hash", get(handlers::get_events_by_tx))
        .route("/events/stream/:subscriptionId", get(ws_handler::stream_events));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/live", get(handlers::live))
        .nest("/api/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(manager)
}
