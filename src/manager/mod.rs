//! Subscription Manager: the central coordinator binding the
//! subscription store, the monitor pool, and the Router. Owns the monitor
//! pool and the per-monitor event-processing loop; everything else (HTTP/WS
//! handlers) talks to the chain exclusively through this type.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::{AddressEvent, Network, Subscription, SubscriptionFilters, SubscriptionStatus, WalletType};
use crate::monitor::Monitor;
use crate::parser::AbiDecoder;
use crate::router::{Router, ThirdPartyConfig};
use crate::store::{EventStore, SubscriptionStore};
use crate::tron::address::is_valid_address;
use crate::tron::client::TronClient;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Input to `Subscribe`/`Resubscribe` (the `Subscription` fields the caller
/// is allowed to set).
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub address: String,
    pub network: Network,
    pub webhook_url: Option<String>,
    pub filters: SubscriptionFilters,
    pub start_block: Option<i64>,
    pub wallet_type: WalletType,
    pub user_id: Option<String>,
    pub label: Option<String>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct ResubscribeResult {
    pub subscription: Subscription,
    pub gap_detected: bool,
    pub gap_start: i64,
    pub gap_end: i64,
    pub gap_scanning: bool,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub success: Vec<Subscription>,
    pub failed: Vec<(String, String)>,
}

pub struct Manager {
    subscription_store: Arc<dyn SubscriptionStore>,
    event_store: Arc<dyn EventStore>,
    client: TronClient,
    abi: Arc<AbiDecoder>,
    router: Arc<Router>,
    ws_registry: Arc<crate::router::ClientRegistry>,
    pool: dashmap::DashMap<String, Arc<Monitor>>,
    started_at: DateTime<Utc>,
    /// Lets a `&self` method hand out an owned `Arc<Self>` to a spawned task
    /// without every caller threading an `Arc` through by hand.
    weak_self: Weak<Self>,
}

impl Manager {
    pub fn new(
        config: &Config,
        subscription_store: Arc<dyn SubscriptionStore>,
        event_store: Arc<dyn EventStore>,
        ws_registry: Arc<crate::router::ClientRegistry>,
    ) -> Arc<Self> {
        let client = TronClient::new(&config.blockchain.tron.node);
        let abi = Arc::new(AbiDecoder::new(client.clone()));

        let third_party = config.notifications.enabled().then(|| ThirdPartyConfig {
            operations_endpoint: config.notifications.operations_endpoint.clone(),
            trc20_transfer_endpoint: config.notifications.trc20_transfer_endpoint.clone(),
        });
        let router = Router::start(ws_registry.clone(), event_store.clone(), abi.clone(), third_party);

        Arc::new_cyclic(|weak_self| Self {
            subscription_store,
            event_store,
            client,
            abi,
            router,
            ws_registry,
            pool: dashmap::DashMap::new(),
            started_at: Utc::now(),
            weak_self: weak_self.clone(),
        })
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    pub fn subscription_store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.subscription_store
    }

    pub fn ws_registry(&self) -> &Arc<crate::router::ClientRegistry> {
        &self.ws_registry
    }

    pub fn active_monitor_count(&self) -> usize {
        self.pool.len()
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    /// Boot-time reconciliation: spawn a monitor for every
    /// `status=active` record. A monitor that fails to start is logged and
    /// left as active without a live monitor — fixed by manual admin action,
    /// not auto-demoted.
    pub async fn start(&self) -> AppResult<()> {
        let active = self.subscription_store.list_active().await?;
        info!(count = active.len(), "reconciling active subscriptions on boot");
        for subscription in active {
            if let Err(e) = self.spawn_monitor(subscription.clone()).await {
                warn!(
                    subscription_id = %subscription.subscription_id,
                    error = %e,
                    "failed to start monitor for active subscription on boot"
                );
            }
        }
        Ok(())
    }

    pub async fn subscribe(&self, opts: SubscribeOptions) -> AppResult<Subscription> {
        if !opts.address.is_empty() && !is_valid_address(&opts.address) {
            return Err(AppError::Validation(format!("invalid address: {}", opts.address)));
        }

        let now = Utc::now();
        let subscription = Subscription {
            subscription_id: format!("sub_{}", Uuid::new_v4().simple()),
            address: opts.address,
            network: opts.network,
            status: SubscriptionStatus::Active,
            start_block: opts.start_block.unwrap_or(-1),
            current_block: 0,
            last_seen_block: 0,
            events_count: 0,
            last_event_at: None,
            webhook_url: opts.webhook_url.unwrap_or_default(),
            filters: opts.filters,
            wallet_type: opts.wallet_type,
            user_id: opts.user_id,
            label: opts.label,
            metadata: opts.metadata,
            created_at: now,
            updated_at: now,
        };

        self.subscription_store.create(subscription.clone()).await?;

        if let Err(e) = self.spawn_monitor(subscription.clone()).await {
            warn!(subscription_id = %subscription.subscription_id, error = %e, "monitor start failed, rolling back subscription");
            let _ = self.subscription_store.delete(&subscription.subscription_id).await;
            return Err(e);
        }

        Ok(subscription)
    }

    /// Idempotent beyond the first call: a second `unsubscribe` on the same
    /// id returns `NotFound` rather than repeating the side effects.
    pub async fn unsubscribe(&self, id: &str) -> AppResult<()> {
        let Some((_, monitor)) = self.pool.remove(id) else {
            return Err(AppError::NotFound(format!("subscription {id}")));
        };
        let cursor = monitor.get_last_block_number();
        monitor.stop();
        self.subscription_store
            .set_status(id, SubscriptionStatus::Stopped, Some(cursor))
            .await?;
        Ok(())
    }

    /// Full administrative delete (`DELETE /subscriptions/:id`): stops
    /// any live monitor, removes the persisted record, and closes every
    /// WebSocket client registered for this subscription.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if let Some((_, monitor)) = self.pool.remove(id) {
            monitor.stop();
        }
        self.subscription_store.delete(id).await?;
        self.ws_registry.close_all(id).await;
        Ok(())
    }

    pub async fn resubscribe(
        &self,
        address: &str,
        webhook_url: Option<String>,
        filters: Option<SubscriptionFilters>,
        scan_gap: bool,
    ) -> AppResult<ResubscribeResult> {
        if !is_valid_address(address) {
            return Err(AppError::Validation(format!("invalid address: {address}")));
        }

        let prior = self.subscription_store.find_stopped_by_address(address).await?;
        let Some(prior) = prior else {
            let subscription = self
                .subscribe(SubscribeOptions {
                    address: address.to_string(),
                    webhook_url,
                    filters: filters.unwrap_or_default(),
                    ..Default::default()
                })
                .await?;
            return Ok(ResubscribeResult {
                subscription,
                gap_detected: false,
                gap_start: 0,
                gap_end: 0,
                gap_scanning: false,
            });
        };

        let gap_start = prior.last_seen_block;
        let resolved_webhook = webhook_url.unwrap_or_else(|| prior.webhook_url.clone());
        let resolved_filters = filters.unwrap_or_else(|| prior.filters.clone());
        self.subscription_store
            .reactivate(&prior.subscription_id, resolved_webhook.clone(), resolved_filters.clone())
            .await?;

        let mut reactivated = prior.clone();
        reactivated.status = SubscriptionStatus::Active;
        reactivated.webhook_url = resolved_webhook;
        reactivated.filters = resolved_filters;

        self.spawn_monitor(reactivated.clone()).await?;
        let gap_end = self
            .pool
            .get(&reactivated.subscription_id)
            .map(|m| m.get_last_block_number())
            .unwrap_or(gap_start);

        let gap_detected = gap_start > 0 && gap_end > gap_start;
        let gap_scanning = gap_detected && scan_gap;
        if gap_scanning {
            let id = reactivated.subscription_id.clone();
            let manager = self.self_handle();
            tokio::spawn(async move {
                if let Err(e) = manager.scan_historical(&id, gap_start, gap_end).await {
                    warn!(subscription_id = %id, error = %e, "gap scan failed");
                }
            });
        }

        Ok(ResubscribeResult {
            subscription: reactivated,
            gap_detected,
            gap_start,
            gap_end,
            gap_scanning,
        })
    }

    pub async fn batch_subscribe(&self, items: Vec<SubscribeOptions>) -> BatchResult {
        let mut result = BatchResult::default();
        for opts in items {
            let address = opts.address.clone();
            match self.subscribe(opts).await {
                Ok(subscription) => result.success.push(subscription),
                Err(e) => result.failed.push((address, e.to_string())),
            }
        }
        result
    }

    /// Replays `(from, to]` through the same filter/Router/store pipeline as
    /// live events as the subscription's own `ScanHistorical`.
    pub async fn scan_historical(&self, id: &str, from: i64, to: i64) -> AppResult<()> {
        let monitor = self
            .pool
            .get(id)
            .map(|m| m.clone())
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))?;

        let mut collected = Vec::new();
        monitor.scan_historical(from, to, |event| collected.push(event)).await?;

        info!(subscription_id = id, count = collected.len(), from, to, "gap scan collected events");
        for event in collected {
            self.handle_event(id, event).await;
        }
        Ok(())
    }

    async fn spawn_monitor(&self, subscription: Subscription) -> AppResult<()> {
        let monitor = if subscription.is_global() {
            Monitor::global(self.client.clone(), self.abi.clone(), subscription.start_block)
        } else {
            Monitor::for_address(
                self.client.clone(),
                self.abi.clone(),
                &subscription.address,
                subscription.start_block,
            )
        };
        let monitor = Arc::new(monitor);
        let rx = monitor.start().await;

        self.pool.insert(subscription.subscription_id.clone(), monitor.clone());

        let handle = self.self_handle();
        let subscription_id = subscription.subscription_id.clone();
        tokio::spawn(async move {
            handle.run_subscription_loop(subscription_id, rx, monitor).await;
        });

        Ok(())
    }

    async fn run_subscription_loop(
        &self,
        subscription_id: String,
        mut rx: mpsc::Receiver<AddressEvent>,
        monitor: Arc<Monitor>,
    ) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let last = monitor.get_last_block_number();
                    match self.subscription_store.get(&subscription_id).await {
                        Ok(Some(sub)) if last > sub.current_block => {
                            if let Err(e) = self.subscription_store.set_current_block(&subscription_id, last).await {
                                warn!(subscription_id, error = %e, "failed to persist cursor on tick");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!(subscription_id, error = %e, "failed to load subscription on tick"),
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(&subscription_id, event).await,
                        None => break,
                    }
                }
            }
        }
        info!(subscription_id, "subscription event loop exited");
    }

    async fn handle_event(&self, subscription_id: &str, event: AddressEvent) {
        let subscription = match self.subscription_store.get(subscription_id).await {
            Ok(Some(sub)) => sub,
            Ok(None) => return,
            Err(e) => {
                warn!(subscription_id, error = %e, "failed to load subscription while handling event");
                return;
            }
        };

        if !subscription.filters.matches(&event) {
            return;
        }

        self.router.submit(subscription.clone(), event.clone());

        if let Err(e) = self.subscription_store.record_event(subscription_id).await {
            warn!(subscription_id, error = %e, "failed to record event count");
        }
        if event.block_number > subscription.current_block {
            if let Err(e) = self
                .subscription_store
                .set_current_block(subscription_id, event.block_number)
                .await
            {
                warn!(subscription_id, error = %e, "failed to persist current_block on event");
            }
        }
    }

    /// Cheap self-reference for tasks spawned off the manager; the manager
    /// is always held behind an `Arc` by its constructor.
    fn self_handle(&self) -> Arc<Self> {
        self.weak_self
            .upgrade()
            .expect("manager outlives any task it spawns")
    }
}
