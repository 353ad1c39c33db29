//! Event Router: bounded queue, WebSocket broadcast, webhook
//! delivery, third-party ("Porto") notifications, and persistent storage.
//! A single task drains the queue; every downstream delivery is spawned as
//! its own fire-and-forget task so a slow webhook never blocks the next
//! event.

pub mod operations;
pub mod trc20;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as AxumMessage;
use chrono::Utc;
use dashmap::DashMap;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::warn;

use crate::model::{AddressEvent, Event, Subscription};
use crate::parser::{self, AbiDecoder};
use crate::store::EventStore;
use crate::tron::types::Transaction;
use crate::ws::WsClient;

pub const QUEUE_CAPACITY: usize = 1000;

/// Where smart-contract-derived operation/transfer notifications are
/// delivered. `None` disables the third-party delivery path entirely.
#[derive(Debug, Clone)]
pub struct ThirdPartyConfig {
    pub operations_endpoint: String,
    pub trc20_transfer_endpoint: String,
}

const OPERATION_CONTRACT_TYPES: &[&str] = &[
    "FreezeBalanceV2Contract",
    "UnfreezeBalanceV2Contract",
    "WithdrawExpireUnfreezeContract",
    "DelegateResourceContract",
    "UnDelegateResourceContract",
    "VoteWitnessContract",
    "AccountPermissionUpdateContract",
    "WithdrawBalanceContract",
];

/// The Router's client registry: the only component permitted to
/// close a `WsClient`'s outbound channel.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<String, Vec<Arc<WsClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, client: Arc<WsClient>) {
        self.clients
            .entry(client.subscription_id.clone())
            .or_default()
            .push(client);
    }

    /// Idempotent: a second unregister for an already-removed client id is
    /// a no-op.
    pub async fn unregister(&self, subscription_id: &str, client_id: &str) {
        let removed = self.clients.get_mut(subscription_id).and_then(|mut entry| {
            let pos = entry.iter().position(|c| c.id == client_id)?;
            Some(entry.remove(pos))
        });
        if let Some(client) = removed {
            client.close().await;
        }
    }

    pub async fn broadcast(&self, subscription_id: &str, json: &str) {
        let Some(clients) = self.clients.get(subscription_id) else {
            return;
        };
        for client in clients.iter() {
            client.try_send(AxumMessage::Text(json.to_string())).await;
        }
    }

    /// Closes and drops every client for a subscription, used when a
    /// subscription is deleted.
    pub async fn close_all(&self, subscription_id: &str) {
        if let Some((_, clients)) = self.clients.remove(subscription_id) {
            for client in clients {
                client.close().await;
            }
        }
    }
}

pub struct RoutedEvent {
    pub subscription: Subscription,
    pub event: AddressEvent,
}

pub struct Router {
    queue_tx: mpsc::Sender<RoutedEvent>,
}

impl Router {
    /// Spawns the router's single consuming task and returns a handle whose
    /// only public operation is submitting events to the bounded queue.
    pub fn start(
        registry: Arc<ClientRegistry>,
        event_store: Arc<dyn EventStore>,
        abi: Arc<AbiDecoder>,
        third_party: Option<ThirdPartyConfig>,
    ) -> Arc<Self> {
        let (queue_tx, mut queue_rx) = mpsc::channel::<RoutedEvent>(QUEUE_CAPACITY);
        let http = Client::new();

        tokio::spawn(async move {
            while let Some(routed) = queue_rx.recv().await {
                process(&routed, &registry, &event_store, &abi, &third_party, &http).await;
            }
        });

        Arc::new(Self { queue_tx })
    }

    /// Non-blocking submit: a full queue drops the event with a warning
    /// rather than applying backpressure to the manager.
    pub fn submit(&self, subscription: Subscription, event: AddressEvent) {
        let tx_hash = event.transaction_id.clone();
        if let Err(mpsc::error::TrySendError::Full(_)) =
            self.queue_tx.try_send(RoutedEvent { subscription, event })
        {
            warn!(tx_hash, "router queue full, dropping event");
        }
    }
}

async fn process(
    routed: &RoutedEvent,
    registry: &Arc<ClientRegistry>,
    event_store: &Arc<dyn EventStore>,
    abi: &Arc<AbiDecoder>,
    third_party: &Option<ThirdPartyConfig>,
    http: &Client,
) {
    let subscription = &routed.subscription;
    let event = &routed.event;

    let data = serde_json::json!({
        "from": event.from,
        "to": event.to,
        "amount": event.amount,
        "asset": event.asset_name,
        "success": event.success,
        "eventType": event.event_type,
        "eventData": event.event_data,
    });

    let unix_nano = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let persisted = Event {
        event_id: Event::derive_id(&event.transaction_id, unix_nano),
        subscription_id: subscription.subscription_id.clone(),
        network: subscription.network,
        event_type: event.contract_type.clone(),
        address: subscription.address.clone(),
        tx_hash: event.transaction_id.clone(),
        block_number: event.block_number,
        block_timestamp: event.block_timestamp,
        data,
        processed: false,
        created_at: Utc::now(),
    };

    // Marshalled once; every downstream consumer (WS, webhook, store) sees
    // byte-for-byte the same JSON.
    let json = match serde_json::to_string(&persisted) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "failed to marshal event, dropping");
            return;
        }
    };

    registry.broadcast(&subscription.subscription_id, &json).await;

    if !subscription.webhook_url.is_empty() {
        let http = http.clone();
        let url = subscription.webhook_url.clone();
        let subscription_id = subscription.subscription_id.clone();
        let event_type = event.contract_type.clone();
        let body = serde_json::from_str::<serde_json::Value>(&json).unwrap_or(serde_json::Value::Null);
        tokio::spawn(async move {
            webhook::deliver(&http, &url, &subscription_id, &event_type, &body).await;
        });
    }

    if let Some(cfg) = third_party {
        spawn_third_party_delivery(routed, cfg, abi, http);
    }

    let store = event_store.clone();
    tokio::spawn(async move {
        let deadline = Duration::from_secs(5);
        if tokio::time::timeout(deadline, store.append(persisted)).await.is_err() {
            warn!("event store write timed out");
        }
    });
}

fn spawn_third_party_delivery(
    routed: &RoutedEvent,
    cfg: &ThirdPartyConfig,
    abi: &Arc<AbiDecoder>,
    http: &Client,
) {
    let subscription = routed.subscription.clone();
    let event = routed.event.clone();
    let cfg = cfg.clone();
    let abi = abi.clone();
    let http = http.clone();

    tokio::spawn(async move {
        if event.contract_type == "TriggerSmartContract" {
            let Some((owner_hex, contract_hex, call_data)) = smart_contract_fields(&event) else {
                return;
            };
            let Ok(decoded) = abi.decode(&contract_hex, &call_data).await else {
                return;
            };
            trc20::notify_if_trc20_transfer(
                &http,
                &cfg.trc20_transfer_endpoint,
                &subscription,
                &contract_hex,
                &owner_hex,
                &decoded,
                &event.transaction_id,
                event.block_number,
            )
            .await;
            return;
        }

        if !OPERATION_CONTRACT_TYPES.contains(&event.contract_type.as_str()) {
            return;
        }
        let Some(parsed) = reparse_contract(&event) else {
            return;
        };
        let claimed_amount = if event.contract_type == "WithdrawBalanceContract" {
            event.amount
        } else {
            0
        };
        operations::notify(
            &http,
            &cfg.operations_endpoint,
            &subscription,
            &parsed,
            &event.transaction_id,
            event.block_number,
            claimed_amount,
        )
        .await;
    });
}

fn smart_contract_fields(event: &AddressEvent) -> Option<(String, String, String)> {
    let tx: Transaction = serde_json::from_value(event.raw_transaction.clone()).ok()?;
    let entry = tx
        .raw_data
        .contract
        .iter()
        .find(|c| c.contract_type == "TriggerSmartContract")?;
    if let parser::ParsedContract::SmartContractTrigger { owner, contract_address, call_data } =
        parser::parse(entry)
    {
        Some((owner, contract_address, call_data))
    } else {
        None
    }
}

fn reparse_contract(event: &AddressEvent) -> Option<parser::ParsedContract> {
    let tx: Transaction = serde_json::from_value(event.raw_transaction.clone()).ok()?;
    let entry = tx
        .raw_data
        .contract
        .iter()
        .find(|c| c.contract_type == event.contract_type)?;
    Some(parser::parse(entry))
}
