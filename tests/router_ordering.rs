//! Router fan-out: a webhook delivery and the persisted event both
//! result from a single `submit`, and a smart-contract TRC20 transfer also
//! reaches the third-party endpoint — all driven off the same queued event,
//! none blocking the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tron_watch::config::{ConnectionConfig, TronNodeConfig};
use tron_watch::model::{AddressEvent, Network, Subscription, SubscriptionFilters, SubscriptionStatus, WalletType};
use tron_watch::parser::AbiDecoder;
use tron_watch::router::{ClientRegistry, Router, ThirdPartyConfig};
use tron_watch::store::{EventStore, InMemoryEventStore};
use tron_watch::tron::address::hex_to_base58;
use tron_watch::tron::client::TronClient;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn abi_decoder() -> Arc<AbiDecoder> {
    let cfg = TronNodeConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        use_tls: false,
        connection: ConnectionConfig {
            timeout_secs: 1,
            max_retries: 0,
            backoff_interval_ms: 1,
            keep_alive_secs: 1,
        },
    };
    Arc::new(AbiDecoder::new(TronClient::new(&cfg)))
}

fn base_subscription(address: &str, webhook_url: &str) -> Subscription {
    let now = chrono::Utc::now();
    Subscription {
        subscription_id: "sub_test".to_string(),
        address: address.to_string(),
        network: Network::Mainnet,
        status: SubscriptionStatus::Active,
        start_block: -1,
        current_block: 0,
        last_seen_block: 0,
        events_count: 0,
        last_event_at: None,
        webhook_url: webhook_url.to_string(),
        filters: SubscriptionFilters::default(),
        wallet_type: WalletType::General,
        user_id: None,
        label: None,
        metadata: HashMap::new(),
        created_at: now,
        updated_at: now,
    }
}

fn trx_transfer_event() -> AddressEvent {
    AddressEvent {
        transaction_id: "tx_webhook_case".to_string(),
        block_number: 42,
        block_timestamp: 0,
        block_hash: "hash".to_string(),
        contract_type: "TransferContract".to_string(),
        from: "41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
        to: "41bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
        amount: 1_000_000,
        asset_name: None,
        success: true,
        event_type: "TransferContract".to_string(),
        event_data: HashMap::new(),
        raw_transaction: serde_json::json!({}),
    }
}

#[tokio::test]
async fn webhook_and_event_store_both_receive_the_event() {
    let webhook_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook_server)
        .await;

    let event_store = InMemoryEventStore::new();
    let router = Router::start(
        ClientRegistry::new(),
        event_store.clone() as Arc<dyn EventStore>,
        abi_decoder(),
        None,
    );

    let subscription = base_subscription("TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf", &format!("{}/hook", webhook_server.uri()));
    router.submit(subscription, trx_transfer_event());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = webhook_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let (events, total) = event_store.list(10, 0, None).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(events[0].tx_hash, "tx_webhook_case");
}

#[tokio::test]
async fn trc20_transfer_reaches_the_third_party_endpoint() {
    let porto_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trc20"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&porto_server)
        .await;

    // Recipient is the watched address; sender is some other account.
    let recipient_hex = "d3682962027e721c5247a9faf7865fe4a71d543";
    let watched_address = hex_to_base58(&format!("41{recipient_hex}")).unwrap();
    let sender_hex = "41cccccccccccccccccccccccccccccccccccccc";
    let usdt_contract_hex = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";

    let call_data = format!(
        "a9059cbb{:0>64}{:064x}",
        recipient_hex, 100_000_000u64
    );

    let raw_transaction = serde_json::json!({
        "txID": "tx_trc20_case",
        "raw_data": {
            "contract": [
                {
                    "type": "TriggerSmartContract",
                    "parameter": {
                        "value": {
                            "owner_address": sender_hex,
                            "contract_address": usdt_contract_hex,
                            "data": call_data,
                        },
                        "type_url": "type.googleapis.com/protocol.TriggerSmartContract",
                    },
                }
            ],
            "timestamp": 0,
        },
        "ret": [{"contractRet": "SUCCESS"}],
    });

    let event = AddressEvent {
        transaction_id: "tx_trc20_case".to_string(),
        block_number: 99,
        block_timestamp: 0,
        block_hash: "hash".to_string(),
        contract_type: "TriggerSmartContract".to_string(),
        from: sender_hex.to_string(),
        to: usdt_contract_hex.to_string(),
        amount: 0,
        asset_name: None,
        success: true,
        event_type: "TriggerSmartContract".to_string(),
        event_data: HashMap::new(),
        raw_transaction,
    };

    let event_store = InMemoryEventStore::new();
    let router = Router::start(
        ClientRegistry::new(),
        event_store as Arc<dyn EventStore>,
        abi_decoder(),
        Some(ThirdPartyConfig {
            operations_endpoint: String::new(),
            trc20_transfer_endpoint: format!("{}/trc20", porto_server.uri()),
        }),
    );

    let subscription = base_subscription(&watched_address, "");
    router.submit(subscription, event);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = porto_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["direction"], "in");
    assert_eq!(body["token_symbol"], "USDT");
}
