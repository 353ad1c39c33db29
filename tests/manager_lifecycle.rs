//! Subscription lifecycle: subscribe, duplicate-call semantics on
//! unsubscribe, resubscribe without a prior stopped record, and delete.
//! The configured Tron node is unreachable on purpose — these tests exercise
//! the manager's own bookkeeping, not live chain polling, and the monitor's
//! `get_now_block` failure path is already designed to warn and continue.

use tron_watch::config::Config;
use tron_watch::manager::{Manager, SubscribeOptions};
use tron_watch::router::ClientRegistry;
use tron_watch::store::{InMemoryEventStore, InMemorySubscriptionStore};

fn test_config() -> Config {
    let mut cfg = Config::load(None).expect("default config loads");
    // Point at a closed local port so the unreachable-node path fails fast.
    cfg.blockchain.tron.node.host = "127.0.0.1".to_string();
    cfg.blockchain.tron.node.port = 1;
    cfg.blockchain.tron.node.connection.timeout_secs = 1;
    cfg.blockchain.tron.node.connection.max_retries = 0;
    cfg
}

fn new_manager() -> std::sync::Arc<Manager> {
    let config = test_config();
    Manager::new(
        &config,
        InMemorySubscriptionStore::new(),
        InMemoryEventStore::new(),
        ClientRegistry::new(),
    )
}

#[tokio::test]
async fn subscribe_rejects_an_invalid_address() {
    let manager = new_manager();
    let err = manager
        .subscribe(SubscribeOptions {
            address: "not-a-tron-address".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid address"));
}

#[tokio::test]
async fn subscribe_then_get_round_trips() {
    let manager = new_manager();
    let sub = manager
        .subscribe(SubscribeOptions {
            address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let fetched = manager
        .subscription_store()
        .get(&sub.subscription_id)
        .await
        .unwrap()
        .expect("subscription persisted");
    assert_eq!(fetched.address, "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf");
    assert_eq!(manager.active_monitor_count(), 1);
}

#[tokio::test]
async fn unsubscribe_is_not_idempotent_a_second_time() {
    let manager = new_manager();
    let sub = manager
        .subscribe(SubscribeOptions {
            address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    manager.unsubscribe(&sub.subscription_id).await.unwrap();
    let second = manager.unsubscribe(&sub.subscription_id).await;
    assert!(second.is_err());
}

#[tokio::test]
async fn resubscribe_without_a_prior_stopped_record_behaves_like_subscribe() {
    let manager = new_manager();
    let result = manager
        .resubscribe(
            "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf",
            None,
            None,
            true,
        )
        .await
        .unwrap();

    assert!(!result.gap_detected);
    assert!(!result.gap_scanning);
    assert_eq!(result.subscription.address, "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf");
}

#[tokio::test]
async fn resubscribe_preserves_prior_filters_when_caller_does_not_override() {
    use tron_watch::model::SubscriptionFilters;

    let manager = new_manager();
    let sub = manager
        .subscribe(SubscribeOptions {
            address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
            filters: SubscriptionFilters {
                only_success: true,
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();

    manager.unsubscribe(&sub.subscription_id).await.unwrap();

    let result = manager
        .resubscribe("TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf", None, None, false)
        .await
        .unwrap();

    let stored = manager
        .subscription_store()
        .get(&result.subscription.subscription_id)
        .await
        .unwrap()
        .expect("subscription persisted");
    assert!(stored.filters.only_success);
}

#[tokio::test]
async fn delete_removes_the_record_and_the_monitor() {
    let manager = new_manager();
    let sub = manager
        .subscribe(SubscribeOptions {
            address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    manager.delete(&sub.subscription_id).await.unwrap();
    assert_eq!(manager.active_monitor_count(), 0);
    assert!(manager
        .subscription_store()
        .get(&sub.subscription_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn batch_subscribe_reports_per_address_failures() {
    let manager = new_manager();
    let result = manager
        .batch_subscribe(vec![
            SubscribeOptions {
                address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf".to_string(),
                ..Default::default()
            },
            SubscribeOptions {
                address: "not-a-tron-address".to_string(),
                ..Default::default()
            },
        ])
        .await;

    assert_eq!(result.success.len(), 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, "not-a-tron-address");
}
