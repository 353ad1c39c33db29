//! Filter resolution and matching: asset-type shorthand
//! resolves to concrete contract-type names, and the resolved filter set is
//! applied to an `AddressEvent` the same way the live monitor loop would.

use std::collections::HashMap;

use tron_watch::model::{AddressEvent, SubscriptionFilters};

fn event(contract_type: &str, amount: i64, success: bool) -> AddressEvent {
    AddressEvent {
        transaction_id: "deadbeef".to_string(),
        block_number: 100,
        block_timestamp: 0,
        block_hash: "hash".to_string(),
        contract_type: contract_type.to_string(),
        from: "TFromAddress".to_string(),
        to: "TToAddress".to_string(),
        amount,
        asset_name: None,
        success,
        event_type: contract_type.to_string(),
        event_data: HashMap::new(),
        raw_transaction: serde_json::json!({}),
    }
}

#[test]
fn empty_filters_match_everything() {
    let filters = SubscriptionFilters::default();
    assert!(filters.matches(&event("TransferContract", 10, true)));
    assert!(filters.matches(&event("VoteWitnessContract", 0, false)));
}

#[test]
fn asset_type_trc20_resolves_to_trigger_smart_contract() {
    let filters = SubscriptionFilters {
        asset_types: vec!["TRC20".to_string()],
        ..Default::default()
    };
    let resolved = filters.resolve();
    assert_eq!(resolved, vec!["TriggerSmartContract".to_string()]);
    assert!(filters.matches(&event("TriggerSmartContract", 1, true)));
    assert!(!filters.matches(&event("TransferContract", 1, true)));
}

#[test]
fn all_operations_wildcard_clears_the_resolved_set() {
    let filters = SubscriptionFilters {
        asset_types: vec!["ALL_OPERATIONS".to_string()],
        ..Default::default()
    };
    assert!(filters.resolve().is_empty());
    assert!(filters.matches(&event("AccountPermissionUpdateContract", 0, true)));
}

#[test]
fn min_and_max_amount_bounds_are_inclusive_exclusion() {
    let filters = SubscriptionFilters {
        min_amount: 1_000_000,
        max_amount: 10_000_000,
        ..Default::default()
    };
    assert!(!filters.matches(&event("TransferContract", 999_999, true)));
    assert!(filters.matches(&event("TransferContract", 5_000_000, true)));
    assert!(!filters.matches(&event("TransferContract", 10_000_001, true)));
}

#[test]
fn only_success_rejects_failed_transactions() {
    let filters = SubscriptionFilters {
        only_success: true,
        ..Default::default()
    };
    assert!(!filters.matches(&event("TransferContract", 1, false)));
    assert!(filters.matches(&event("TransferContract", 1, true)));
}

#[test]
fn explicit_contract_types_and_resolved_asset_types_are_merged() {
    let filters = SubscriptionFilters {
        contract_types: vec!["WithdrawBalanceContract".to_string()],
        asset_types: vec!["VOTE".to_string()],
        ..Default::default()
    };
    let mut resolved = filters.resolve();
    resolved.sort();
    assert_eq!(
        resolved,
        vec!["VoteWitnessContract".to_string(), "WithdrawBalanceContract".to_string()]
    );
}
