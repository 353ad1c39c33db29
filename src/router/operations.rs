//! Third-party ("Porto") operation notifications: one typed
//! `OperationEvent` per contract category, carrying subscription context
//! (`wallet_type`, `user_id`, `label`, `metadata`, `watched_address`) plus
//! fields specific to the operation. Permission-change notifications are
//! flagged `priority=HIGH` and logged at WARN — account-takeover risk on a
//! watched wallet.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::model::Subscription;
use crate::parser::{ParsedContract, Resource};
use crate::tron::address::hex_to_base58;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Normal,
    High,
}

#[derive(Debug, Serialize)]
pub struct OperationEvent {
    pub operation_type: &'static str,
    pub priority: Priority,
    pub subscription_id: String,
    pub watched_address: String,
    pub wallet_type: crate::model::WalletType,
    pub user_id: Option<String>,
    pub label: Option<String>,
    pub metadata: std::collections::HashMap<String, Value>,
    pub tx_hash: String,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

fn base58_or_raw(addr: &str) -> String {
    hex_to_base58(addr).unwrap_or_else(|| addr.to_string())
}

fn resource_name(r: Resource) -> &'static str {
    match r {
        Resource::Bandwidth => "BANDWIDTH",
        Resource::Energy => "ENERGY",
        Resource::TronPower => "TRON_POWER",
    }
}

/// Builds the category-specific `OperationEvent`, or `None` for categories
/// that have no third-party notification (plain transfers are handled by
/// the TRC20 specialisation and TRX/TRC10 transfers have no operation
/// analogue here).
fn build(
    subscription: &Subscription,
    parsed: &ParsedContract,
    tx_hash: &str,
    block_number: i64,
    claimed_amount: i64,
) -> Option<OperationEvent> {
    let (operation_type, priority, details) = match parsed {
        ParsedContract::FreezeBalanceV2 { owner, resource, amount } => (
            "STAKE",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "resource": resource_name(*resource),
                "amount": amount,
            }),
        ),
        ParsedContract::UnfreezeBalanceV2 { owner, resource, amount } => (
            "UNSTAKE",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "resource": resource_name(*resource),
                "amount": amount,
            }),
        ),
        ParsedContract::WithdrawExpireUnfreeze { owner } => (
            "WITHDRAW_UNSTAKE",
            Priority::Normal,
            serde_json::json!({ "owner": base58_or_raw(owner) }),
        ),
        ParsedContract::DelegateResource { owner, receiver, resource, amount, lock, lock_period } => (
            "DELEGATE",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "receiver": base58_or_raw(receiver),
                "resource": resource_name(*resource),
                "amount": amount,
                "lock": lock,
                "lockPeriod": lock_period,
            }),
        ),
        ParsedContract::UnDelegateResource { owner, receiver, resource, amount } => (
            "UNDELEGATE",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "receiver": base58_or_raw(receiver),
                "resource": resource_name(*resource),
                "amount": amount,
            }),
        ),
        ParsedContract::VoteWitness { owner, votes, total_votes } => (
            "VOTE",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "votes": votes.iter().map(|v| serde_json::json!({
                    "srAddress": base58_or_raw(&v.vote_address),
                    "voteCount": v.vote_count,
                })).collect::<Vec<_>>(),
                "totalVotes": total_votes,
            }),
        ),
        ParsedContract::PermissionUpdate { owner, owner_permission, active_permissions } => (
            "PERMISSION",
            Priority::High,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "ownerPermission": owner_permission.as_ref().map(|p| serde_json::json!({
                    "name": p.permission_name,
                    "threshold": p.threshold,
                    "keys": p.keys.iter().map(|k| serde_json::json!({
                        "address": base58_or_raw(&k.address),
                        "weight": k.weight,
                    })).collect::<Vec<_>>(),
                })),
                "activePermissions": active_permissions.iter().map(|p| serde_json::json!({
                    "name": p.permission_name,
                    "threshold": p.threshold,
                    "keys": p.keys.iter().map(|k| serde_json::json!({
                        "address": base58_or_raw(&k.address),
                        "weight": k.weight,
                    })).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            }),
        ),
        ParsedContract::WithdrawBalance { owner } => (
            "CLAIM",
            Priority::Normal,
            serde_json::json!({
                "owner": base58_or_raw(owner),
                "claimedAmount": claimed_amount,
            }),
        ),
        _ => return None,
    };

    Some(OperationEvent {
        operation_type,
        priority,
        subscription_id: subscription.subscription_id.clone(),
        watched_address: subscription.address.clone(),
        wallet_type: subscription.wallet_type,
        user_id: subscription.user_id.clone(),
        label: subscription.label.clone(),
        metadata: subscription.metadata.clone(),
        tx_hash: tx_hash.to_string(),
        block_number,
        timestamp: Utc::now(),
        details,
    })
}

pub async fn notify(
    http: &Client,
    endpoint: &str,
    subscription: &Subscription,
    parsed: &ParsedContract,
    tx_hash: &str,
    block_number: i64,
    claimed_amount: i64,
) {
    let Some(event) = build(subscription, parsed, tx_hash, block_number, claimed_amount) else {
        return;
    };

    if event.priority == Priority::High {
        warn!(
            subscription_id = %subscription.subscription_id,
            tx_hash,
            "PERMISSION change detected on watched address, notifying third party at HIGH priority"
        );
    }

    match http.post(endpoint).json(&event).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!(subscription_id = %subscription.subscription_id, operation = event.operation_type, "operation event delivered");
        }
        Ok(resp) => {
            warn!(subscription_id = %subscription.subscription_id, status = %resp.status(), "operation event rejected by third party");
        }
        Err(e) => {
            warn!(subscription_id = %subscription.subscription_id, error = %e, "operation event delivery failed");
        }
    }
}
