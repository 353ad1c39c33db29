use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tron network a subscription is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Platform,
    Nps,
    Portal,
    Exchange,
    General,
    Gasstation,
    Invoice,
}

impl Default for WalletType {
    fn default() -> Self {
        WalletType::General
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilters {
    #[serde(default)]
    pub contract_types: Vec<String>,
    #[serde(default)]
    pub asset_types: Vec<String>,
    #[serde(default)]
    pub token_filter: Vec<String>,
    #[serde(default)]
    pub min_amount: i64,
    #[serde(default)]
    pub max_amount: i64,
    #[serde(default)]
    pub only_success: bool,
}

impl SubscriptionFilters {
    /// Resolves `asset_types` into concrete Tron contract-type names and
    /// merges them with any explicitly-given `contract_types`. An empty
    /// result after resolution means "accept all".
    pub fn resolve(&self) -> Vec<String> {
        if self.asset_types.is_empty() {
            return self.contract_types.clone();
        }
        let mut resolved: Vec<String> = self.contract_types.clone();
        for asset in &self.asset_types {
            let mapped: &[&str] = match asset.as_str() {
                "TRX" => &["TransferContract"],
                "TRC10" => &["TransferAssetContract"],
                "TRC20" => &["TriggerSmartContract"],
                "STAKE" => &["FreezeBalanceV2Contract"],
                "UNSTAKE" => &["UnfreezeBalanceV2Contract"],
                "WITHDRAW_UNSTAKE" => &["WithdrawExpireUnfreezeContract"],
                "DELEGATE" => &["DelegateResourceContract"],
                "UNDELEGATE" => &["UnDelegateResourceContract"],
                "VOTE" => &["VoteWitnessContract"],
                "PERMISSION" => &["AccountPermissionUpdateContract"],
                "CLAIM" => &["WithdrawBalanceContract"],
                "ALL_OPERATIONS" | "FULL" | "*" => &[],
                _ => &[],
            };
            if mapped.is_empty() && matches!(asset.as_str(), "ALL_OPERATIONS" | "FULL" | "*") {
                return Vec::new();
            }
            resolved.extend(mapped.iter().map(|s| s.to_string()));
        }
        resolved.sort();
        resolved.dedup();
        resolved
    }

    pub fn matches(&self, event: &AddressEvent) -> bool {
        let resolved = self.resolve();
        if !resolved.is_empty() && !resolved.contains(&event.contract_type) {
            return false;
        }
        if self.min_amount > 0 && event.amount < self.min_amount {
            return false;
        }
        if self.max_amount > 0 && event.amount > self.max_amount {
            return false;
        }
        if self.only_success && !event.success {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub address: String,
    pub network: Network,
    pub status: SubscriptionStatus,
    pub start_block: i64,
    pub current_block: i64,
    pub last_seen_block: i64,
    pub events_count: i64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub webhook_url: String,
    pub filters: SubscriptionFilters,
    pub wallet_type: WalletType,
    pub user_id: Option<String>,
    pub label: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_global(&self) -> bool {
        self.address.is_empty()
    }
}

/// Emitted by a monitor; consumed exactly once by the manager's filter stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressEvent {
    pub transaction_id: String,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub block_hash: String,
    pub contract_type: String,
    pub from: String,
    pub to: String,
    pub amount: i64,
    pub asset_name: Option<String>,
    pub success: bool,
    pub event_type: String,
    pub event_data: HashMap<String, serde_json::Value>,
    /// Raw transaction payload, kept around so the router can re-parse it
    /// for the richer third-party "operation" notifications.
    pub raw_transaction: serde_json::Value,
}

/// Persisted, append-only event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub subscription_id: String,
    pub network: Network,
    #[serde(rename = "type")]
    pub event_type: String,
    pub address: String,
    pub tx_hash: String,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub data: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn derive_id(tx_hash: &str, unix_nano: i64) -> String {
        let prefix: String = tx_hash.chars().take(10).collect();
        format!("evt_{}_{}", prefix, unix_nano)
    }
}
