//! Contract-type dispatcher: parses the category-specific payload
//! of each of the eleven supported Tron contract categories into a
//! structured record. Decoding degrades gracefully — an unrecognised
//! contract type is carried through as `Other` with its raw type name so
//! the event is still routable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tron::types::ContractEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resource {
    Bandwidth,
    Energy,
    TronPower,
}

impl Resource {
    fn parse(v: &Value) -> Resource {
        match v.as_str().unwrap_or("BANDWIDTH") {
            "ENERGY" => Resource::Energy,
            "TRON_POWER" => Resource::TronPower,
            _ => Resource::Bandwidth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteEntry {
    pub vote_address: String,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionKey {
    pub address: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionBlock {
    pub permission_name: Option<String>,
    pub threshold: i64,
    pub keys: Vec<PermissionKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ParsedContract {
    TrxTransfer {
        owner: String,
        to: String,
        amount: i64,
    },
    Trc10Transfer {
        owner: String,
        to: String,
        asset_name: String,
        amount: i64,
    },
    SmartContractTrigger {
        owner: String,
        contract_address: String,
        call_data: String,
    },
    FreezeBalanceV2 {
        owner: String,
        resource: Resource,
        amount: i64,
    },
    UnfreezeBalanceV2 {
        owner: String,
        resource: Resource,
        amount: i64,
    },
    WithdrawExpireUnfreeze {
        owner: String,
    },
    DelegateResource {
        owner: String,
        receiver: String,
        resource: Resource,
        amount: i64,
        lock: bool,
        lock_period: i64,
    },
    UnDelegateResource {
        owner: String,
        receiver: String,
        resource: Resource,
        amount: i64,
    },
    VoteWitness {
        owner: String,
        votes: Vec<VoteEntry>,
        total_votes: i64,
    },
    PermissionUpdate {
        owner: String,
        owner_permission: Option<PermissionBlock>,
        active_permissions: Vec<PermissionBlock>,
    },
    WithdrawBalance {
        owner: String,
    },
    Other {
        contract_type: String,
        raw: Value,
    },
}

fn s(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn i(v: &Value, key: &str) -> i64 {
    v.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn b(v: &Value, key: &str) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn parse_permission_block(v: &Value) -> PermissionBlock {
    let keys = v
        .get("keys")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|k| PermissionKey {
                    address: s(k, "address"),
                    weight: i(k, "weight"),
                })
                .collect()
        })
        .unwrap_or_default();
    PermissionBlock {
        permission_name: v.get("permission_name").and_then(Value::as_str).map(String::from),
        threshold: i(v, "threshold"),
        keys,
    }
}

/// Parses one `ContractEntry` into its structured record. Never fails — an
/// unknown `contract_type` or malformed payload degrades to `Other` rather
/// than aborting the monitor's block scan.
pub fn parse(entry: &ContractEntry) -> ParsedContract {
    let v = &entry.parameter.value;
    match entry.contract_type.as_str() {
        "TransferContract" => ParsedContract::TrxTransfer {
            owner: s(v, "owner_address"),
            to: s(v, "to_address"),
            amount: i(v, "amount"),
        },
        "TransferAssetContract" => ParsedContract::Trc10Transfer {
            owner: s(v, "owner_address"),
            to: s(v, "to_address"),
            asset_name: s(v, "asset_name"),
            amount: i(v, "amount"),
        },
        "TriggerSmartContract" => ParsedContract::SmartContractTrigger {
            owner: s(v, "owner_address"),
            contract_address: s(v, "contract_address"),
            call_data: s(v, "data"),
        },
        "FreezeBalanceV2Contract" => ParsedContract::FreezeBalanceV2 {
            owner: s(v, "owner_address"),
            resource: Resource::parse(v.get("resource").unwrap_or(&Value::Null)),
            amount: i(v, "frozen_balance"),
        },
        "UnfreezeBalanceV2Contract" => ParsedContract::UnfreezeBalanceV2 {
            owner: s(v, "owner_address"),
            resource: Resource::parse(v.get("resource").unwrap_or(&Value::Null)),
            amount: i(v, "unfreeze_balance"),
        },
        "WithdrawExpireUnfreezeContract" => ParsedContract::WithdrawExpireUnfreeze {
            owner: s(v, "owner_address"),
        },
        "DelegateResourceContract" => ParsedContract::DelegateResource {
            owner: s(v, "owner_address"),
            receiver: s(v, "receiver_address"),
            resource: Resource::parse(v.get("resource").unwrap_or(&Value::Null)),
            amount: i(v, "balance"),
            lock: b(v, "lock"),
            lock_period: i(v, "lock_period"),
        },
        "UnDelegateResourceContract" => ParsedContract::UnDelegateResource {
            owner: s(v, "owner_address"),
            receiver: s(v, "receiver_address"),
            resource: Resource::parse(v.get("resource").unwrap_or(&Value::Null)),
            amount: i(v, "balance"),
        },
        "VoteWitnessContract" => {
            let votes: Vec<VoteEntry> = v
                .get("votes")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .map(|entry| VoteEntry {
                            vote_address: s(entry, "vote_address"),
                            vote_count: i(entry, "vote_count"),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let total_votes = votes.iter().map(|e| e.vote_count).sum();
            ParsedContract::VoteWitness {
                owner: s(v, "owner_address"),
                votes,
                total_votes,
            }
        }
        "AccountPermissionUpdateContract" => ParsedContract::PermissionUpdate {
            owner: s(v, "owner_address"),
            owner_permission: v.get("owner").map(parse_permission_block),
            active_permissions: v
                .get("actives")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().map(parse_permission_block).collect())
                .unwrap_or_default(),
        },
        "WithdrawBalanceContract" => ParsedContract::WithdrawBalance {
            owner: s(v, "owner_address"),
        },
        other => ParsedContract::Other {
            contract_type: other.to_string(),
            raw: v.clone(),
        },
    }
}

impl ParsedContract {
    pub fn owner(&self) -> &str {
        match self {
            ParsedContract::TrxTransfer { owner, .. }
            | ParsedContract::Trc10Transfer { owner, .. }
            | ParsedContract::SmartContractTrigger { owner, .. }
            | ParsedContract::FreezeBalanceV2 { owner, .. }
            | ParsedContract::UnfreezeBalanceV2 { owner, .. }
            | ParsedContract::WithdrawExpireUnfreeze { owner }
            | ParsedContract::DelegateResource { owner, .. }
            | ParsedContract::UnDelegateResource { owner, .. }
            | ParsedContract::VoteWitness { owner, .. }
            | ParsedContract::PermissionUpdate { owner, .. }
            | ParsedContract::WithdrawBalance { owner } => owner,
            ParsedContract::Other { .. } => "",
        }
    }

    /// Best-effort counterparty address, used for the from/to match test in
    /// the monitor. Most categories only have a single party
    /// (`owner`); transfer/delegate categories also expose a `to`.
    pub fn counterparty(&self) -> Option<&str> {
        match self {
            ParsedContract::TrxTransfer { to, .. } | ParsedContract::Trc10Transfer { to, .. } => {
                Some(to)
            }
            ParsedContract::DelegateResource { receiver, .. }
            | ParsedContract::UnDelegateResource { receiver, .. } => Some(receiver),
            ParsedContract::SmartContractTrigger { contract_address, .. } => {
                Some(contract_address)
            }
            _ => None,
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            ParsedContract::TrxTransfer { amount, .. }
            | ParsedContract::Trc10Transfer { amount, .. }
            | ParsedContract::FreezeBalanceV2 { amount, .. }
            | ParsedContract::UnfreezeBalanceV2 { amount, .. }
            | ParsedContract::DelegateResource { amount, .. }
            | ParsedContract::UnDelegateResource { amount, .. } => *amount,
            _ => 0,
        }
    }
}
