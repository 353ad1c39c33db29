use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single contract invocation inside a transaction's `raw_data.contract`
/// list. `parameter` carries the category-specific payload as a JSON object
/// (Tron's full-node HTTP API returns it already decoded from protobuf).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractEntry {
    #[serde(rename = "type")]
    pub contract_type: String,
    pub parameter: ContractParameter,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractParameter {
    pub value: serde_json::Value,
    #[serde(rename = "type_url")]
    pub type_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawData {
    pub contract: Vec<ContractEntry>,
    pub timestamp: i64,
    #[serde(default)]
    pub expiration: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Ret {
    #[serde(rename = "contractRet")]
    pub contract_ret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transaction {
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub raw_data: RawData,
    #[serde(default)]
    pub ret: Vec<Ret>,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.ret
            .first()
            .and_then(|r| r.contract_ret.as_deref())
            .map(|r| r == "SUCCESS")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockHeaderRawData {
    pub number: i64,
    pub timestamp: i64,
    #[serde(rename = "parentHash")]
    pub parent_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockHeader {
    pub raw_data: BlockHeaderRawData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Block {
    #[serde(rename = "blockID", default)]
    pub block_id: String,
    pub block_header: BlockHeader,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn number(&self) -> i64 {
        self.block_header.raw_data.number
    }

    pub fn timestamp(&self) -> i64 {
        self.block_header.raw_data.timestamp
    }

    pub fn hash(&self) -> &str {
        &self.block_id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransactionInfoReceipt {
    #[serde(default)]
    pub net_fee: i64,
    #[serde(default)]
    pub energy_usage: i64,
    #[serde(default)]
    pub energy_usage_total: i64,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransactionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub receipt: TransactionInfoReceipt,
    /// SUN claimed via a WithdrawBalanceContract; authoritative source for
    /// the claim amount rather than the (empty) contract payload.
    #[serde(default)]
    pub withdraw_amount: i64,
    #[serde(default)]
    pub log: Vec<serde_json::Value>,
}

impl TransactionInfo {
    pub fn is_success(&self) -> bool {
        self.result
            .as_deref()
            .map(|r| r == "SUCCESS")
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbiEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(rename = "type", default)]
    pub entry_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Abi {
    #[serde(default)]
    pub entrys: Vec<AbiEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Contract {
    #[serde(default)]
    pub abi: Abi,
    #[serde(default)]
    pub bytecode: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
