//! Per-subscription polling worker. `GlobalMonitor` (the "no
//! address filter" variant) is the same type constructed with
//! `watched_address: None` — the two share one capability set
//! (`start/stop/events/get_last_block_number/scan_historical`) rather
//! than duplicating the polling loop.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::model::AddressEvent;
use crate::parser::{self, AbiDecoder, DecodedCall, ParsedContract};
use crate::tron::address::base58_to_hex;
use crate::tron::client::TronClient;
use crate::tron::types::{ContractEntry, Transaction};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

pub struct Monitor {
    /// `None` makes this a global monitor: every transaction matches,
    /// regardless of its `from`/`to`.
    watched_address_hex: Option<String>,
    client: TronClient,
    abi: Arc<AbiDecoder>,
    poll_interval: Duration,
    cursor: Arc<AtomicI64>,
    stop_flag: Arc<AtomicBool>,
    state: Arc<Mutex<MonitorState>>,
    channel_capacity: usize,
}

impl Monitor {
    pub fn for_address(client: TronClient, abi: Arc<AbiDecoder>, address: &str, start_block: i64) -> Self {
        Self::new(client, abi, base58_to_hex(address), start_block)
    }

    pub fn global(client: TronClient, abi: Arc<AbiDecoder>, start_block: i64) -> Self {
        Self::new(client, abi, None, start_block)
    }

    fn new(client: TronClient, abi: Arc<AbiDecoder>, watched_address_hex: Option<String>, start_block: i64) -> Self {
        // start_block <= 0 means "latest at first poll" (the -1 sentinel,
        // and the 0 ambiguity — both resolve to the same path).
        let initial_cursor = if start_block > 0 { start_block } else { 0 };
        Self {
            watched_address_hex,
            client,
            abi,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cursor: Arc::new(AtomicI64::new(initial_cursor)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(MonitorState::Idle)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawns the polling loop and returns its outbound channel. Resolves
    /// the initial cursor (if the stored cursor is ≤ 0, query
    /// `get_now_block`") before the loop starts.
    #[instrument(skip(self), fields(watched = self.watched_address_hex.as_deref().unwrap_or("*")))]
    pub async fn start(&self) -> mpsc::Receiver<AddressEvent> {
        {
            let mut state = self.state.lock().await;
            *state = MonitorState::Running;
        }
        if self.cursor.load(Ordering::SeqCst) <= 0 {
            match self.client.get_now_block().await {
                Ok(block) => self.cursor.store(block.number(), Ordering::SeqCst),
                Err(e) => warn!(error = %e, "failed to resolve starting block, will retry on first poll"),
            }
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let client = self.client.clone();
        let abi = self.abi.clone();
        let watched = self.watched_address_hex.clone();
        let cursor = self.cursor.clone();
        let stop_flag = self.stop_flag.clone();
        let state = self.state.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            run_loop(client, abi, watched, cursor, stop_flag, state, tx, poll_interval).await;
        });

        rx
    }

    /// Idempotent: calling `stop` after the loop has already exited is a
    /// no-op since the flag is simply set again.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn get_last_block_number(&self) -> i64 {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Synchronously iterates `(from, to]`, invoking `cb` for each matching
    /// event, without touching the live cursor. Errors on a single block
    /// are logged and the scan continues.
    pub async fn scan_historical<F>(&self, from: i64, to: i64, mut cb: F) -> Result<(), AppError>
    where
        F: FnMut(AddressEvent) + Send,
    {
        let mut n = from + 1;
        while n <= to {
            match self.client.get_block_by_num(n).await {
                Ok(Some(block)) => {
                    let events = extract_events(&self.client, &self.abi, &self.watched_address_hex, &block).await;
                    for event in events {
                        cb(event);
                    }
                }
                Ok(None) => {
                    debug!(block = n, "block not yet produced during historical scan");
                }
                Err(e) => {
                    warn!(block = n, error = %e, "historical scan failed on block, continuing");
                }
            }
            n += 1;
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    client: TronClient,
    abi: Arc<AbiDecoder>,
    watched: Option<String>,
    cursor: Arc<AtomicI64>,
    stop_flag: Arc<AtomicBool>,
    state: Arc<Mutex<MonitorState>>,
    tx: mpsc::Sender<AddressEvent>,
    poll_interval: Duration,
) {
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }

        let head = match client.get_now_block().await {
            Ok(block) => block.number(),
            Err(e) => {
                warn!(error = %e, "get_now_block failed, skipping this poll");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        while cursor.load(Ordering::SeqCst) < head {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            let next = cursor.load(Ordering::SeqCst) + 1;
            match client.get_block_by_num(next).await {
                Ok(Some(block)) => {
                    let events = extract_events(&client, &abi, &watched, &block).await;
                    for event in events {
                        // Non-blocking send: a full channel means the
                        // upstream consumer isn't keeping up; drop and log
                        // rather than block the polling loop.
                        if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
                            warn!(block = next, "monitor outbound channel full, dropping event");
                        }
                    }
                    cursor.store(block.number(), Ordering::SeqCst);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(block = next, error = %e, "get_block_by_num failed, skipping block");
                    break;
                }
            }
        }

        tokio::time::sleep(poll_interval).await;
    }

    let mut guard = state.lock().await;
    *guard = MonitorState::Stopped;
    info!("monitor loop exited");
}

async fn extract_events(
    client: &TronClient,
    abi: &AbiDecoder,
    watched: &Option<String>,
    block: &crate::tron::types::Block,
) -> Vec<AddressEvent> {
    let mut out = Vec::new();
    for tx in &block.transactions {
        for entry in &tx.raw_data.contract {
            let parsed = parser::parse(entry);
            // Smart-contract calls can only be matched against the watched
            // address once the call data is decoded: for a TRC20 transfer
            // the recipient/sender lives inside `call_data`, not in
            // `owner`/`counterparty` (which only ever see the token
            // contract address). Decode first so the match test below can
            // see those addresses too.
            let decoded = match &parsed {
                ParsedContract::SmartContractTrigger { contract_address, call_data, .. } => {
                    abi.decode(contract_address, call_data).await.ok()
                }
                _ => None,
            };
            if !matches_watched(&parsed, decoded.as_ref(), watched) {
                continue;
            }
            let event = build_event(client, block, tx, entry, &parsed, decoded).await;
            out.push(event);
        }
    }
    out
}

fn matches_watched(parsed: &ParsedContract, decoded: Option<&DecodedCall>, watched: &Option<String>) -> bool {
    let Some(watched) = watched else {
        return true; // global monitor: unconditional match
    };
    let watched_bare = watched.trim_start_matches("41");
    let owner_matches = parsed.owner().trim_start_matches("0x") == watched.as_str();
    let counterparty_matches = parsed
        .counterparty()
        .map(|c| c.trim_start_matches("0x") == watched.as_str())
        .unwrap_or(false);
    // ABI-decoded addresses are raw 20-byte values with no chain prefix,
    // while `watched` carries Tron's `41` prefix recovered from base58.
    let decoded_matches = decoded
        .map(|d| d.addresses.iter().any(|a| a.trim_start_matches("0x").eq_ignore_ascii_case(watched_bare)))
        .unwrap_or(false);
    owner_matches || counterparty_matches || decoded_matches
}

async fn build_event(
    client: &TronClient,
    block: &crate::tron::types::Block,
    tx: &Transaction,
    entry: &ContractEntry,
    parsed: &ParsedContract,
    decoded: Option<DecodedCall>,
) -> AddressEvent {
    let mut event_data = std::collections::HashMap::new();

    let (from, to, asset_name, mut success) = match parsed {
        ParsedContract::TrxTransfer { owner, to, .. } => (owner.clone(), to.clone(), None, tx.is_success()),
        ParsedContract::Trc10Transfer { owner, to, asset_name, .. } => {
            (owner.clone(), to.clone(), Some(asset_name.clone()), tx.is_success())
        }
        ParsedContract::SmartContractTrigger { owner, contract_address, .. } => {
            if let Some(decoded) = &decoded {
                let mut smart_contract = serde_json::Map::new();
                smart_contract.insert("method_signature".into(), decoded.method_signature.clone().into());
                smart_contract.insert("method_name".into(), decoded.method_name.clone().into());
                smart_contract.insert("addresses".into(), decoded.addresses.clone().into());
                smart_contract.insert("amount".into(), decoded.amount.clone().unwrap_or_default().into());
                smart_contract.insert("parameters".into(), decoded.parameters.clone().into());
                event_data.insert("smartContract".to_string(), serde_json::Value::Object(smart_contract));
            }
            (owner.clone(), contract_address.clone(), None, tx.is_success())
        }
        other => (other.owner().to_string(), String::new(), None, tx.is_success()),
    };

    // The withdraw-balance (claim rewards) amount lives in the transaction
    // info, never the contract payload itself.
    let mut amount = parsed.amount();
    if matches!(parsed, ParsedContract::WithdrawBalance { .. }) {
        match client.get_transaction_info(&tx.tx_id).await {
            Ok(info) => {
                amount = info.withdraw_amount;
                success = info.is_success();
            }
            Err(e) => {
                warn!(tx_id = %tx.tx_id, error = %e, "failed to fetch transaction info for claim amount");
                success = false;
            }
        }
    } else if from.is_empty() && to.is_empty() {
        // categories with no natural counterparty still benefit from a
        // confirmed success/failure flag when available.
        if let Ok(info) = client.get_transaction_info(&tx.tx_id).await {
            success = info.is_success();
        }
    }

    AddressEvent {
        transaction_id: tx.tx_id.clone(),
        block_number: block.number(),
        block_timestamp: block.timestamp(),
        block_hash: block.hash().to_string(),
        contract_type: entry.contract_type.clone(),
        from,
        to,
        amount,
        asset_name,
        success,
        event_type: entry.contract_type.clone(),
        event_data,
        raw_transaction: serde_json::to_value(tx).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, TronNodeConfig};

    fn unreachable_client() -> TronClient {
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
        TronClient::new(&cfg)
    }

    fn usdt_transfer_block(sender_hex: &str, recipient_hex: &str, contract_hex: &str) -> crate::tron::types::Block {
        let call_data = format!("a9059cbb{:0>64}{:064x}", recipient_hex, 100_000_000u64);
        let raw = serde_json::json!({
            "blockID": "block_hash",
            "block_header": {"raw_data": {"number": 100, "timestamp": 0}},
            "transactions": [{
                "txID": "tx_scenario_1",
                "raw_data": {
                    "contract": [{
                        "type": "TriggerSmartContract",
                        "parameter": {
                            "value": {
                                "owner_address": sender_hex,
                                "contract_address": contract_hex,
                                "data": call_data,
                            },
                            "type_url": "type.googleapis.com/protocol.TriggerSmartContract",
                        },
                    }],
                    "timestamp": 0,
                },
                "ret": [{"contractRet": "SUCCESS"}],
            }],
        });
        serde_json::from_value(raw).unwrap()
    }

    // spec.md §8 Scenario 1: an arbitrary sender calls USDT's
    // transfer(address,uint256) with the watched address as the recipient
    // encoded in call data, never as `owner`/`contract_address`. The event
    // must still surface from a per-address monitor.
    #[tokio::test]
    async fn per_address_monitor_matches_a_trc20_recipient_hidden_in_call_data() {
        let client = unreachable_client();
        let abi = AbiDecoder::new(client.clone());
        let sender = "41cccccccccccccccccccccccccccccccccccccc";
        let recipient = "d3682962027e721c5247a9faf7865fe4a71d543";
        let usdt_contract = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
        let block = usdt_transfer_block(sender, recipient, usdt_contract);

        let watched = Some(format!("41{recipient}"));
        let events = extract_events(&client, &abi, &watched, &block).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction_id, "tx_scenario_1");
        assert_eq!(events[0].contract_type, "TriggerSmartContract");
    }

    #[tokio::test]
    async fn per_address_monitor_ignores_an_unrelated_address() {
        let client = unreachable_client();
        let abi = AbiDecoder::new(client.clone());
        let sender = "41cccccccccccccccccccccccccccccccccccccc";
        let recipient = "d3682962027e721c5247a9faf7865fe4a71d543";
        let usdt_contract = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
        let block = usdt_transfer_block(sender, recipient, usdt_contract);

        let watched = Some("41dddddddddddddddddddddddddddddddddddddd".to_string());
        let events = extract_events(&client, &abi, &watched, &block).await;

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn global_monitor_matches_without_a_watched_address() {
        let client = unreachable_client();
        let abi = AbiDecoder::new(client.clone());
        let sender = "41cccccccccccccccccccccccccccccccccccccc";
        let recipient = "d3682962027e721c5247a9faf7865fe4a71d543";
        let usdt_contract = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
        let block = usdt_transfer_block(sender, recipient, usdt_contract);

        let events = extract_events(&client, &abi, &None, &block).await;

        assert_eq!(events.len(), 1);
    }
}
