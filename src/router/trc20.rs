//! TRC20 transfer specialisation: for `transfer`/`transferFrom`
//! calls on a known token contract, builds a structured `Transfer` payload
//! (hex + base58 addresses, raw and decimal-formatted amount), determines
//! direction relative to the watched address, and POSTs to the third-party
//! API. Transfers not involving the watched address on either side are
//! dropped at this stage.

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::Subscription;
use crate::parser::DecodedCall;
use crate::tron::address::hex_to_base58;

struct KnownToken {
    contract_hex: &'static str,
    symbol: &'static str,
    decimals: u32,
}

/// Built-in table of well-known token contracts. Not exhaustive — an
/// unrecognised contract address simply means the specialised `Transfer`
/// notification is skipped; the generic smart-contract event is still
/// routed normally.
const KNOWN_TOKENS: &[KnownToken] = &[
    KnownToken {
        // USDT, Tron mainnet.
        contract_hex: "a614f803b6fd780986a42c78ec9c7f77e6ded13c",
        symbol: "USDT",
        decimals: 6,
    },
    KnownToken {
        // USDT, Tron Nile/Shasta testnet deployment used in staging.
        contract_hex: "15f6e68fba2442a2c6b2d4ca0cd2a10d25cd05f3",
        symbol: "USDT",
        decimals: 6,
    },
];

fn lookup_token(contract_address_hex: &str) -> Option<&'static KnownToken> {
    let normalized = contract_address_hex.trim_start_matches("0x").trim_start_matches("41");
    KNOWN_TOKENS
        .iter()
        .find(|t| t.contract_hex.trim_start_matches("41") == normalized)
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Direction {
    In,
    Out,
}

#[derive(Debug, Serialize)]
pub struct TransferNotification {
    pub subscription_id: String,
    pub watched_address: String,
    pub token_symbol: &'static str,
    pub contract_address_hex: String,
    pub contract_address_base58: Option<String>,
    pub from_hex: String,
    pub from_base58: Option<String>,
    pub to_hex: String,
    pub to_base58: Option<String>,
    pub amount_raw: String,
    pub amount_decimal: String,
    pub direction: Direction,
    pub tx_hash: String,
    pub block_number: i64,
}

fn format_decimal(raw: &str, decimals: u32) -> String {
    let value: num_bigint::BigUint = raw.parse().unwrap_or_default();
    let divisor = num_bigint::BigUint::from(10u64).pow(decimals);
    let whole = &value / &divisor;
    let frac = &value % &divisor;
    if decimals == 0 {
        return whole.to_string();
    }
    format!("{}.{:0width$}", whole, frac, width = decimals as usize)
}

/// Only `transfer(address,uint256)` and `transferFrom(address,address,uint256)`
/// carry a recipient address the router can attribute direction to.
fn extract_transfer(decoded: &DecodedCall, owner_hex: &str) -> Option<(String, String, String)> {
    match decoded.method_signature.as_str() {
        "transfer(address,uint256)" => {
            let to = decoded.addresses.first()?.clone();
            let amount = decoded.amount.clone()?;
            Some((owner_hex.to_string(), to, amount))
        }
        "transferFrom(address,address,uint256)" => {
            let from = decoded.addresses.first()?.clone();
            let to = decoded.addresses.get(1)?.clone();
            let amount = decoded.amount.clone()?;
            Some((from, to, amount))
        }
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn notify_if_trc20_transfer(
    http: &Client,
    endpoint: &str,
    subscription: &Subscription,
    contract_address_hex: &str,
    owner_hex: &str,
    decoded: &DecodedCall,
    tx_hash: &str,
    block_number: i64,
) {
    let Some(token) = lookup_token(contract_address_hex) else {
        return;
    };
    let Some((from, to, amount_raw)) = extract_transfer(decoded, owner_hex) else {
        return;
    };

    // ABI-decoded addresses are 20 raw bytes; the watched address (recovered
    // from base58) still carries Tron's `41` chain prefix, so both sides are
    // normalised to the bare 20-byte form before comparing.
    let watched_hex = crate::tron::address::base58_to_hex(&subscription.address)
        .map(|w| w.trim_start_matches("41").to_string());
    let to_norm = to.trim_start_matches("41");
    let from_norm = from.trim_start_matches("41");
    let direction = match &watched_hex {
        Some(watched) if to_norm.eq_ignore_ascii_case(watched) => Direction::In,
        Some(watched) if from_norm.eq_ignore_ascii_case(watched) => Direction::Out,
        _ => {
            // Neither side matches the watched address: not routable here.
            return;
        }
    };

    let notification = TransferNotification {
        subscription_id: subscription.subscription_id.clone(),
        watched_address: subscription.address.clone(),
        token_symbol: token.symbol,
        contract_address_hex: contract_address_hex.to_string(),
        contract_address_base58: hex_to_base58(contract_address_hex),
        from_base58: hex_to_base58(&from),
        from_hex: from,
        to_base58: hex_to_base58(&to),
        to_hex: to,
        amount_decimal: format_decimal(&amount_raw, token.decimals),
        amount_raw,
        direction,
        tx_hash: tx_hash.to_string(),
        block_number,
    };

    match http.post(endpoint).json(&notification).send().await {
        Ok(resp) if resp.status().is_success() => {
            info!(subscription_id = %subscription.subscription_id, token = token.symbol, "TRC20 transfer notification delivered");
        }
        Ok(resp) => {
            warn!(subscription_id = %subscription.subscription_id, status = %resp.status(), "TRC20 transfer notification rejected");
        }
        Err(e) => {
            warn!(subscription_id = %subscription.subscription_id, error = %e, "TRC20 transfer notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_six_decimals() {
        assert_eq!(format_decimal("100000000", 6), "100.000000");
    }

    #[test]
    fn formats_zero_decimals() {
        assert_eq!(format_decimal("42", 0), "42");
    }
}
