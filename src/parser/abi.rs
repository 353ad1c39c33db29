//! ABI decoder for `TriggerSmartContract` calls: matches the first
//! 4 bytes of call data against a known-selector table, falls back to a
//! table of common selectors, and otherwise emits an `Unknown Method`
//! placeholder so the event stays routable.

use dashmap::DashMap;
use num_bigint::BigUint;
use num_traits::Num;
use tracing::warn;

use crate::error::AppError;
use crate::tron::client::TronClient;
use crate::tron::types::Contract;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgType {
    Address,
    Uint256,
}

struct MethodSchema {
    selector: &'static str,
    signature: &'static str,
    args: &'static [ArgType],
}

/// TRC20 selectors the router/parser treat specially (transfer detection,
/// decimals lookups) in addition to the generic decode path.
const TRC20_SCHEMAS: &[MethodSchema] = &[
    MethodSchema { selector: "a9059cbb", signature: "transfer(address,uint256)", args: &[ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "23b872dd", signature: "transferFrom(address,address,uint256)", args: &[ArgType::Address, ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "095ea7b3", signature: "approve(address,uint256)", args: &[ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "70a08231", signature: "balanceOf(address)", args: &[ArgType::Address] },
    MethodSchema { selector: "dd62ed3e", signature: "allowance(address,address)", args: &[ArgType::Address, ArgType::Address] },
    MethodSchema { selector: "313ce567", signature: "decimals()", args: &[] },
    MethodSchema { selector: "06fdde03", signature: "name()", args: &[] },
    MethodSchema { selector: "95d89b41", signature: "symbol()", args: &[] },
    MethodSchema { selector: "18160ddd", signature: "totalSupply()", args: &[] },
];

/// Fallback table of common selectors across swaps, staking, NFTs and
/// governance — not exhaustive, but enough that a typical DeFi interaction
/// on a watched contract resolves to a human-readable name instead of
/// `Unknown Method`.
const FALLBACK_SCHEMAS: &[MethodSchema] = &[
    MethodSchema { selector: "7ff36ab5", signature: "swapExactETHForTokens(uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "38ed1739", signature: "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "18cbafe5", signature: "swapExactTokensForETH(uint256,uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "8803dbee", signature: "swapTokensForExactTokens(uint256,uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "fb3bdb41", signature: "swapETHForExactTokens(uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "4a25d94a", signature: "swapTokensForExactETH(uint256,uint256,address[],address,uint256)", args: &[] },
    MethodSchema { selector: "e8e33700", signature: "addLiquidity(address,address,uint256,uint256,uint256,uint256,address,uint256)", args: &[] },
    MethodSchema { selector: "f305d719", signature: "addLiquidityETH(address,uint256,uint256,uint256,address,uint256)", args: &[] },
    MethodSchema { selector: "baa2abde", signature: "removeLiquidity(address,address,uint256,uint256,uint256,address,uint256)", args: &[] },
    MethodSchema { selector: "02751cec", signature: "removeLiquidityETH(address,uint256,uint256,uint256,address,uint256)", args: &[] },
    MethodSchema { selector: "42842e0e", signature: "safeTransferFrom(address,address,uint256)", args: &[ArgType::Address, ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "b88d4fde", signature: "safeTransferFrom(address,address,uint256,bytes)", args: &[ArgType::Address, ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "a22cb465", signature: "setApprovalForAll(address,bool)", args: &[ArgType::Address] },
    MethodSchema { selector: "6352211e", signature: "ownerOf(uint256)", args: &[ArgType::Uint256] },
    MethodSchema { selector: "081812fc", signature: "getApproved(uint256)", args: &[ArgType::Uint256] },
    MethodSchema { selector: "40c10f19", signature: "mint(address,uint256)", args: &[ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "9dc29fac", signature: "burn(address,uint256)", args: &[ArgType::Address, ArgType::Uint256] },
    MethodSchema { selector: "2e1a7d4d", signature: "withdraw(uint256)", args: &[ArgType::Uint256] },
    MethodSchema { selector: "d0e30db0", signature: "deposit()", args: &[] },
    MethodSchema { selector: "a694fc3a", signature: "stake(uint256)", args: &[ArgType::Uint256] },
    MethodSchema { selector: "3d18b912", signature: "getReward()", args: &[] },
    MethodSchema { selector: "e9fad8ee", signature: "exit()", args: &[] },
    MethodSchema { selector: "c7012626", signature: "delegate(address)", args: &[ArgType::Address] },
    MethodSchema { selector: "da95691a", signature: "propose(address[],uint256[],string[],bytes[],string)", args: &[] },
    MethodSchema { selector: "15373e3d", signature: "castVote(uint256,uint8)", args: &[] },
];

pub struct DecodedCall {
    pub method_signature: String,
    pub method_name: String,
    pub selector: String,
    pub addresses: Vec<String>,
    pub amount: Option<String>,
    pub parameters: Vec<String>,
}

/// Maintains a thread-safe cache of fetched ABIs, keyed by contract address,
/// so a repeated call into the same contract does not re-fetch the ABI.
pub struct AbiDecoder {
    client: TronClient,
    cache: DashMap<String, Contract>,
}

impl AbiDecoder {
    pub fn new(client: TronClient) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    fn find_schema(selector: &str) -> Option<&'static MethodSchema> {
        TRC20_SCHEMAS
            .iter()
            .chain(FALLBACK_SCHEMAS.iter())
            .find(|m| m.selector == selector)
    }

    /// Best-effort ABI fetch; on miss or timeout this degrades to the
    /// selector tables rather than failing the decode.
    async fn ensure_cached(&self, contract_address: &str) {
        if self.cache.contains_key(contract_address) {
            return;
        }
        match self.client.get_contract(contract_address).await {
            Ok(contract) => {
                self.cache.insert(contract_address.to_string(), contract);
            }
            Err(e) => {
                warn!(contract_address, error = %e, "ABI fetch failed, falling back to selector table");
            }
        }
    }

    /// Decodes `call_data` (hex, `0x`-prefixed or not) against the known
    /// TRC20 table, the fallback table, and finally the contract's own ABI
    /// (fetched on demand). Never errors: an unrecognised selector becomes
    /// `Unknown Method (0x<sel>)`.
    pub async fn decode(&self, contract_address: &str, call_data: &str) -> Result<DecodedCall, AppError> {
        let data = call_data.trim_start_matches("0x");
        let bytes = hex::decode(data).map_err(|e| AppError::Protocol(format!("invalid call data: {e}")))?;
        if bytes.len() < 4 {
            return Ok(DecodedCall {
                method_signature: String::new(),
                method_name: "Unknown Method (0x)".to_string(),
                selector: String::new(),
                addresses: Vec::new(),
                amount: None,
                parameters: Vec::new(),
            });
        }
        let selector = hex::encode(&bytes[0..4]);
        let words: Vec<&[u8]> = bytes[4..].chunks(32).collect();
        let parameters: Vec<String> = words.iter().map(|w| hex::encode(w)).collect();

        if let Some(schema) = Self::find_schema(&selector) {
            let (addresses, amount) = Self::decode_args(schema.args, &words);
            return Ok(DecodedCall {
                method_signature: schema.signature.to_string(),
                method_name: schema.signature.to_string(),
                selector,
                addresses,
                amount,
                parameters,
            });
        }

        self.ensure_cached(contract_address).await;
        if let Some(contract) = self.cache.get(contract_address) {
            if let Some(entry) = contract.abi.entrys.iter().find(|e| {
                e.entry_type == "Function"
                    && e.name.is_some()
                    && matches!(
                        Self::signature_selector(e),
                        Some(ref sel) if sel == &selector
                    )
            }) {
                let args: Vec<ArgType> = entry
                    .inputs
                    .iter()
                    .map(|p| {
                        if p.param_type.starts_with("address") {
                            ArgType::Address
                        } else {
                            ArgType::Uint256
                        }
                    })
                    .collect();
                let (addresses, amount) = Self::decode_args(&args, &words);
                let signature = Self::abi_signature(entry);
                return Ok(DecodedCall {
                    method_signature: signature.clone(),
                    method_name: signature,
                    selector,
                    addresses,
                    amount,
                    parameters,
                });
            }
        }

        // Heuristic decode for a genuinely unknown method: a 32-byte word
        // whose leading 12 bytes are zero is treated as an address-typed
        // parameter.
        let addresses: Vec<String> = words
            .iter()
            .filter(|w| w.len() == 32 && w[0..12].iter().all(|b| *b == 0))
            .map(|w| hex::encode(&w[12..32]))
            .collect();

        Ok(DecodedCall {
            method_signature: String::new(),
            method_name: format!("Unknown Method (0x{selector})"),
            selector,
            addresses,
            amount: None,
            parameters,
        })
    }

    fn decode_args(args: &[ArgType], words: &[&[u8]]) -> (Vec<String>, Option<String>) {
        let mut addresses = Vec::new();
        let mut amount = None;
        for (arg, word) in args.iter().zip(words.iter()) {
            match arg {
                ArgType::Address if word.len() == 32 => {
                    addresses.push(hex::encode(&word[12..32]));
                }
                ArgType::Uint256 if word.len() == 32 => {
                    let value = BigUint::from_bytes_be(word);
                    amount = Some(value.to_string());
                }
                _ => {}
            }
        }
        (addresses, amount)
    }

    fn abi_signature(entry: &crate::tron::types::AbiEntry) -> String {
        let name = entry.name.clone().unwrap_or_default();
        let args = entry
            .inputs
            .iter()
            .map(|p| p.param_type.clone())
            .collect::<Vec<_>>()
            .join(",");
        format!("{name}({args})")
    }

    /// Tron's `getcontract` ABI entries don't carry a precomputed selector;
    /// derive it the same way Solidity does (keccak256 of the canonical
    /// signature, first 4 bytes). Parsed lazily and cached would be an
    /// optimisation for a contract with many methods; out of scope here
    /// since ABI lookups are already the cold path.
    fn signature_selector(entry: &crate::tron::types::AbiEntry) -> Option<String> {
        use sha3::{Digest, Keccak256};
        let signature = Self::abi_signature(entry);
        if signature.starts_with('(') {
            return None;
        }
        let hash = Keccak256::digest(signature.as_bytes());
        Some(hex::encode(&hash[0..4]))
    }
}

/// Parses a base-10 amount string back into its raw-hex 32-byte word form,
/// used by tests that exercise the decode path end to end.
#[cfg(test)]
pub fn encode_uint256(amount: &str) -> String {
    let value = BigUint::from_str_radix(amount, 10).unwrap();
    let bytes = value.to_bytes_be();
    let mut word = vec![0u8; 32 - bytes.len()];
    word.extend_from_slice(&bytes);
    hex::encode(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TronNodeConfig;

    fn decoder() -> AbiDecoder {
        let cfg = TronNodeConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            use_tls: false,
            connection: crate::config::ConnectionConfig {
                timeout_secs: 1,
                max_retries: 0,
                backoff_interval_ms: 1,
                keep_alive_secs: 1,
            },
        };
        AbiDecoder::new(TronClient::new(&cfg))
    }

    #[tokio::test]
    async fn decodes_known_trc20_transfer() {
        let decoder = decoder();
        let recipient = "d3682962027e721c5247a9faf7865fe4a71d543";
        let mut call_data = "a9059cbb".to_string();
        call_data.push_str(&format!("{:0>64}", recipient));
        call_data.push_str(&encode_uint256("100000000"));

        let decoded = decoder.decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", &call_data).await.unwrap();
        assert_eq!(decoded.method_name, "transfer(address,uint256)");
        assert_eq!(decoded.addresses, vec![recipient.to_string()]);
        assert_eq!(decoded.amount.as_deref(), Some("100000000"));
    }

    #[tokio::test]
    async fn unknown_selector_is_still_routable() {
        let decoder = decoder();
        let decoded = decoder.decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "deadbeef").await.unwrap();
        assert_eq!(decoded.method_name, "Unknown Method (0xdeadbeef)");
    }
}
