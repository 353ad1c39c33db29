//! ABI decode edge cases beyond the in-module unit tests: fallback
//! table hits and malformed call data.

use tron_watch::config::{ConnectionConfig, TronNodeConfig};
use tron_watch::parser::AbiDecoder;
use tron_watch::tron::client::TronClient;

fn decoder() -> AbiDecoder {
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
    AbiDecoder::new(TronClient::new(&cfg))
}

#[tokio::test]
async fn fallback_table_resolves_a_non_trc20_selector() {
    let decoder = decoder();
    // deposit() — zero-argument fallback schema, no words to decode.
    let decoded = decoder
        .decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "d0e30db0")
        .await
        .unwrap();
    assert_eq!(decoded.method_name, "deposit()");
    assert!(decoded.addresses.is_empty());
}

#[tokio::test]
async fn call_data_shorter_than_a_selector_is_not_an_error() {
    let decoder = decoder();
    let decoded = decoder
        .decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "ab")
        .await
        .unwrap();
    assert_eq!(decoded.method_name, "Unknown Method (0x)");
    assert!(decoded.selector.is_empty());
}

#[tokio::test]
async fn invalid_hex_call_data_is_a_protocol_error() {
    let decoder = decoder();
    let err = decoder
        .decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "zzzz")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid call data"));
}

#[tokio::test]
async fn unrecognised_selector_falls_back_to_address_heuristic() {
    let decoder = decoder();
    // Not in either schema table; one word shaped like a zero-padded address
    // (12 zero bytes followed by a 20-byte address).
    let mut call_data = "ffffffff".to_string();
    call_data.push_str(&"0".repeat(24));
    call_data.push_str(&format!("{:040x}", 0xABCDu64));
    let decoded = decoder
        .decode("41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", &call_data)
        .await
        .unwrap();
    assert_eq!(decoded.method_name, "Unknown Method (0xffffffff)");
    assert_eq!(decoded.addresses.len(), 1);
}
