//! Tron base58 address validation and hex<->base58 conversion.
//!
//! Full base58 address *issuance* (deriving addresses from key material) is
//! an out-of-scope external collaborator; what the core
//! needs here is narrower: validating the textual shape on input, and
//! converting the node's raw hex addresses to base58 for outbound
//! notifications. Both lean on `bs58`/`sha2`, the same pairing
//! the wider Tron/Solana ecosystem in this pack reaches for.

use sha2::{Digest, Sha256};

const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Validates the textual shape: base58, 34 characters,
/// leading `T`, restricted alphabet. Does not verify the checksum (that
/// would require a full decode, which subscription-time validation does not
/// need).
pub fn is_valid_address(addr: &str) -> bool {
    if addr.len() != 34 {
        return false;
    }
    if !addr.starts_with('T') {
        return false;
    }
    addr.bytes().all(|b| ALPHABET.contains(&b))
}

/// Converts a raw hex Tron address (20 bytes, or 21 with the `41` prefix) as
/// stored by the node into its base58 textual form, appending the 4-byte
/// double-SHA256 checksum Tron addresses carry.
pub fn hex_to_base58(hex_addr: &str) -> Option<String> {
    let hex_addr = hex_addr.trim_start_matches("0x");
    let bytes = hex::decode(hex_addr).ok()?;
    if bytes.is_empty() {
        return None;
    }
    let bytes = if bytes.len() == 20 {
        let mut with_prefix = vec![0x41u8];
        with_prefix.extend_from_slice(&bytes);
        with_prefix
    } else {
        bytes
    };
    let checksum = Sha256::digest(Sha256::digest(&bytes));
    let mut full = bytes;
    full.extend_from_slice(&checksum[0..4]);
    Some(bs58::encode(full).into_string())
}

/// Inverse of [`hex_to_base58`]: recovers the node's raw hex address (with
/// its `41` prefix, checksum stripped) from a base58 address. Used by
/// monitors to compare the watched address against contract payload
/// addresses, which the node always reports in hex.
pub fn base58_to_hex(addr: &str) -> Option<String> {
    let full = bs58::decode(addr).into_vec().ok()?;
    if full.len() < 5 {
        return None;
    }
    let payload = &full[..full.len() - 4];
    Some(hex::encode(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_address_shape() {
        assert!(is_valid_address("TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_valid_address("TXYZ"));
    }

    #[test]
    fn rejects_bad_prefix() {
        assert!(!is_valid_address("AXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf"));
    }

    #[test]
    fn rejects_forbidden_characters() {
        // contains '0', which base58 excludes
        assert!(!is_valid_address("T0YZopYRdj2D9XRtbG411XZZ3kM5VkAeBf"));
    }

    #[test]
    fn hex_roundtrips_to_t_prefixed_address() {
        let addr = hex_to_base58("41d3682962027e721c5247a9faf7865fe4a71d543").unwrap();
        assert!(addr.starts_with('T'));
    }

    #[test]
    fn base58_to_hex_and_back() {
        let hex_addr = "41d3682962027e721c5247a9faf7865fe4a71d543";
        let b58 = hex_to_base58(hex_addr).unwrap();
        let recovered = base58_to_hex(&b58).unwrap();
        assert_eq!(recovered, hex_addr);
    }
}
