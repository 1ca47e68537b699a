//! # Addresses & Asset Identifiers
//!
//! Every principal in Vuna — a saver, the automation agent, the lending
//! pool, a deposit token — is identified by a 20-byte [`Address`], the
//! identifier format of the ledger runtime the engine settles against.
//! Asset identifiers are token contract addresses, so [`AssetId`] is an
//! alias rather than a separate type.
//!
//! Addresses serialize as `0x`-prefixed lowercase hex strings. That keeps
//! JSON maps keyed by asset readable and round-trippable, and matches how
//! every external system writes these identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a deposit asset. Assets are token contracts, so their
/// identifier is just the contract's address.
pub type AssetId = Address;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte ledger address identifying a principal or a token contract.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

/// Error returned when parsing an address from a hex string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The input was not valid hexadecimal.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    /// The decoded input was not exactly 20 bytes.
    #[error("address must be 20 bytes, got {0}")]
    WrongLength(usize),
}

impl Address {
    /// The all-zero address. Used as a sentinel in tests and demo configs,
    /// never as a real principal.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Creates an `Address` from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 20-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a hex-encoded address. A leading `0x`/`0X` prefix is accepted
    /// and ignored.
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let bytes =
            hex::decode(stripped).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressParseError::WrongLength(bytes.len()));
        }

        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Returns the `0x`-prefixed lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", &self.to_hex()[..10])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Addresses serialize as hex strings, not byte arrays. JSON requires map
// keys to be strings, and registry/balance maps are keyed by address.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let addr = Address::from_bytes([0xAB; 20]);
        let hex_str = addr.to_hex();
        assert!(hex_str.starts_with("0x"));
        assert_eq!(Address::from_hex(&hex_str).unwrap(), addr);
    }

    #[test]
    fn parse_accepts_unprefixed_hex() {
        let addr = Address::from_hex("abababababababababababababababababababab").unwrap();
        assert_eq!(addr, Address::from_bytes([0xAB; 20]));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let result = Address::from_hex("0xabcd");
        assert!(matches!(result, Err(AddressParseError::WrongLength(2))));
    }

    #[test]
    fn parse_rejects_non_hex() {
        let result = Address::from_hex("0xzzababababababababababababababababababab");
        assert!(matches!(result, Err(AddressParseError::InvalidHex(_))));
    }

    #[test]
    fn serde_as_hex_string() {
        let addr = Address::from_bytes([0x01; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));

        let recovered: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, addr);
    }

    #[test]
    fn display_matches_to_hex() {
        let addr = Address::from_bytes([0x7F; 20]);
        assert_eq!(format!("{}", addr), addr.to_hex());
    }
}
