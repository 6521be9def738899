//! Record types exchanged with the chain-data provider and callers.
//!
//! All monetary values are in satoshis.

use bitcoin::ScriptBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An unspent transaction output as reported by the chain-data provider.
///
/// The wallet never mutates individual records; the whole set is replaced
/// on every refresh.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Unspent {
    /// Hex transaction identifier, in display byte order.
    pub tx_id: String,
    /// Output position within the transaction.
    pub vout: u32,
    /// Address the output pays to.
    pub address: String,
    /// Value in satoshis.
    pub value: u64,
    /// Number of confirmations (0 = unconfirmed).
    pub confirmations: u32,
}

impl Unspent {
    /// Identity key `txid:vout`, as used for duplicate detection.
    pub fn key(&self) -> String {
        format!("{}:{}", self.tx_id, self.vout)
    }
}

/// Where a requested output pays to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// An encoded address, resolved to a locking script by the codec.
    Address(String),
    /// A raw locking script, used as-is.
    Script(ScriptBuf),
    /// A fresh address of the wallet's internal chain, chosen at build time.
    Change,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Address(a) => write!(f, "{a}"),
            Destination::Script(s) => write!(f, "script:{}", hex::encode(s.as_bytes())),
            Destination::Change => write!(f, "change"),
        }
    }
}

/// A payment the caller wants the transaction to make.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputRequest {
    pub destination: Destination,
    /// Amount in satoshis.
    pub value: u64,
}

impl OutputRequest {
    /// Pay `value` to an encoded address.
    pub fn to_address(address: impl Into<String>, value: u64) -> Self {
        Self {
            destination: Destination::Address(address.into()),
            value,
        }
    }

    /// Pay `value` to a raw locking script.
    pub fn to_script(script: ScriptBuf, value: u64) -> Self {
        Self {
            destination: Destination::Script(script),
            value,
        }
    }

    /// Pay `value` back to the wallet on an unissued change address.
    pub fn to_change(value: u64) -> Self {
        Self {
            destination: Destination::Change,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Unspent {
        Unspent {
            tx_id: "a".repeat(64),
            vout: 3,
            address: "mxxx".into(),
            value: 1000,
            confirmations: 2,
        }
    }

    #[test]
    fn key_joins_txid_and_vout() {
        assert_eq!(sample().key(), format!("{}:3", "a".repeat(64)));
    }

    #[test]
    fn unspent_json_uses_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"txId\""));
        let back: Unspent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn negative_value_rejected_by_type() {
        let json = r#"{"txId":"00","vout":0,"address":"x","value":-1,"confirmations":0}"#;
        assert!(serde_json::from_str::<Unspent>(json).is_err());
    }

    #[test]
    fn fractional_value_rejected_by_type() {
        let json = r#"{"txId":"00","vout":0,"address":"x","value":1.5,"confirmations":0}"#;
        assert!(serde_json::from_str::<Unspent>(json).is_err());
    }

    #[test]
    fn destination_display() {
        let d = Destination::Script(ScriptBuf::from_bytes(vec![0x6a]));
        assert_eq!(d.to_string(), "script:6a");
        let a = OutputRequest::to_address("1abc", 5);
        assert_eq!(a.destination.to_string(), "1abc");
        assert_eq!(OutputRequest::to_change(5).destination.to_string(), "change");
    }
}
