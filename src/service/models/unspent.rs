// Copyright (c) 2020-2023 MobileCoin Inc.

//! Core chain-data model: unspent output boxes, the assets and registers
//! they carry, and the identifier newtypes used throughout the service.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(src: &str) -> Self {
                Self(src.to_string())
            }
        }

        impl From<String> for $name {
            fn from(src: String) -> Self {
                Self(src)
            }
        }
    };
}

string_id! {
    /// Unique identifier of an output box, hex-encoded.
    BoxId
}

string_id! {
    /// Identifier of a user-issued asset. By protocol rule this equals the
    /// box id of the first input of the transaction that minted it.
    AssetId
}

string_id! {
    /// Serialized guarding script of a box.
    Script
}

/// A quantity of one asset held inside a box.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TokenValue {
    pub token_id: AssetId,
    pub amount: u64,
}

impl TokenValue {
    pub fn new(token_id: impl Into<AssetId>, amount: u64) -> Self {
        Self {
            token_id: token_id.into(),
            amount,
        }
    }
}

/// Addressable register slots of a box. R0 through R3 are mandatory
/// protocol fields and are not modeled here.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum RegisterId {
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
}

/// A decoded register payload. Registers hold arbitrary serialized values
/// on chain; the service only distinguishes byte blobs from integers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Int(i64),
    Bytes(Vec<u8>),
}

impl RegisterValue {
    /// The payload as UTF-8 text, if it is bytes holding valid UTF-8.
    pub fn as_utf8(&self) -> Option<String> {
        match self {
            Self::Bytes(bytes) => String::from_utf8(bytes.clone()).ok(),
            Self::Int(_) => None,
        }
    }

    /// The payload as an integer. Issuers disagree on whether numeric
    /// registers hold a raw integer or its decimal text, so both are
    /// accepted.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Bytes(_) => self.as_utf8().and_then(|text| text.parse().ok()),
        }
    }
}

/// An unspent output box as reported by the chain context.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UnspentOutput {
    /// Identifier of this box.
    pub box_id: BoxId,

    /// Native value carried, in smallest units.
    pub value: u64,

    /// Non-native assets carried, if any.
    #[serde(default)]
    pub assets: Vec<TokenValue>,

    /// Script guarding the box.
    pub script: Script,

    /// Height of the block that created the box.
    pub creation_height: u64,

    /// Optional register payloads.
    #[serde(default)]
    pub registers: BTreeMap<RegisterId, RegisterValue>,
}

impl UnspentOutput {
    /// Amount of the given asset carried by this box, zero if absent.
    pub fn asset_amount(&self, asset_id: &AssetId) -> u64 {
        self.assets
            .iter()
            .find(|token| &token.token_id == asset_id)
            .map(|token| token.amount)
            .unwrap_or(0)
    }

    /// The decoded payload of a register, if present.
    pub fn register(&self, id: RegisterId) -> Option<&RegisterValue> {
        self.registers.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_with_assets() -> UnspentOutput {
        UnspentOutput {
            box_id: BoxId::from("b1"),
            value: 1_000_000,
            assets: vec![TokenValue::new("tok-a", 25), TokenValue::new("tok-b", 7)],
            script: Script::from("p2pk-alice"),
            creation_height: 10,
            registers: BTreeMap::new(),
        }
    }

    #[test]
    fn asset_amount_lookup() {
        let output = box_with_assets();
        assert_eq!(output.asset_amount(&AssetId::from("tok-a")), 25);
        assert_eq!(output.asset_amount(&AssetId::from("tok-b")), 7);
        assert_eq!(output.asset_amount(&AssetId::from("missing")), 0);
    }

    #[test]
    fn register_value_utf8() {
        let value = RegisterValue::Bytes(b"Token Name".to_vec());
        assert_eq!(value.as_utf8().as_deref(), Some("Token Name"));
        assert_eq!(value.as_int(), None);

        let bad = RegisterValue::Bytes(vec![0xff, 0xfe]);
        assert_eq!(bad.as_utf8(), None);
    }

    #[test]
    fn register_value_int_accepts_both_encodings() {
        assert_eq!(RegisterValue::Int(6).as_int(), Some(6));
        assert_eq!(RegisterValue::Bytes(b"6".to_vec()).as_int(), Some(6));
        assert_eq!(RegisterValue::Bytes(b"nope".to_vec()).as_int(), None);
    }

    #[test]
    fn output_serde_round_trip() {
        let output = box_with_assets();
        let json = serde_json::to_string(&output).unwrap();
        let back: UnspentOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn output_deserializes_without_optional_fields() {
        let json = r#"{
            "box_id": "b9",
            "value": 42,
            "script": "p2pk-bob",
            "creation_height": 3
        }"#;
        let output: UnspentOutput = serde_json::from_str(json).unwrap();
        assert!(output.assets.is_empty());
        assert!(output.registers.is_empty());
    }
}
