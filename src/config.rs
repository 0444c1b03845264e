// Copyright (c) 2020-2023 MobileCoin Inc.

//! Network parameters consumed by the transaction builders.

use crate::service::models::unspent::Script;
use serde::{Deserialize, Serialize};

/// Default minimum native value a single output box may carry.
pub const MINIMUM_BOX_VALUE: u64 = 100_000;

/// Default minimum transaction fee, in native smallest units.
pub const MINIMUM_FEE: u64 = 1_000_000;

/// Default decimal scale of the native asset.
pub const NATIVE_DECIMALS: u32 = 9;

/// Protocol parameters for the network a wallet is operating against.
///
/// All amounts are integers in the native asset's smallest unit. The
/// defaults match the public network; tests and alternative deployments
/// deserialize their own values.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Smallest native value a single output box may carry.
    pub minimum_box_value: u64,

    /// Smallest fee the network relays.
    pub minimum_fee: u64,

    /// Fee step used when replacing a pending transaction.
    pub fee_increment: u64,

    /// Decimal scale of the native asset at the display boundary.
    pub native_decimals: u32,

    /// Script the miner-fee output must pay to.
    pub fee_script: Script,

    /// Known swap-contract script templates. Outputs guarded by one of
    /// these scripts are liquidity boxes, never ordinary wallet funds.
    pub swap_scripts: Vec<Script>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            minimum_box_value: MINIMUM_BOX_VALUE,
            minimum_fee: MINIMUM_FEE,
            fee_increment: MINIMUM_FEE,
            native_decimals: NATIVE_DECIMALS,
            fee_script: Script::from("miner-fee-contract"),
            swap_scripts: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Whether the given script is one of the known swap-contract
    /// templates.
    pub fn is_swap_script(&self, script: &Script) -> bool {
        self.swap_scripts.contains(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize_from_empty_object() {
        let config: NetworkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.minimum_box_value, MINIMUM_BOX_VALUE);
        assert_eq!(config.minimum_fee, MINIMUM_FEE);
        assert_eq!(config.fee_increment, MINIMUM_FEE);
    }

    #[test]
    fn swap_script_lookup() {
        let mut config = NetworkConfig::default();
        config.swap_scripts.push(Script::from("swap-v1"));
        assert!(config.is_swap_script(&Script::from("swap-v1")));
        assert!(!config.is_swap_script(&Script::from("p2pk-abc")));
    }
}
