// Copyright (c) 2020-2023 MobileCoin Inc.

//! In-memory collaborators and fixtures for tests.

use crate::{
    config::NetworkConfig,
    service::{
        change::{StaticAddressBook, WalletAddress},
        context::{ConnectivityError, ContextProvider, LiquidityProvider},
        models::{
            profile::{SignerKind, WalletId, WalletProfile},
            unspent::{AssetId, BoxId, Script, TokenValue, UnspentOutput},
        },
    },
};
use async_trait::async_trait;
use rand::{rngs::StdRng, RngCore};
use std::collections::BTreeMap;

/// Script used for all wallet-owned fixture boxes.
pub const TEST_WALLET_SCRIPT: &str = "p2pk-wallet";

/// Script used for fixture swap boxes; [`swap_config`] registers it.
pub const TEST_SWAP_SCRIPT: &str = "swap-v1";

pub fn test_box(box_id: &str, value: u64, creation_height: u64) -> UnspentOutput {
    UnspentOutput {
        box_id: BoxId::from(box_id),
        value,
        assets: Vec::new(),
        script: Script::from(TEST_WALLET_SCRIPT),
        creation_height,
        registers: BTreeMap::new(),
    }
}

pub fn test_box_with_assets(
    box_id: &str,
    value: u64,
    creation_height: u64,
    assets: Vec<TokenValue>,
) -> UnspentOutput {
    UnspentOutput {
        assets,
        ..test_box(box_id, value, creation_height)
    }
}

/// A wallet box with a random hex identifier.
pub fn random_test_box(rng: &mut StdRng, value: u64, creation_height: u64) -> UnspentOutput {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    test_box(&hex::encode(bytes), value, creation_height)
}

/// A liquidity box selling native value for `asset_id` at the rate
/// implied by its reserves.
pub fn swap_liquidity_box(
    box_id: &str,
    value: u64,
    asset_id: &str,
    asset_amount: u64,
) -> UnspentOutput {
    UnspentOutput {
        script: Script::from(TEST_SWAP_SCRIPT),
        assets: vec![TokenValue::new(AssetId::from(asset_id), asset_amount)],
        ..test_box(box_id, value, 1)
    }
}

/// Default network config with the fixture swap script registered.
pub fn swap_config() -> NetworkConfig {
    let mut config = NetworkConfig::default();
    config.swap_scripts.push(Script::from(TEST_SWAP_SCRIPT));
    config
}

pub fn test_profile(signer: SignerKind) -> WalletProfile {
    WalletProfile {
        wallet_id: WalletId::from("w1"),
        signer,
        avoid_address_reuse: false,
    }
}

/// An address book for wallet `w1` owning the fixture wallet script plus
/// a dedicated change address.
pub fn test_address_book() -> StaticAddressBook {
    let mut book = StaticAddressBook::new();
    book.insert_wallet(
        WalletId::from("w1"),
        vec![
            WalletAddress {
                index: 0,
                script: Script::from(TEST_WALLET_SCRIPT),
                used: true,
            },
            WalletAddress {
                index: 1,
                script: Script::from("p2pk-change"),
                used: false,
            },
        ],
        Some(1),
    );
    book
}

/// Context provider backed by fixed data, optionally failing every call
/// to exercise connectivity handling.
#[derive(Clone, Debug)]
pub struct MemoryContextProvider {
    height: u64,
    outputs: Vec<UnspentOutput>,
    fail: bool,
}

impl MemoryContextProvider {
    pub fn new(height: u64, outputs: Vec<UnspentOutput>) -> Self {
        Self {
            height,
            outputs,
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn check(&self) -> Result<(), ConnectivityError> {
        if self.fail {
            Err(ConnectivityError::Unreachable("test provider down".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContextProvider for MemoryContextProvider {
    async fn get_height(&self) -> Result<u64, ConnectivityError> {
        self.check()?;
        Ok(self.height)
    }

    async fn get_spendable_outputs(
        &self,
        _wallet_id: &WalletId,
    ) -> Result<Vec<UnspentOutput>, ConnectivityError> {
        self.check()?;
        Ok(self.outputs.clone())
    }
}

/// Liquidity provider backed by a fixed list of swap boxes.
#[derive(Clone, Debug, Default)]
pub struct MemoryLiquidityProvider {
    boxes: Vec<UnspentOutput>,
}

impl MemoryLiquidityProvider {
    pub fn with_boxes(boxes: Vec<UnspentOutput>) -> Self {
        Self { boxes }
    }
}

#[async_trait]
impl LiquidityProvider for MemoryLiquidityProvider {
    async fn find_swap_boxes(
        &self,
        asset_id: &AssetId,
    ) -> Result<Vec<UnspentOutput>, ConnectivityError> {
        Ok(self
            .boxes
            .iter()
            .filter(|output| output.asset_amount(asset_id) > 0)
            .cloned()
            .collect())
    }
}
