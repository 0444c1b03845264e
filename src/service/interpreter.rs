// Copyright (c) 2020-2023 MobileCoin Inc.

//! Decodes an output box into a human-meaningful asset list, classifying
//! swap settlements, asset minting, and ordinary transfers.

use crate::{
    config::NetworkConfig,
    service::models::unspent::{AssetId, RegisterId, UnspentOutput},
    util::amount::signed_units_to_display,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Externally supplied display metadata for a known asset.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssetMetadata {
    pub name: String,
    pub decimals: u32,
}

/// Asset id to display metadata, as known to the caller.
pub type AssetMetadataMap = BTreeMap<AssetId, AssetMetadata>;

/// One line of a decoded output: an asset (or the native currency) and
/// a signed amount in smallest units.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DisplayAsset {
    /// `None` for the native currency.
    pub asset_id: Option<AssetId>,

    /// Display name, when metadata or mint registers supply one.
    pub name: Option<String>,

    /// Signed amount in smallest units. Negative on a swap settlement
    /// means the box paid that asset out.
    pub amount: i128,

    /// Decimal scale for display, when known.
    pub decimals: Option<u32>,
}

impl DisplayAsset {
    /// The amount formatted at this asset's decimal scale, raw integer
    /// text when the scale is unknown.
    pub fn display_amount(&self) -> String {
        signed_units_to_display(self.amount, self.decimals.unwrap_or(0))
    }
}

/// The interpretation of one output box.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum DecodedOutput {
    /// A swap box settling a trade. Amounts are the box's deltas against
    /// its input counterpart, what the counterparty gained or lost,
    /// because the raw balance conflates pass-through liquidity with the
    /// trade itself.
    SwapSettlement { assets: Vec<DisplayAsset> },

    /// A freshly minted asset, with whatever metadata its registers
    /// carry.
    Minting {
        asset: DisplayAsset,
        description: Option<String>,
    },

    /// An ordinary value transfer.
    Transfer { assets: Vec<DisplayAsset> },
}

/// Classifies and decodes an output given the inputs of the transaction
/// that produced it.
///
/// Decoding never fails: malformed or absent registers degrade to
/// unknown metadata rather than aborting the interpretation.
pub fn interpret_output(
    output: &UnspentOutput,
    inputs: &[UnspentOutput],
    metadata: &AssetMetadataMap,
    config: &NetworkConfig,
) -> DecodedOutput {
    if config.is_swap_script(&output.script) {
        if let Some(counterpart) = inputs.iter().find(|input| input.script == output.script) {
            return DecodedOutput::SwapSettlement {
                assets: settlement_deltas(output, counterpart, metadata, config),
            };
        }
    }

    if let Some(minted) = detect_mint(output, inputs) {
        return minted;
    }

    DecodedOutput::Transfer {
        assets: transfer_assets(output, metadata, config),
    }
}

fn native_line(amount: i128, config: &NetworkConfig) -> DisplayAsset {
    DisplayAsset {
        asset_id: None,
        name: None,
        amount,
        decimals: Some(config.native_decimals),
    }
}

fn token_line(asset_id: &AssetId, amount: i128, metadata: &AssetMetadataMap) -> DisplayAsset {
    let known = metadata.get(asset_id);
    DisplayAsset {
        asset_id: Some(asset_id.clone()),
        name: known.map(|m| m.name.clone()),
        amount,
        decimals: known.map(|m| m.decimals),
    }
}

fn settlement_deltas(
    output: &UnspentOutput,
    counterpart: &UnspentOutput,
    metadata: &AssetMetadataMap,
    config: &NetworkConfig,
) -> Vec<DisplayAsset> {
    let mut lines = Vec::new();
    let native_delta = output.value as i128 - counterpart.value as i128;
    if native_delta != 0 {
        lines.push(native_line(native_delta, config));
    }

    let mut asset_ids: Vec<AssetId> = output
        .assets
        .iter()
        .chain(counterpart.assets.iter())
        .map(|token| token.token_id.clone())
        .collect();
    asset_ids.sort();
    asset_ids.dedup();

    for asset_id in asset_ids {
        let delta =
            output.asset_amount(&asset_id) as i128 - counterpart.asset_amount(&asset_id) as i128;
        if delta != 0 {
            lines.push(token_line(&asset_id, delta, metadata));
        }
    }
    lines
}

/// A box mints an asset when it carries a token whose id equals the id
/// of the transaction's first input.
fn detect_mint(output: &UnspentOutput, inputs: &[UnspentOutput]) -> Option<DecodedOutput> {
    let first_input = inputs.first()?;
    let minted = output
        .assets
        .iter()
        .find(|token| token.token_id.0 == first_input.box_id.0)?;

    let name = output
        .register(RegisterId::R4)
        .and_then(|value| value.as_utf8());
    let description = output
        .register(RegisterId::R5)
        .and_then(|value| value.as_utf8());
    let decimals = output
        .register(RegisterId::R6)
        .and_then(|value| value.as_int())
        .and_then(|raw| u32::try_from(raw).ok());

    Some(DecodedOutput::Minting {
        asset: DisplayAsset {
            asset_id: Some(minted.token_id.clone()),
            name,
            amount: minted.amount as i128,
            decimals,
        },
        description,
    })
}

fn transfer_assets(
    output: &UnspentOutput,
    metadata: &AssetMetadataMap,
    config: &NetworkConfig,
) -> Vec<DisplayAsset> {
    let mut lines = vec![native_line(output.value as i128, config)];
    for token in &output.assets {
        lines.push(token_line(&token.token_id, token.amount as i128, metadata));
    }
    lines
}
