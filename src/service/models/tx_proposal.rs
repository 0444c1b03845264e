// Copyright (c) 2020-2023 MobileCoin Inc.

//! The transaction draft produced by the builders: selected inputs, the
//! outputs they fund, and the checks that keep the draft balanced.

use crate::service::models::unspent::{
    AssetId, BoxId, RegisterId, RegisterValue, Script, TokenValue, UnspentOutput,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recipient payment requested by the caller, before construction.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OutputCandidate {
    /// Script of the recipient address.
    pub script: Script,

    /// Native value to send, in smallest units.
    pub value: u64,

    /// Non-native assets to send.
    #[serde(default)]
    pub assets: Vec<TokenValue>,
}

/// A fully specified output of a draft transaction.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DraftOutput {
    pub script: Script,
    pub value: u64,
    #[serde(default)]
    pub assets: Vec<TokenValue>,
    pub creation_height: u64,
    #[serde(default)]
    pub registers: BTreeMap<RegisterId, RegisterValue>,
}

impl DraftOutput {
    pub fn new(script: Script, value: u64, assets: Vec<TokenValue>, creation_height: u64) -> Self {
        Self {
            script,
            value,
            assets,
            creation_height,
            registers: BTreeMap::new(),
        }
    }

    fn asset_amount(&self, asset_id: &AssetId) -> u64 {
        self.assets
            .iter()
            .find(|token| &token.token_id == asset_id)
            .map(|token| token.amount)
            .unwrap_or(0)
    }
}

/// A balanced transaction draft ready for signing.
///
/// Outputs are kept in labeled groups so callers can present the draft
/// meaningfully; [`TxProposal::outputs`] flattens them into the canonical
/// wire order: payments, then the swap continuation, then change, then
/// the fee.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TxProposal {
    /// Boxes consumed, wallet-owned except for an optional swap box.
    pub inputs: Vec<UnspentOutput>,

    /// Outputs paying the requested recipients.
    pub payload_outputs: Vec<DraftOutput>,

    /// Continuation of a consumed swap box, present on token-fee drafts.
    pub swap_output: Option<DraftOutput>,

    /// Outputs returning leftover funds to the wallet.
    pub change_outputs: Vec<DraftOutput>,

    /// The miner-fee output.
    pub fee_output: DraftOutput,

    /// Chain height observed while building, recorded for expiry checks.
    pub network_height: u64,
}

impl TxProposal {
    /// All outputs in canonical order.
    pub fn outputs(&self) -> Vec<&DraftOutput> {
        self.payload_outputs
            .iter()
            .chain(self.swap_output.iter())
            .chain(self.change_outputs.iter())
            .chain(std::iter::once(&self.fee_output))
            .collect()
    }

    /// The fee this draft pays, in native smallest units.
    pub fn fee_value(&self) -> u64 {
        self.fee_output.value
    }

    /// Sum of native value across all inputs.
    pub fn total_input_value(&self) -> u128 {
        self.inputs.iter().map(|input| input.value as u128).sum()
    }

    /// Checks that native value and every asset are exactly conserved
    /// across this draft. Construction must never produce a draft that
    /// fails this; the check runs before a draft leaves the builder.
    pub fn verify_conservation(&self) -> Result<(), String> {
        let output_value: u128 = self
            .outputs()
            .iter()
            .map(|output| output.value as u128)
            .sum();
        let input_value = self.total_input_value();
        if input_value != output_value {
            return Err(format!(
                "native value not conserved: inputs {input_value}, outputs {output_value}"
            ));
        }

        let mut asset_ids: Vec<AssetId> = self
            .inputs
            .iter()
            .flat_map(|input| input.assets.iter())
            .chain(self.outputs().into_iter().flat_map(|o| o.assets.iter()))
            .map(|token| token.token_id.clone())
            .collect();
        asset_ids.sort();
        asset_ids.dedup();

        for asset_id in asset_ids {
            let input_amount: u128 = self
                .inputs
                .iter()
                .map(|input| input.asset_amount(&asset_id) as u128)
                .sum();
            let output_amount: u128 = self
                .outputs()
                .iter()
                .map(|output| output.asset_amount(&asset_id) as u128)
                .sum();
            if input_amount != output_amount {
                return Err(format!(
                    "asset {asset_id} not conserved: inputs {input_amount}, outputs {output_amount}"
                ));
            }
        }
        Ok(())
    }

    /// Strips chain context down to the transaction body handed to a
    /// signer.
    pub fn to_unsigned(&self) -> UnsignedTransaction {
        UnsignedTransaction {
            inputs: self.inputs.iter().map(|input| input.box_id.clone()).collect(),
            outputs: self.outputs().into_iter().cloned().collect(),
            network_height: self.network_height,
        }
    }
}

/// The signable transaction body: input references and complete outputs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UnsignedTransaction {
    pub inputs: Vec<BoxId>,
    pub outputs: Vec<DraftOutput>,
    pub network_height: u64,
}
