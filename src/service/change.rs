// Copyright (c) 2020-2023 MobileCoin Inc.

//! Change policy: partitioning leftover value and assets into change
//! outputs, and choosing the address they pay to.

use crate::service::{
    context::{AddressPolicy, AddressPolicyError},
    models::{
        profile::{WalletId, WalletProfile},
        tx_proposal::DraftOutput,
        unspent::{AssetId, Script, TokenValue},
    },
};
use displaydoc::Display;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Errors computing change.
#[derive(Display, Debug, PartialEq, Eq)]
pub enum ChangeError {
    /// Leftover value {0} cannot fund {1} change boxes at the {2} minimum
    UnderfundedChange(u64, usize, u64),
}

/// Number of change boxes needed to carry `asset_count` distinct assets
/// with at most `max_assets` per box. Zero when there is nothing to
/// return.
pub fn required_change_boxes(leftover_value: u64, asset_count: usize, max_assets: usize) -> usize {
    if leftover_value == 0 && asset_count == 0 {
        return 0;
    }
    asset_count.div_ceil(max_assets.max(1)).max(1)
}

/// Splits leftover funds into change outputs paying `change_script`.
///
/// Assets are spread across boxes in id order, each box capped at
/// `max_assets` distinct assets and carrying at least the protocol
/// minimum native value. The first box absorbs whatever native value
/// remains after the others take the minimum.
pub fn partition_change(
    leftover_value: u64,
    leftover_assets: &BTreeMap<AssetId, u64>,
    change_script: &Script,
    max_assets: usize,
    minimum_box_value: u64,
    creation_height: u64,
) -> Result<Vec<DraftOutput>, ChangeError> {
    let assets: Vec<TokenValue> = leftover_assets
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(asset_id, amount)| TokenValue::new(asset_id.clone(), *amount))
        .collect();

    let boxes = required_change_boxes(leftover_value, assets.len(), max_assets);
    if boxes == 0 {
        return Ok(Vec::new());
    }

    let floor = (boxes as u64)
        .checked_mul(minimum_box_value)
        .unwrap_or(u64::MAX);
    if leftover_value < floor {
        return Err(ChangeError::UnderfundedChange(
            leftover_value,
            boxes,
            minimum_box_value,
        ));
    }

    let groups = assets.into_iter().chunks(max_assets.max(1));
    let mut chunks: Vec<Vec<TokenValue>> = groups
        .into_iter()
        .map(|chunk| chunk.collect())
        .collect();
    chunks.resize(boxes, Vec::new());

    let first_value = leftover_value - (boxes as u64 - 1) * minimum_box_value;
    let outputs = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let value = if i == 0 { first_value } else { minimum_box_value };
            DraftOutput::new(change_script.clone(), value, chunk, creation_height)
        })
        .collect();
    Ok(outputs)
}

/// One address the wallet controls.
#[derive(Clone, Debug)]
pub struct WalletAddress {
    pub index: u32,
    pub script: Script,
    pub used: bool,
}

#[derive(Clone, Debug, Default)]
struct AddressBookEntry {
    addresses: Vec<WalletAddress>,
    default_index: Option<u32>,
}

/// An in-memory address book implementing the change-address rules:
/// a reuse-avoiding wallet takes its first unused address in index
/// order; otherwise the configured default-index address; failing both,
/// the lowest-index address it owns.
#[derive(Clone, Debug, Default)]
pub struct StaticAddressBook {
    entries: BTreeMap<WalletId, AddressBookEntry>,
}

impl StaticAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_wallet(
        &mut self,
        wallet_id: WalletId,
        addresses: Vec<WalletAddress>,
        default_index: Option<u32>,
    ) {
        self.entries.insert(
            wallet_id,
            AddressBookEntry {
                addresses,
                default_index,
            },
        );
    }

    fn entry(&self, wallet_id: &WalletId) -> Result<&AddressBookEntry, AddressPolicyError> {
        self.entries
            .get(wallet_id)
            .ok_or_else(|| AddressPolicyError::UnknownWallet(wallet_id.clone()))
    }
}

impl AddressPolicy for StaticAddressBook {
    fn change_script(&self, profile: &WalletProfile) -> Result<Script, AddressPolicyError> {
        let entry = self.entry(&profile.wallet_id)?;
        let mut ordered: Vec<&WalletAddress> = entry.addresses.iter().collect();
        ordered.sort_by_key(|address| address.index);

        if profile.avoid_address_reuse {
            if let Some(fresh) = ordered.iter().find(|address| !address.used) {
                return Ok(fresh.script.clone());
            }
        }
        if let Some(default_index) = entry.default_index {
            if let Some(address) = ordered.iter().find(|address| address.index == default_index) {
                return Ok(address.script.clone());
            }
        }
        ordered
            .first()
            .map(|address| address.script.clone())
            .ok_or_else(|| AddressPolicyError::NoChangeAddress(profile.wallet_id.clone()))
    }

    fn owned_scripts(&self, wallet_id: &WalletId) -> Result<Vec<Script>, AddressPolicyError> {
        Ok(self
            .entry(wallet_id)?
            .addresses
            .iter()
            .map(|address| address.script.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::models::profile::SignerKind;

    fn assets(pairs: &[(&str, u64)]) -> BTreeMap<AssetId, u64> {
        pairs
            .iter()
            .map(|(id, amount)| (AssetId::from(*id), *amount))
            .collect()
    }

    #[test]
    fn no_leftover_means_no_change() {
        let outputs = partition_change(
            0,
            &BTreeMap::new(),
            &Script::from("p2pk-change"),
            100,
            100_000,
            50,
        )
        .unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn single_box_absorbs_everything() {
        let outputs = partition_change(
            488_900_000,
            &assets(&[("tok-a", 50)]),
            &Script::from("p2pk-change"),
            100,
            100_000,
            50,
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].value, 488_900_000);
        assert_eq!(outputs[0].assets, vec![TokenValue::new("tok-a", 50)]);
    }

    #[test]
    fn hardware_limit_splits_one_asset_per_box() {
        let outputs = partition_change(
            1_000_000,
            &assets(&[("tok-a", 5), ("tok-b", 6), ("tok-c", 7)]),
            &Script::from("p2pk-change"),
            SignerKind::Hardware.max_change_assets(),
            100_000,
            50,
        )
        .unwrap();
        assert_eq!(outputs.len(), 3);
        // First box takes the remainder, the rest sit at the minimum.
        assert_eq!(outputs[0].value, 800_000);
        assert_eq!(outputs[1].value, 100_000);
        assert_eq!(outputs[2].value, 100_000);
        for output in &outputs {
            assert_eq!(output.assets.len(), 1);
            assert!(output.value >= 100_000);
        }
        // Assets land in id order.
        assert_eq!(outputs[0].assets[0].token_id.0, "tok-a");
        assert_eq!(outputs[2].assets[0].token_id.0, "tok-c");
    }

    #[test]
    fn underfunded_change_fails_instead_of_dust() {
        let err = partition_change(
            150_000,
            &assets(&[("tok-a", 1), ("tok-b", 1)]),
            &Script::from("p2pk-change"),
            1,
            100_000,
            50,
        )
        .unwrap_err();
        assert_eq!(err, ChangeError::UnderfundedChange(150_000, 2, 100_000));
    }

    #[test]
    fn zero_amounts_are_dropped() {
        let outputs = partition_change(
            200_000,
            &assets(&[("tok-a", 0), ("tok-b", 3)]),
            &Script::from("p2pk-change"),
            1,
            100_000,
            50,
        )
        .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].assets, vec![TokenValue::new("tok-b", 3)]);
    }

    fn book() -> StaticAddressBook {
        let mut book = StaticAddressBook::new();
        book.insert_wallet(
            WalletId::from("w1"),
            vec![
                WalletAddress {
                    index: 0,
                    script: Script::from("p2pk-a0"),
                    used: true,
                },
                WalletAddress {
                    index: 1,
                    script: Script::from("p2pk-a1"),
                    used: true,
                },
                WalletAddress {
                    index: 2,
                    script: Script::from("p2pk-a2"),
                    used: false,
                },
            ],
            Some(1),
        );
        book
    }

    fn profile(avoid_reuse: bool) -> WalletProfile {
        WalletProfile {
            wallet_id: WalletId::from("w1"),
            signer: SignerKind::Software,
            avoid_address_reuse: avoid_reuse,
        }
    }

    #[test]
    fn reuse_avoidance_picks_first_unused() {
        assert_eq!(
            book().change_script(&profile(true)).unwrap(),
            Script::from("p2pk-a2")
        );
    }

    #[test]
    fn default_index_wins_without_reuse_avoidance() {
        assert_eq!(
            book().change_script(&profile(false)).unwrap(),
            Script::from("p2pk-a1")
        );
    }

    #[test]
    fn falls_back_to_lowest_index() {
        let mut book = StaticAddressBook::new();
        book.insert_wallet(
            WalletId::from("w1"),
            vec![WalletAddress {
                index: 4,
                script: Script::from("p2pk-a4"),
                used: true,
            }],
            None,
        );
        // All addresses used, no default configured.
        assert_eq!(
            book.change_script(&profile(true)).unwrap(),
            Script::from("p2pk-a4")
        );
    }

    #[test]
    fn unknown_wallet_is_an_error() {
        let book = StaticAddressBook::new();
        assert!(matches!(
            book.change_script(&profile(false)),
            Err(AddressPolicyError::UnknownWallet(_))
        ));
    }
}
