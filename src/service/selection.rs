// Copyright (c) 2020-2023 MobileCoin Inc.

//! Input selection: choosing which unspent boxes fund a requirement.
//!
//! Selection is deterministic for a given snapshot of spendable outputs,
//! so rebuilding the same intent against the same chain state yields the
//! same draft.

use crate::service::models::{
    profile::SignerKind,
    unspent::{AssetId, BoxId, UnspentOutput},
};
use displaydoc::Display;
use std::collections::{BTreeMap, BTreeSet};

/// How inputs are chosen to meet a requirement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectionStrategy {
    /// Spend the oldest boxes first, consolidating the wallet over time.
    OldestFirst,

    /// Meet each asset requirement from the fewest boxes possible, for
    /// signers that must confirm every input on a small screen.
    CherryPick,
}

impl From<SignerKind> for SelectionStrategy {
    fn from(signer: SignerKind) -> Self {
        match signer {
            SignerKind::Hardware => Self::CherryPick,
            SignerKind::Software | SignerKind::WatchOnly => Self::OldestFirst,
        }
    }
}

/// What a selection must cover: native value plus per-asset amounts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Requirement {
    pub value: u64,
    pub assets: BTreeMap<AssetId, u64>,
}

impl Requirement {
    pub fn new(value: u64) -> Self {
        Self {
            value,
            assets: BTreeMap::new(),
        }
    }

    /// Adds an asset amount to the requirement, accumulating with any
    /// amount already required for the same asset.
    pub fn add_asset(&mut self, asset_id: AssetId, amount: u64) {
        if amount > 0 {
            *self.assets.entry(asset_id).or_insert(0) += amount;
        }
    }
}

/// Errors choosing inputs.
#[derive(Display, Debug, PartialEq, Eq)]
pub enum SelectionError {
    /// Wallet has no spendable outputs
    NoSpendableOutputs,

    /// Insufficient native funds: required {0}, spendable {1}
    InsufficientValue(u64, u128),

    /// Insufficient funds for asset {0}: required {1}, spendable {2}
    InsufficientAsset(AssetId, u64, u128),
}

struct Accumulator {
    value: u128,
    assets: BTreeMap<AssetId, u128>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            value: 0,
            assets: BTreeMap::new(),
        }
    }

    fn add(&mut self, output: &UnspentOutput) {
        self.value += output.value as u128;
        for token in &output.assets {
            *self.assets.entry(token.token_id.clone()).or_insert(0) += token.amount as u128;
        }
    }

    fn asset(&self, asset_id: &AssetId) -> u128 {
        self.assets.get(asset_id).copied().unwrap_or(0)
    }

    fn meets(&self, requirement: &Requirement) -> bool {
        self.value >= requirement.value as u128
            && requirement
                .assets
                .iter()
                .all(|(asset_id, amount)| self.asset(asset_id) >= *amount as u128)
    }

    /// Whether the output moves any unmet dimension of the requirement
    /// forward.
    fn contributes(&self, output: &UnspentOutput, requirement: &Requirement) -> bool {
        if self.value < requirement.value as u128 && output.value > 0 {
            return true;
        }
        requirement.assets.iter().any(|(asset_id, amount)| {
            self.asset(asset_id) < *amount as u128 && output.asset_amount(asset_id) > 0
        })
    }
}

/// Chooses boxes from `available` that together meet `requirement`.
///
/// The totals are checked first so a shortfall reports the full spendable
/// amount, not whatever a partial walk happened to accumulate.
pub fn select_boxes(
    available: &[UnspentOutput],
    requirement: &Requirement,
    strategy: SelectionStrategy,
) -> Result<Vec<UnspentOutput>, SelectionError> {
    if available.is_empty() {
        return Err(SelectionError::NoSpendableOutputs);
    }

    let mut totals = Accumulator::new();
    for output in available {
        totals.add(output);
    }
    for (asset_id, amount) in &requirement.assets {
        let have = totals.asset(asset_id);
        if have < *amount as u128 {
            return Err(SelectionError::InsufficientAsset(
                asset_id.clone(),
                *amount,
                have,
            ));
        }
    }
    if totals.value < requirement.value as u128 {
        return Err(SelectionError::InsufficientValue(
            requirement.value,
            totals.value,
        ));
    }

    let selected = match strategy {
        SelectionStrategy::OldestFirst => oldest_first(available, requirement),
        SelectionStrategy::CherryPick => cherry_pick(available, requirement),
    };
    tracing::debug!(
        inputs = selected.len(),
        required_value = requirement.value,
        ?strategy,
        "selected inputs"
    );
    Ok(selected)
}

fn oldest_first(available: &[UnspentOutput], requirement: &Requirement) -> Vec<UnspentOutput> {
    let mut ordered: Vec<&UnspentOutput> = available.iter().collect();
    ordered.sort_by(|a, b| {
        a.creation_height
            .cmp(&b.creation_height)
            .then_with(|| a.box_id.cmp(&b.box_id))
    });

    let mut acc = Accumulator::new();
    let mut selected = Vec::new();
    for output in ordered {
        if acc.meets(requirement) {
            break;
        }
        if acc.contributes(output, requirement) {
            acc.add(output);
            selected.push(output.clone());
        }
    }
    selected
}

fn cherry_pick(available: &[UnspentOutput], requirement: &Requirement) -> Vec<UnspentOutput> {
    let mut acc = Accumulator::new();
    let mut selected = Vec::new();
    let mut taken: BTreeSet<&BoxId> = BTreeSet::new();

    // Largest holding first per required asset, so each asset is met
    // from as few boxes as possible.
    for (asset_id, amount) in &requirement.assets {
        let mut holders: Vec<&UnspentOutput> = available
            .iter()
            .filter(|output| output.asset_amount(asset_id) > 0)
            .collect();
        holders.sort_by(|a, b| {
            b.asset_amount(asset_id)
                .cmp(&a.asset_amount(asset_id))
                .then_with(|| a.box_id.cmp(&b.box_id))
        });
        for output in holders {
            if acc.asset(asset_id) >= *amount as u128 {
                break;
            }
            if taken.insert(&output.box_id) {
                acc.add(output);
                selected.push(output.clone());
            }
        }
    }

    // Asset boxes usually carry native value too; top up oldest-first
    // only if they did not already cover it.
    if acc.value < requirement.value as u128 {
        let mut remaining: Vec<&UnspentOutput> = available
            .iter()
            .filter(|output| !taken.contains(&output.box_id))
            .collect();
        remaining.sort_by(|a, b| {
            a.creation_height
                .cmp(&b.creation_height)
                .then_with(|| a.box_id.cmp(&b.box_id))
        });
        for output in remaining {
            if acc.value >= requirement.value as u128 {
                break;
            }
            acc.add(output);
            selected.push(output.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_box, test_box_with_assets};
    use crate::service::models::unspent::TokenValue;

    #[test]
    fn oldest_first_takes_boxes_in_height_order() {
        let available = vec![
            test_box("b-new", 5_000, 50),
            test_box("b-old", 5_000, 10),
            test_box("b-mid", 5_000, 30),
        ];
        let selected =
            select_boxes(&available, &Requirement::new(8_000), SelectionStrategy::OldestFirst)
                .unwrap();
        let ids: Vec<&str> = selected.iter().map(|o| o.box_id.0.as_str()).collect();
        assert_eq!(ids, ["b-old", "b-mid"]);
    }

    #[test]
    fn oldest_first_breaks_height_ties_by_box_id() {
        let available = vec![test_box("b2", 5_000, 10), test_box("b1", 5_000, 10)];
        let selected =
            select_boxes(&available, &Requirement::new(1_000), SelectionStrategy::OldestFirst)
                .unwrap();
        assert_eq!(selected[0].box_id.0, "b1");
    }

    #[test]
    fn oldest_first_skips_boxes_that_cannot_help() {
        // Native already covered by the first box; the second box carries
        // no required asset so the walk must not pick it up.
        let available = vec![
            test_box("b1", 100_000, 10),
            test_box("b2", 100_000, 20),
            test_box_with_assets("b3", 1_000, 30, vec![TokenValue::new("tok-a", 9)]),
        ];
        let mut requirement = Requirement::new(50_000);
        requirement.add_asset("tok-a".into(), 5);
        let selected =
            select_boxes(&available, &requirement, SelectionStrategy::OldestFirst).unwrap();
        let ids: Vec<&str> = selected.iter().map(|o| o.box_id.0.as_str()).collect();
        assert_eq!(ids, ["b1", "b3"]);
    }

    #[test]
    fn cherry_pick_prefers_largest_asset_holdings() {
        let available = vec![
            test_box_with_assets("b1", 10_000, 10, vec![TokenValue::new("tok-a", 3)]),
            test_box_with_assets("b2", 10_000, 20, vec![TokenValue::new("tok-a", 50)]),
            test_box_with_assets("b3", 10_000, 30, vec![TokenValue::new("tok-a", 7)]),
        ];
        let mut requirement = Requirement::new(5_000);
        requirement.add_asset("tok-a".into(), 40);
        let selected =
            select_boxes(&available, &requirement, SelectionStrategy::CherryPick).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].box_id.0, "b2");
    }

    #[test]
    fn cherry_pick_tops_up_native_oldest_first() {
        let available = vec![
            test_box_with_assets("b-asset", 1_000, 40, vec![TokenValue::new("tok-a", 10)]),
            test_box("b-old", 20_000, 5),
            test_box("b-new", 20_000, 50),
        ];
        let mut requirement = Requirement::new(15_000);
        requirement.add_asset("tok-a".into(), 10);
        let selected =
            select_boxes(&available, &requirement, SelectionStrategy::CherryPick).unwrap();
        let ids: Vec<&str> = selected.iter().map(|o| o.box_id.0.as_str()).collect();
        assert_eq!(ids, ["b-asset", "b-old"]);
    }

    #[test]
    fn empty_wallet_is_its_own_error() {
        assert_eq!(
            select_boxes(&[], &Requirement::new(1), SelectionStrategy::OldestFirst),
            Err(SelectionError::NoSpendableOutputs)
        );
    }

    #[test]
    fn value_shortfall_reports_full_spendable_total() {
        let available = vec![test_box("b1", 3_000, 10), test_box("b2", 4_000, 11)];
        assert_eq!(
            select_boxes(&available, &Requirement::new(10_000), SelectionStrategy::OldestFirst),
            Err(SelectionError::InsufficientValue(10_000, 7_000))
        );
    }

    #[test]
    fn asset_shortfall_reported_before_value_shortfall() {
        let available =
            vec![test_box_with_assets("b1", 1_000, 10, vec![TokenValue::new("tok-a", 4)])];
        let mut requirement = Requirement::new(50_000);
        requirement.add_asset("tok-a".into(), 9);
        assert_eq!(
            select_boxes(&available, &requirement, SelectionStrategy::OldestFirst),
            Err(SelectionError::InsufficientAsset("tok-a".into(), 9, 4))
        );
    }

    #[test]
    fn strategy_follows_signer_kind() {
        assert_eq!(
            SelectionStrategy::from(SignerKind::Hardware),
            SelectionStrategy::CherryPick
        );
        assert_eq!(
            SelectionStrategy::from(SignerKind::Software),
            SelectionStrategy::OldestFirst
        );
    }
}
