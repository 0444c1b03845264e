// Copyright (c) 2020-2023 MobileCoin Inc.

//! Assembles balanced transaction drafts.
//!
//! [`WalletTransactionBuilder`] handles payments: context fetch, fee
//! resolution, input selection, change computation, and the final
//! balanced draft, attaching a swap-box extension when the fee is paid
//! in a non-native asset. [`CancellationBuilder`] builds the replacement
//! draft that re-spends a pending transaction's inputs at a higher fee.

use crate::{
    config::NetworkConfig,
    error::WalletTransactionBuilderError,
    service::{
        change::{partition_change, ChangeError},
        context::{fetch_build_context, AddressPolicy, ContextProvider, LiquidityProvider},
        fee::{apply_min_value_headroom, resolve_fee, FeeAsset, FeeSettings},
        models::{
            profile::WalletProfile,
            tx_proposal::{DraftOutput, OutputCandidate, TxProposal},
            unspent::{AssetId, Script, TokenValue, UnspentOutput},
        },
        selection::{select_boxes, Requirement, SelectionStrategy},
    },
};
use std::{collections::BTreeMap, sync::Arc};

/// Builds a payment draft for one wallet.
///
/// A builder is configured once with recipients and a fee preference,
/// then consumed by [`build`](Self::build). The draft under construction
/// is local to that call; nothing is shared or cached across builds.
pub struct WalletTransactionBuilder<C, L, A>
where
    C: ContextProvider,
    L: LiquidityProvider,
    A: AddressPolicy,
{
    context_provider: Arc<C>,
    liquidity_provider: Arc<L>,
    address_policy: Arc<A>,
    config: NetworkConfig,
    profile: WalletProfile,
    recipients: Vec<OutputCandidate>,
    fee: FeeSettings,
}

impl<C, L, A> WalletTransactionBuilder<C, L, A>
where
    C: ContextProvider,
    L: LiquidityProvider,
    A: AddressPolicy,
{
    pub fn new(
        context_provider: Arc<C>,
        liquidity_provider: Arc<L>,
        address_policy: Arc<A>,
        config: NetworkConfig,
        profile: WalletProfile,
    ) -> Self {
        let fee = FeeSettings::native(config.minimum_fee);
        Self {
            context_provider,
            liquidity_provider,
            address_policy,
            config,
            profile,
            recipients: Vec::new(),
            fee,
        }
    }

    pub fn add_recipient(&mut self, script: Script, value: u64, assets: Vec<TokenValue>) {
        self.recipients.push(OutputCandidate {
            script,
            value,
            assets,
        });
    }

    pub fn set_fee(&mut self, fee: FeeSettings) {
        self.fee = fee;
    }

    /// Runs the full construction pipeline and returns a balanced draft.
    pub async fn build(mut self) -> Result<TxProposal, WalletTransactionBuilderError> {
        if self.recipients.is_empty() {
            return Err(WalletTransactionBuilderError::NoRecipient);
        }

        let context =
            fetch_build_context(self.context_provider.as_ref(), &self.profile.wallet_id).await?;

        let gross_fee = resolve_fee(
            self.liquidity_provider.as_ref(),
            &mut self.fee,
            &self.config,
        )
        .await?;

        // The wallet's own native outlay. On the token-fee path the swap
        // box supplies the fee's native side, so the fee is not part of
        // the requirement; the fee tokens are.
        let payments_value = self.sum_payment_values()?;
        let mut requirement = Requirement::new(payments_value);
        let mut outgoing_assets: BTreeMap<AssetId, u64> = BTreeMap::new();
        for candidate in &self.recipients {
            for token in &candidate.assets {
                let entry = outgoing_assets.entry(token.token_id.clone()).or_insert(0);
                *entry = entry
                    .checked_add(token.amount)
                    .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
            }
        }

        let net_fee;
        let mut primary_value = self.recipients[0].value;
        match &self.fee.fee_asset {
            FeeAsset::Native => {
                for candidate in &self.recipients {
                    if candidate.value < self.config.minimum_box_value {
                        return Err(WalletTransactionBuilderError::OutputBelowMinimum(
                            candidate.value,
                            self.config.minimum_box_value,
                        ));
                    }
                }
                requirement.value = requirement
                    .value
                    .checked_add(gross_fee)
                    .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
                net_fee = gross_fee;
            }
            FeeAsset::Token(asset_id) => {
                // A dust primary payment rides on the fee's headroom
                // instead of forcing the payer to fund an extra bump.
                let (bumped, reduced_fee) =
                    apply_min_value_headroom(primary_value, gross_fee, &self.config)?;
                primary_value = bumped;
                net_fee = reduced_fee;
                for candidate in self.recipients.iter().skip(1) {
                    if candidate.value < self.config.minimum_box_value {
                        return Err(WalletTransactionBuilderError::OutputBelowMinimum(
                            candidate.value,
                            self.config.minimum_box_value,
                        ));
                    }
                }
                outgoing_assets
                    .entry(asset_id.clone())
                    .and_modify(|amount| *amount = amount.saturating_add(self.fee.amount))
                    .or_insert(self.fee.amount);
            }
        }
        for (asset_id, amount) in &outgoing_assets {
            requirement.add_asset(asset_id.clone(), *amount);
        }

        let spend_value = requirement.value;
        let strategy = SelectionStrategy::from(self.profile.signer);
        let change_script = self.address_policy.change_script(&self.profile)?;
        let max_assets = self.profile.signer.max_change_assets();

        let mut selected = select_boxes(&context.spendable, &requirement, strategy)?;
        let mut leftover_value = leftover_native(&selected, spend_value)?;
        let mut leftover_assets = leftover_asset_amounts(&selected, &outgoing_assets)?;

        let change_outputs = match partition_change(
            leftover_value,
            &leftover_assets,
            &change_script,
            max_assets,
            self.config.minimum_box_value,
            context.height,
        ) {
            Ok(outputs) => outputs,
            Err(ChangeError::UnderfundedChange(_, boxes, _)) => {
                // Widen the target once so change can be funded at the
                // minimum, then re-run selection against it.
                let widened = spend_value
                    .checked_add(boxes as u64 * self.config.minimum_box_value)
                    .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
                let mut retry = requirement.clone();
                retry.value = widened;
                selected = select_boxes(&context.spendable, &retry, strategy)?;
                leftover_value = leftover_native(&selected, spend_value)?;
                leftover_assets = leftover_asset_amounts(&selected, &outgoing_assets)?;
                partition_change(
                    leftover_value,
                    &leftover_assets,
                    &change_script,
                    max_assets,
                    self.config.minimum_box_value,
                    context.height,
                )?
            }
        };

        let mut payload_outputs = Vec::with_capacity(self.recipients.len());
        for (i, candidate) in self.recipients.iter().enumerate() {
            let value = if i == 0 { primary_value } else { candidate.value };
            payload_outputs.push(DraftOutput::new(
                candidate.script.clone(),
                value,
                candidate.assets.clone(),
                context.height,
            ));
        }

        let mut inputs = selected;
        let swap_output = match (&self.fee.fee_asset, &self.fee.swap_box) {
            (FeeAsset::Token(asset_id), Some(swap)) => {
                let output = swap_continuation(swap.output.clone(), asset_id, self.fee.amount, gross_fee, context.height)?;
                inputs.push(swap.output.clone());
                Some(output)
            }
            _ => None,
        };

        let fee_output = DraftOutput::new(
            self.config.fee_script.clone(),
            net_fee,
            Vec::new(),
            context.height,
        );

        let proposal = TxProposal {
            inputs,
            payload_outputs,
            swap_output,
            change_outputs,
            fee_output,
            network_height: context.height,
        };
        proposal
            .verify_conservation()
            .map_err(WalletTransactionBuilderError::ConservationViolation)?;
        tracing::info!(
            inputs = proposal.inputs.len(),
            outputs = proposal.outputs().len(),
            fee = proposal.fee_value(),
            height = proposal.network_height,
            "assembled payment draft"
        );
        Ok(proposal)
    }

    fn sum_payment_values(&self) -> Result<u64, WalletTransactionBuilderError> {
        self.recipients
            .iter()
            .try_fold(0u64, |acc, candidate| acc.checked_add(candidate.value))
            .ok_or(WalletTransactionBuilderError::ValueOverflow)
    }
}

/// Builds the continuation output of a consumed swap box: native reserve
/// down by the gross fee, traded-asset balance up by the fee amount,
/// script and registers carried over unchanged.
fn swap_continuation(
    swap_input: UnspentOutput,
    asset_id: &AssetId,
    fee_asset_amount: u64,
    gross_fee: u64,
    creation_height: u64,
) -> Result<DraftOutput, WalletTransactionBuilderError> {
    let value = swap_input
        .value
        .checked_sub(gross_fee)
        .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
    let mut assets = swap_input.assets.clone();
    match assets.iter_mut().find(|token| &token.token_id == asset_id) {
        Some(token) => {
            token.amount = token
                .amount
                .checked_add(fee_asset_amount)
                .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
        }
        None => assets.push(TokenValue::new(asset_id.clone(), fee_asset_amount)),
    }
    let mut output = DraftOutput::new(swap_input.script, value, assets, creation_height);
    output.registers = swap_input.registers;
    Ok(output)
}

fn leftover_native(
    selected: &[UnspentOutput],
    spend_value: u64,
) -> Result<u64, WalletTransactionBuilderError> {
    let total: u128 = selected.iter().map(|output| output.value as u128).sum();
    let leftover = total
        .checked_sub(spend_value as u128)
        .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
    u64::try_from(leftover).map_err(|_| WalletTransactionBuilderError::ValueOverflow)
}

fn leftover_asset_amounts(
    selected: &[UnspentOutput],
    outgoing: &BTreeMap<AssetId, u64>,
) -> Result<BTreeMap<AssetId, u64>, WalletTransactionBuilderError> {
    let mut totals: BTreeMap<AssetId, u64> = BTreeMap::new();
    for output in selected {
        for token in &output.assets {
            let entry = totals.entry(token.token_id.clone()).or_insert(0);
            *entry = entry
                .checked_add(token.amount)
                .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
        }
    }
    for (asset_id, amount) in outgoing {
        let held = totals.entry(asset_id.clone()).or_insert(0);
        *held = held
            .checked_sub(*amount)
            .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
    }
    totals.retain(|_, amount| *amount > 0);
    Ok(totals)
}

/// Builds the replacement draft that cancels a pending transaction.
///
/// The original transaction's wallet-owned inputs are pinned into the
/// replacement regardless of what selection would choose, the fee is
/// raised by one increment over the original, and everything else
/// returns to the wallet's change address. A swap box consumed by the
/// original is not wallet property and is never pinned.
pub struct CancellationBuilder<C, A>
where
    C: ContextProvider,
    A: AddressPolicy,
{
    context_provider: Arc<C>,
    address_policy: Arc<A>,
    config: NetworkConfig,
    profile: WalletProfile,
}

impl<C, A> CancellationBuilder<C, A>
where
    C: ContextProvider,
    A: AddressPolicy,
{
    pub fn new(
        context_provider: Arc<C>,
        address_policy: Arc<A>,
        config: NetworkConfig,
        profile: WalletProfile,
    ) -> Self {
        Self {
            context_provider,
            address_policy,
            config,
            profile,
        }
    }

    pub async fn build(
        &self,
        original: &TxProposal,
    ) -> Result<TxProposal, WalletTransactionBuilderError> {
        let context =
            fetch_build_context(self.context_provider.as_ref(), &self.profile.wallet_id).await?;
        let owned = self
            .address_policy
            .owned_scripts(&self.profile.wallet_id)?;

        let mut pinned = Vec::new();
        for input in &original.inputs {
            if self.config.is_swap_script(&input.script) {
                continue;
            }
            if !owned.contains(&input.script) {
                return Err(WalletTransactionBuilderError::ForeignInput(
                    input.box_id.clone(),
                ));
            }
            pinned.push(input.clone());
        }

        let new_fee = original
            .fee_value()
            .checked_add(self.config.fee_increment)
            .ok_or(WalletTransactionBuilderError::ValueOverflow)?;

        let change_script = self.address_policy.change_script(&self.profile)?;
        let max_assets = self.profile.signer.max_change_assets();
        let strategy = SelectionStrategy::from(self.profile.signer);

        // Boxes still spendable and not already pinned, excluding any
        // stray liquidity boxes the context reports.
        let pinned_ids: Vec<_> = pinned.iter().map(|input| input.box_id.clone()).collect();
        let available: Vec<UnspentOutput> = context
            .spendable
            .iter()
            .filter(|output| {
                !pinned_ids.contains(&output.box_id)
                    && !self.config.is_swap_script(&output.script)
            })
            .cloned()
            .collect();

        let build_attempt = |extra_target: u64| -> Result<
            (Vec<UnspentOutput>, u64, BTreeMap<AssetId, u64>),
            WalletTransactionBuilderError,
        > {
            let pinned_value: u128 = pinned.iter().map(|input| input.value as u128).sum();
            let mut inputs = pinned.clone();
            let target = new_fee
                .checked_add(extra_target)
                .ok_or(WalletTransactionBuilderError::ValueOverflow)?;
            if pinned_value < target as u128 {
                let deficit = u64::try_from(target as u128 - pinned_value)
                    .map_err(|_| WalletTransactionBuilderError::ValueOverflow)?;
                let extra = select_boxes(&available, &Requirement::new(deficit), strategy)?;
                inputs.extend(extra);
            }
            let leftover_value = leftover_native(&inputs, new_fee)?;
            let leftover_assets = leftover_asset_amounts(&inputs, &BTreeMap::new())?;
            Ok((inputs, leftover_value, leftover_assets))
        };

        let (mut inputs, mut leftover_value, mut leftover_assets) = build_attempt(0)?;
        let change_outputs = match partition_change(
            leftover_value,
            &leftover_assets,
            &change_script,
            max_assets,
            self.config.minimum_box_value,
            context.height,
        ) {
            Ok(outputs) => outputs,
            Err(ChangeError::UnderfundedChange(_, boxes, _)) => {
                let widened = boxes as u64 * self.config.minimum_box_value;
                (inputs, leftover_value, leftover_assets) = build_attempt(widened)?;
                partition_change(
                    leftover_value,
                    &leftover_assets,
                    &change_script,
                    max_assets,
                    self.config.minimum_box_value,
                    context.height,
                )?
            }
        };

        let proposal = TxProposal {
            inputs,
            payload_outputs: Vec::new(),
            swap_output: None,
            change_outputs,
            fee_output: DraftOutput::new(
                self.config.fee_script.clone(),
                new_fee,
                Vec::new(),
                context.height,
            ),
            network_height: context.height,
        };
        proposal
            .verify_conservation()
            .map_err(WalletTransactionBuilderError::ConservationViolation)?;
        tracing::info!(
            inputs = proposal.inputs.len(),
            fee = new_fee,
            original_fee = original.fee_value(),
            "assembled cancellation draft"
        );
        Ok(proposal)
    }
}
