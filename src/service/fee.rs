// Copyright (c) 2020-2023 MobileCoin Inc.

//! Fee resolution: turning a fee preference into an exact native-unit fee,
//! attaching a liquidity box when the fee is paid in a non-native asset.

use crate::{
    config::NetworkConfig,
    service::{
        context::{ConnectivityError, LiquidityProvider},
        models::unspent::{AssetId, UnspentOutput},
    },
};
use displaydoc::Display;

/// Which asset the caller wants the fee charged in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FeeAsset {
    Native,
    Token(AssetId),
}

/// The caller's fee preference, plus the liquidity box bound to it once
/// resolution succeeds.
#[derive(Clone, Debug)]
pub struct FeeSettings {
    pub fee_asset: FeeAsset,

    /// Fee amount in smallest units of `fee_asset`.
    pub amount: u64,

    /// Lowest acceptable rate (native units per fee-asset unit) when
    /// shopping for a swap box. Ignored for native fees.
    pub min_rate: Option<u64>,

    /// The liquidity box chosen by resolution. Written exactly once, by
    /// [`resolve_fee`], and consumed by the assembler.
    pub swap_box: Option<SwapBox>,
}

impl FeeSettings {
    pub fn native(amount: u64) -> Self {
        Self {
            fee_asset: FeeAsset::Native,
            amount,
            min_rate: None,
            swap_box: None,
        }
    }

    pub fn token(asset_id: impl Into<AssetId>, amount: u64, min_rate: Option<u64>) -> Self {
        Self {
            fee_asset: FeeAsset::Token(asset_id.into()),
            amount,
            min_rate,
            swap_box: None,
        }
    }
}

/// A liquidity box selling native value for one asset, wrapped with the
/// asset it trades so rate math does not re-derive it.
#[derive(Clone, Debug)]
pub struct SwapBox {
    pub output: UnspentOutput,
    pub asset_id: AssetId,
}

impl SwapBox {
    /// Wraps an output as a swap box if its script is a known swap
    /// template and it holds a reserve in the traded asset.
    pub fn from_output(
        output: UnspentOutput,
        asset_id: AssetId,
        config: &NetworkConfig,
    ) -> Option<Self> {
        if !config.is_swap_script(&output.script) {
            return None;
        }
        if output.asset_amount(&asset_id) == 0 {
            return None;
        }
        Some(Self { output, asset_id })
    }

    /// Native units offered per one unit of the traded asset, derived
    /// from the box's reserves. Integer division, rounding toward the
    /// box's favor.
    pub fn rate(&self) -> u64 {
        let reserve = self.output.asset_amount(&self.asset_id);
        // from_output guarantees a nonzero reserve.
        self.output.value / reserve.max(1)
    }

    /// Whether the box can pay out `native_amount` and still leave its
    /// continuation output above the protocol minimum.
    pub fn can_cover(&self, native_amount: u64, minimum_box_value: u64) -> bool {
        self.output
            .value
            .checked_sub(native_amount)
            .map(|rest| rest >= minimum_box_value)
            .unwrap_or(false)
    }
}

/// Errors resolving a fee.
#[derive(Display, Debug)]
pub enum FeeResolverError {
    /// No qualifying swap box for asset {0}
    NoQualifyingSwapBox(AssetId),

    /// Net fee {0} would fall below the network minimum {1}
    BelowMinimumFee(u64, u64),

    /// Fee amount overflows native units
    FeeOverflow,

    /// Connectivity: {0}
    Connectivity(ConnectivityError),
}

impl From<ConnectivityError> for FeeResolverError {
    fn from(src: ConnectivityError) -> Self {
        Self::Connectivity(src)
    }
}

/// Resolves the native-unit fee for the given settings.
///
/// For a native fee this is the configured amount unchanged. For a
/// token fee, shops the liquidity source for the best-rate swap box with
/// enough native reserve, binds it into `settings`, and returns the
/// gross native amount the box will pay out. A failed lookup is fatal to
/// the build; there is no retry here.
pub async fn resolve_fee<L: LiquidityProvider + ?Sized>(
    liquidity: &L,
    settings: &mut FeeSettings,
    config: &NetworkConfig,
) -> Result<u64, FeeResolverError> {
    let asset_id = match &settings.fee_asset {
        FeeAsset::Native => return Ok(settings.amount),
        FeeAsset::Token(asset_id) => asset_id.clone(),
    };

    let candidates = liquidity.find_swap_boxes(&asset_id).await?;
    let mut best: Option<(u64, SwapBox)> = None;
    for output in candidates {
        let swap = match SwapBox::from_output(output, asset_id.clone(), config) {
            Some(swap) => swap,
            None => continue,
        };
        let rate = swap.rate();
        if let Some(min_rate) = settings.min_rate {
            if rate < min_rate {
                continue;
            }
        }
        let native = match settings.amount.checked_mul(rate) {
            Some(native) => native,
            None => return Err(FeeResolverError::FeeOverflow),
        };
        if !swap.can_cover(native, config.minimum_box_value) {
            continue;
        }
        let better = match &best {
            None => true,
            Some((best_rate, best_swap)) => {
                rate > *best_rate
                    || (rate == *best_rate && swap.output.box_id < best_swap.output.box_id)
            }
        };
        if better {
            best = Some((rate, swap));
        }
    }

    let (rate, swap) = best.ok_or(FeeResolverError::NoQualifyingSwapBox(asset_id))?;
    // can_cover already vetted this product.
    let native_fee = settings.amount.checked_mul(rate).ok_or(FeeResolverError::FeeOverflow)?;
    tracing::debug!(
        swap_box = %swap.output.box_id,
        rate,
        native_fee,
        "bound swap box for token fee"
    );
    settings.swap_box = Some(swap);
    Ok(native_fee)
}

/// Bumps a dust payment up to the minimum box value at the fee's expense.
///
/// Applies only on the token-fee path, where the swap box supplies the
/// native side of the fee and so leaves headroom to redirect. Returns the
/// adjusted `(payment_value, native_fee)` pair, or fails if the net fee
/// would no longer be relayed.
pub fn apply_min_value_headroom(
    payment_value: u64,
    native_fee: u64,
    config: &NetworkConfig,
) -> Result<(u64, u64), FeeResolverError> {
    if payment_value >= config.minimum_box_value {
        return Ok((payment_value, native_fee));
    }
    let bump = config.minimum_box_value - payment_value;
    let net_fee = native_fee.saturating_sub(bump);
    if net_fee < config.minimum_fee {
        return Err(FeeResolverError::BelowMinimumFee(net_fee, config.minimum_fee));
    }
    tracing::debug!(bump, net_fee, "bumped dust payment to minimum box value");
    Ok((config.minimum_box_value, net_fee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{swap_config, swap_liquidity_box, MemoryLiquidityProvider};

    #[tokio::test]
    async fn native_fee_resolves_to_itself() {
        let liquidity = MemoryLiquidityProvider::default();
        let mut settings = FeeSettings::native(1_000_000);
        let config = NetworkConfig::default();
        let fee = resolve_fee(&liquidity, &mut settings, &config).await.unwrap();
        assert_eq!(fee, 1_000_000);
        assert!(settings.swap_box.is_none());
    }

    #[tokio::test]
    async fn token_fee_binds_best_rate_box() {
        let config = swap_config();
        let liquidity = MemoryLiquidityProvider::with_boxes(vec![
            // rate 10_000_000 per token
            swap_liquidity_box("s-good", 1_000_000_000, "tkn", 100),
            // rate 5_000_000 per token
            swap_liquidity_box("s-poor", 1_000_000_000, "tkn", 200),
        ]);
        let mut settings = FeeSettings::token("tkn", 1, None);
        let fee = resolve_fee(&liquidity, &mut settings, &config).await.unwrap();
        assert_eq!(fee, 10_000_000);
        let bound = settings.swap_box.unwrap();
        assert_eq!(bound.output.box_id.0, "s-good");
    }

    #[tokio::test]
    async fn rate_ties_break_on_box_id() {
        let config = swap_config();
        let liquidity = MemoryLiquidityProvider::with_boxes(vec![
            swap_liquidity_box("s-b", 1_000_000_000, "tkn", 100),
            swap_liquidity_box("s-a", 1_000_000_000, "tkn", 100),
        ]);
        let mut settings = FeeSettings::token("tkn", 1, None);
        resolve_fee(&liquidity, &mut settings, &config).await.unwrap();
        assert_eq!(settings.swap_box.unwrap().output.box_id.0, "s-a");
    }

    #[tokio::test]
    async fn min_rate_filters_candidates() {
        let config = swap_config();
        let liquidity = MemoryLiquidityProvider::with_boxes(vec![swap_liquidity_box(
            "s-poor",
            1_000_000_000,
            "tkn",
            200,
        )]);
        let mut settings = FeeSettings::token("tkn", 1, Some(10_000_000));
        let err = resolve_fee(&liquidity, &mut settings, &config).await.unwrap_err();
        assert!(matches!(err, FeeResolverError::NoQualifyingSwapBox(_)));
    }

    #[tokio::test]
    async fn reserve_must_survive_the_trade() {
        let config = swap_config();
        // rate 10_015_000; paying out the full 20_030_000 would empty
        // the box below the 100_000 minimum.
        let liquidity = MemoryLiquidityProvider::with_boxes(vec![swap_liquidity_box(
            "s-thin",
            20_030_000,
            "tkn",
            2,
        )]);
        let mut settings = FeeSettings::token("tkn", 2, None);
        let err = resolve_fee(&liquidity, &mut settings, &config).await.unwrap_err();
        assert!(matches!(err, FeeResolverError::NoQualifyingSwapBox(_)));
    }

    #[tokio::test]
    async fn non_swap_scripts_are_ignored() {
        let config = swap_config();
        let mut plain = swap_liquidity_box("s-fake", 1_000_000_000, "tkn", 100);
        plain.script = "p2pk-somebody".into();
        let liquidity = MemoryLiquidityProvider::with_boxes(vec![plain]);
        let mut settings = FeeSettings::token("tkn", 1, None);
        let err = resolve_fee(&liquidity, &mut settings, &config).await.unwrap_err();
        assert!(matches!(err, FeeResolverError::NoQualifyingSwapBox(_)));
    }

    #[test]
    fn headroom_bump_moves_value_from_fee_to_payment() {
        let config = NetworkConfig::default();
        let (payment, fee) = apply_min_value_headroom(20_000, 10_000_000, &config).unwrap();
        assert_eq!(payment, 100_000);
        assert_eq!(fee, 9_920_000);
    }

    #[test]
    fn headroom_bump_is_noop_above_minimum() {
        let config = NetworkConfig::default();
        let (payment, fee) = apply_min_value_headroom(200_000, 10_000_000, &config).unwrap();
        assert_eq!((payment, fee), (200_000, 10_000_000));
    }

    #[test]
    fn insufficient_headroom_is_fatal() {
        let config = NetworkConfig::default();
        // Bump of 80_000 would drop a 1_040_000 fee to 960_000, below
        // the 1_000_000 network minimum.
        let err = apply_min_value_headroom(20_000, 1_040_000, &config).unwrap_err();
        assert!(matches!(err, FeeResolverError::BelowMinimumFee(960_000, 1_000_000)));
    }
}
