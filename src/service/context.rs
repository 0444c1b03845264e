// Copyright (c) 2020-2023 MobileCoin Inc.

//! Collaborator traits through which the service reaches chain state,
//! liquidity, and the wallet's address book, plus the snapshot of chain
//! context every build starts from.

use crate::service::models::{
    profile::{WalletId, WalletProfile},
    unspent::{AssetId, Script, UnspentOutput},
};
use async_trait::async_trait;
use displaydoc::Display;

/// Errors reaching an external context source.
#[derive(Display, Debug)]
pub enum ConnectivityError {
    /// Could not reach context source: {0}
    Unreachable(String),

    /// Context source returned invalid data: {0}
    InvalidResponse(String),
}

/// Errors resolving wallet addresses.
#[derive(Display, Debug)]
pub enum AddressPolicyError {
    /// Unknown wallet: {0}
    UnknownWallet(WalletId),

    /// Wallet {0} has no addresses to receive change
    NoChangeAddress(WalletId),
}

/// Source of chain state: current height and the wallet's spendable
/// outputs.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn get_height(&self) -> Result<u64, ConnectivityError>;

    /// Unspent outputs the wallet controls, excluding any already
    /// committed to pending transactions.
    async fn get_spendable_outputs(
        &self,
        wallet_id: &WalletId,
    ) -> Result<Vec<UnspentOutput>, ConnectivityError>;
}

/// Source of on-chain liquidity boxes selling native value for a given
/// asset.
#[async_trait]
pub trait LiquidityProvider: Send + Sync {
    /// All live swap boxes accepting the given asset as payment.
    async fn find_swap_boxes(
        &self,
        asset_id: &AssetId,
    ) -> Result<Vec<UnspentOutput>, ConnectivityError>;
}

/// The wallet's view of its own addresses.
pub trait AddressPolicy: Send + Sync {
    /// The script change should pay to, honoring the wallet's reuse
    /// preference.
    fn change_script(&self, profile: &WalletProfile) -> Result<Script, AddressPolicyError>;

    /// Every script the wallet can sign for. Used to decide whether an
    /// input belongs to the wallet.
    fn owned_scripts(&self, wallet_id: &WalletId) -> Result<Vec<Script>, AddressPolicyError>;
}

/// Chain context captured once at the start of a build so every stage
/// sees the same snapshot.
#[derive(Clone, Debug)]
pub struct BuildContext {
    pub height: u64,
    pub spendable: Vec<UnspentOutput>,
}

/// Fetches height and spendable outputs concurrently.
pub async fn fetch_build_context<C: ContextProvider + ?Sized>(
    provider: &C,
    wallet_id: &WalletId,
) -> Result<BuildContext, ConnectivityError> {
    let (height, spendable) = futures::try_join!(
        provider.get_height(),
        provider.get_spendable_outputs(wallet_id)
    )?;
    tracing::debug!(height, outputs = spendable.len(), %wallet_id, "fetched build context");
    Ok(BuildContext { height, spendable })
}
