// Copyright (c) 2020-2023 MobileCoin Inc.

//! Service layer for building, cancelling, and interpreting
//! transactions, implemented for [`WalletService`].

use crate::{
    error::WalletTransactionBuilderError,
    service::{
        context::{AddressPolicy, ContextProvider, LiquidityProvider},
        fee::FeeSettings,
        interpreter::{interpret_output, AssetMetadataMap, DecodedOutput},
        models::{
            profile::WalletProfile,
            tx_proposal::TxProposal,
            unspent::{Script, TokenValue, UnspentOutput},
        },
        transaction_builder::{CancellationBuilder, WalletTransactionBuilder},
        WalletService,
    },
};
use async_trait::async_trait;
use displaydoc::Display;

/// Errors for [`TransactionService`].
#[derive(Display, Debug)]
pub enum TransactionServiceError {
    /// Transaction builder: {0}
    TransactionBuilder(WalletTransactionBuilderError),
}

impl From<WalletTransactionBuilderError> for TransactionServiceError {
    fn from(src: WalletTransactionBuilderError) -> Self {
        Self::TransactionBuilder(src)
    }
}

/// The transaction-construction surface of the wallet service.
#[async_trait]
pub trait TransactionService {
    /// Builds a payment of native value and assets to one recipient,
    /// with the fee charged per `fee`.
    async fn build_payment(
        &self,
        profile: &WalletProfile,
        recipient: Script,
        value: u64,
        assets: Vec<TokenValue>,
        fee: FeeSettings,
    ) -> Result<TxProposal, TransactionServiceError>;

    /// Builds the replacement draft that cancels `original` by
    /// re-spending its inputs at a strictly higher fee.
    async fn build_cancellation(
        &self,
        profile: &WalletProfile,
        original: &TxProposal,
    ) -> Result<TxProposal, TransactionServiceError>;

    /// Decodes an output for display given the inputs of the transaction
    /// that produced it.
    fn interpret_output(
        &self,
        output: &UnspentOutput,
        inputs: &[UnspentOutput],
        metadata: &AssetMetadataMap,
    ) -> DecodedOutput;
}

#[async_trait]
impl<C, L, A> TransactionService for WalletService<C, L, A>
where
    C: ContextProvider + 'static,
    L: LiquidityProvider + 'static,
    A: AddressPolicy + 'static,
{
    async fn build_payment(
        &self,
        profile: &WalletProfile,
        recipient: Script,
        value: u64,
        assets: Vec<TokenValue>,
        fee: FeeSettings,
    ) -> Result<TxProposal, TransactionServiceError> {
        let mut builder = WalletTransactionBuilder::new(
            self.context_provider.clone(),
            self.liquidity_provider.clone(),
            self.address_policy.clone(),
            self.config.clone(),
            profile.clone(),
        );
        builder.add_recipient(recipient, value, assets);
        builder.set_fee(fee);
        Ok(builder.build().await?)
    }

    async fn build_cancellation(
        &self,
        profile: &WalletProfile,
        original: &TxProposal,
    ) -> Result<TxProposal, TransactionServiceError> {
        let builder = CancellationBuilder::new(
            self.context_provider.clone(),
            self.address_policy.clone(),
            self.config.clone(),
            profile.clone(),
        );
        Ok(builder.build(original).await?)
    }

    fn interpret_output(
        &self,
        output: &UnspentOutput,
        inputs: &[UnspentOutput],
        metadata: &AssetMetadataMap,
    ) -> DecodedOutput {
        interpret_output(output, inputs, metadata, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::NetworkConfig,
        service::{
            context::ConnectivityError,
            models::profile::SignerKind,
            selection::SelectionError,
        },
        test_utils::{
            random_test_box, swap_config, swap_liquidity_box, test_address_book, test_profile,
            MemoryContextProvider, MemoryLiquidityProvider,
        },
    };
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::Arc;

    fn service(
        spendable: Vec<UnspentOutput>,
        swap_boxes: Vec<UnspentOutput>,
        config: NetworkConfig,
    ) -> WalletService<MemoryContextProvider, MemoryLiquidityProvider, crate::service::change::StaticAddressBook>
    {
        WalletService::new(
            Arc::new(MemoryContextProvider::new(200, spendable)),
            Arc::new(MemoryLiquidityProvider::with_boxes(swap_boxes)),
            Arc::new(test_address_book()),
            config,
        )
    }

    #[tokio::test]
    async fn payment_round_trips_through_the_service() {
        let mut rng = StdRng::seed_from_u64(7);
        let spendable: Vec<UnspentOutput> = (0..4u64)
            .map(|i| random_test_box(&mut rng, 50_000_000, 10 + i))
            .collect();
        let service = service(spendable, vec![], NetworkConfig::default());
        let profile = test_profile(SignerKind::Software);

        let proposal = service
            .build_payment(
                &profile,
                Script::from("p2pk-recipient"),
                30_000_000,
                vec![],
                FeeSettings::native(1_000_000),
            )
            .await
            .unwrap();
        assert_eq!(proposal.payload_outputs[0].value, 30_000_000);
        assert_eq!(proposal.verify_conservation(), Ok(()));
        assert_eq!(proposal.network_height, 200);
    }

    #[tokio::test]
    async fn depleted_wallet_surfaces_selection_error() {
        let service = service(vec![], vec![], NetworkConfig::default());
        let profile = test_profile(SignerKind::Software);
        let err = service
            .build_payment(
                &profile,
                Script::from("p2pk-recipient"),
                30_000_000,
                vec![],
                FeeSettings::native(1_000_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionServiceError::TransactionBuilder(
                WalletTransactionBuilderError::Selection(SelectionError::NoSpendableOutputs)
            )
        ));
    }

    #[tokio::test]
    async fn connectivity_failure_aborts_the_build() {
        let provider = MemoryContextProvider::new(200, vec![]).failing();
        let service = WalletService::new(
            Arc::new(provider),
            Arc::new(MemoryLiquidityProvider::default()),
            Arc::new(test_address_book()),
            NetworkConfig::default(),
        );
        let profile = test_profile(SignerKind::Software);
        let err = service
            .build_payment(
                &profile,
                Script::from("p2pk-recipient"),
                30_000_000,
                vec![],
                FeeSettings::native(1_000_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionServiceError::TransactionBuilder(
                WalletTransactionBuilderError::Connectivity(ConnectivityError::Unreachable(_))
            )
        ));
    }

    #[tokio::test]
    async fn interpretation_goes_through_network_config() {
        let config = swap_config();
        let service = service(vec![], vec![], config);
        let before = swap_liquidity_box("s-in", 1_000_000_000, "tkn", 100);
        let mut after = before.clone();
        after.value = 990_000_000;
        after.assets[0].amount = 101;

        let decoded =
            service.interpret_output(&after, &[before], &AssetMetadataMap::new());
        assert!(matches!(decoded, DecodedOutput::SwapSettlement { .. }));
    }
}
