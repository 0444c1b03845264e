// Copyright (c) 2020-2023 MobileCoin Inc.

//! Errors for the wallet transaction builders.

use crate::{
    service::{
        change::ChangeError,
        context::{AddressPolicyError, ConnectivityError},
        fee::FeeResolverError,
        models::unspent::BoxId,
        selection::SelectionError,
        transaction::TransactionServiceError,
    },
    util::amount::AmountError,
};
use displaydoc::Display;

/// Top-level error for callers composing the wallet service surfaces.
#[derive(Display, Debug)]
pub enum WalletServiceError {
    /// Transaction service: {0}
    Transaction(TransactionServiceError),

    /// Amount conversion: {0}
    Amount(AmountError),
}

impl From<TransactionServiceError> for WalletServiceError {
    fn from(src: TransactionServiceError) -> Self {
        Self::Transaction(src)
    }
}

impl From<AmountError> for WalletServiceError {
    fn from(src: AmountError) -> Self {
        Self::Amount(src)
    }
}

/// Anything that can go wrong constructing a transaction draft.
///
/// Every variant is fatal to the build that produced it; nothing is
/// retried internally and no partial draft is ever returned.
#[derive(Display, Debug)]
pub enum WalletTransactionBuilderError {
    /// No recipient outputs were added to the builder
    NoRecipient,

    /// Input selection: {0}
    Selection(SelectionError),

    /// Fee resolution: {0}
    FeeResolver(FeeResolverError),

    /// Change computation: {0}
    Change(ChangeError),

    /// Connectivity: {0}
    Connectivity(ConnectivityError),

    /// Address policy: {0}
    AddressPolicy(AddressPolicyError),

    /// Payment output value {0} is below the minimum box value {1}
    OutputBelowMinimum(u64, u64),

    /// Input {0} is not owned by this wallet
    ForeignInput(BoxId),

    /// Conservation check failed, this is a defect: {0}
    ConservationViolation(String),

    /// Value overflow while assembling the draft
    ValueOverflow,
}

impl From<SelectionError> for WalletTransactionBuilderError {
    fn from(src: SelectionError) -> Self {
        Self::Selection(src)
    }
}

impl From<FeeResolverError> for WalletTransactionBuilderError {
    fn from(src: FeeResolverError) -> Self {
        Self::FeeResolver(src)
    }
}

impl From<ChangeError> for WalletTransactionBuilderError {
    fn from(src: ChangeError) -> Self {
        Self::Change(src)
    }
}

impl From<ConnectivityError> for WalletTransactionBuilderError {
    fn from(src: ConnectivityError) -> Self {
        Self::Connectivity(src)
    }
}

impl From<AddressPolicyError> for WalletTransactionBuilderError {
    fn from(src: AddressPolicyError) -> Self {
        Self::AddressPolicy(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_cause_chain() {
        let err: WalletServiceError = TransactionServiceError::TransactionBuilder(
            WalletTransactionBuilderError::Selection(SelectionError::InsufficientValue(
                10_000, 7_000,
            )),
        )
        .into();
        assert_eq!(
            err.to_string(),
            "Transaction service: Transaction builder: Input selection: \
             Insufficient native funds: required 10000, spendable 7000"
        );

        let err: WalletServiceError = AmountError::Overflow.into();
        assert!(err.to_string().contains("Amount conversion"));
    }
}
