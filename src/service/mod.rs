// Copyright (c) 2020-2023 MobileCoin Inc.

//! The wallet service and its construction pipeline.

pub mod change;
pub mod context;
pub mod fee;
pub mod interpreter;
pub mod models;
pub mod selection;
pub mod transaction;
pub mod transaction_builder;

use crate::config::NetworkConfig;
use std::sync::Arc;

/// Container holding the collaborators the service surfaces are
/// implemented against. Each build call receives explicit wallet context;
/// the service itself holds no per-wallet state.
pub struct WalletService<C, L, A> {
    /// Source of chain height and spendable outputs.
    pub context_provider: Arc<C>,

    /// Source of liquidity boxes for non-native fees.
    pub liquidity_provider: Arc<L>,

    /// The wallet's view of its own addresses.
    pub address_policy: Arc<A>,

    /// Network parameters.
    pub config: NetworkConfig,
}

impl<C, L, A> WalletService<C, L, A> {
    pub fn new(
        context_provider: Arc<C>,
        liquidity_provider: Arc<L>,
        address_policy: Arc<A>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            context_provider,
            liquidity_provider,
            address_policy,
            config,
        }
    }
}
