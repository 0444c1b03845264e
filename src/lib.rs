// Copyright (c) 2020-2023 MobileCoin Inc.

//! Transaction-construction engine for a UTXO-model wallet.
//!
//! Turns a spending intent (recipient, assets, fee preference) into a
//! fully-formed, balanced, signable transaction draft, and decodes existing
//! outputs back into human-meaningful asset lists for display. Fetching
//! chain state, resolving liquidity boxes, and producing signatures are the
//! business of external collaborators reached through the traits in
//! [`service::context`].

pub mod config;
pub mod error;
pub mod service;
pub mod util;

pub use config::NetworkConfig;
pub use service::WalletService;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
