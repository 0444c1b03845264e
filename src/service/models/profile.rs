// Copyright (c) 2020-2023 MobileCoin Inc.

//! Wallet profile model: how a wallet signs and what construction
//! accommodations its signer needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display as EnumDisplay;

/// How many distinct asset types a hardware signer can render on its
/// screen for a single output.
const HARDWARE_MAX_CHANGE_ASSETS: usize = 1;

/// Asset-type ceiling per output for software and watch-only wallets,
/// matching the protocol's per-box limit.
const DEFAULT_MAX_CHANGE_ASSETS: usize = 100;

/// The kind of signer controlling a wallet.
#[derive(Clone, Copy, Debug, Deserialize, EnumDisplay, Eq, PartialEq, Serialize)]
pub enum SignerKind {
    /// Keys held in software on this device.
    Software,

    /// Keys held on an external hardware device with a constrained
    /// confirmation screen.
    Hardware,

    /// No keys at all; drafts are exported for signing elsewhere.
    WatchOnly,
}

impl SignerKind {
    /// Upper bound on distinct asset types packed into one change output.
    ///
    /// Hardware devices must display every asset they sign over, so their
    /// change is split into single-asset boxes.
    pub fn max_change_assets(&self) -> usize {
        match self {
            Self::Hardware => HARDWARE_MAX_CHANGE_ASSETS,
            Self::Software | Self::WatchOnly => DEFAULT_MAX_CHANGE_ASSETS,
        }
    }
}

/// Unique identifier of a wallet known to this service.
#[derive(
    Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct WalletId(pub String);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletId {
    fn from(src: &str) -> Self {
        Self(src.to_string())
    }
}

/// Construction-relevant facts about a wallet.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WalletProfile {
    pub wallet_id: WalletId,

    /// What signs for this wallet.
    pub signer: SignerKind,

    /// Whether change should go to a fresh address rather than a
    /// previously used one.
    #[serde(default)]
    pub avoid_address_reuse: bool,
}
