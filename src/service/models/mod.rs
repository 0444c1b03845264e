// Copyright (c) 2020-2023 MobileCoin Inc.

//! Data models passed between the wallet service and its callers.

pub mod profile;
pub mod tx_proposal;
pub mod unspent;
