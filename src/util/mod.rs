// Copyright (c) 2020-2023 MobileCoin Inc.

//! Utilities shared across the wallet service.

pub mod amount;
