// Copyright (c) 2020-2023 MobileCoin Inc.

//! Conversion between display amounts and protocol smallest units.
//!
//! Protocol amounts are always integers in smallest units. Decimal-scaled
//! values exist only at the display boundary, and the two directions round
//! differently: a user-entered display amount rounds *up* into smallest
//! units so the resulting transaction is never under-funded, while
//! formatting for display is exact.

use displaydoc::Display;

/// Errors converting display amounts.
#[derive(Display, Debug, PartialEq, Eq)]
pub enum AmountError {
    /// Could not parse amount string: {0}
    Malformed(String),

    /// Amount exceeds the representable range
    Overflow,
}

/// Parses a user-entered decimal amount into smallest units.
///
/// Digits beyond the asset's decimal scale round the result up by one
/// smallest unit, so a payment funded from the returned value always
/// covers the requested display amount.
pub fn display_to_units(display: &str, decimals: u32) -> Result<u64, AmountError> {
    let trimmed = display.trim();
    let malformed = || AmountError::Malformed(trimmed.to_string());

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| malformed())?
    };

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or(AmountError::Overflow)?;
    let mut units = int_value.checked_mul(scale).ok_or(AmountError::Overflow)?;

    let kept = &frac_part[..frac_part.len().min(decimals as usize)];
    if !kept.is_empty() {
        let frac_value: u128 = kept.parse().map_err(|_| malformed())?;
        let pad = 10u128
            .checked_pow(decimals - kept.len() as u32)
            .ok_or(AmountError::Overflow)?;
        units = units
            .checked_add(frac_value * pad)
            .ok_or(AmountError::Overflow)?;
    }

    // Round up when the entry is more precise than the asset allows.
    let dropped = &frac_part[frac_part.len().min(decimals as usize)..];
    if dropped.chars().any(|c| c != '0') {
        units = units.checked_add(1).ok_or(AmountError::Overflow)?;
    }

    u64::try_from(units).map_err(|_| AmountError::Overflow)
}

/// Formats smallest units as a display string, trimming trailing zeros.
pub fn units_to_display(units: u64, decimals: u32) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let scale = 10u128.pow(decimals);
    let units = units as u128;
    let int_part = units / scale;
    let frac_part = units % scale;
    if frac_part == 0 {
        return int_part.to_string();
    }
    let frac = format!("{frac_part:0width$}", width = decimals as usize);
    format!("{int_part}.{}", frac.trim_end_matches('0'))
}

/// Formats a signed smallest-unit amount, used for trade deltas.
pub fn signed_units_to_display(units: i128, decimals: u32) -> String {
    let magnitude = units.unsigned_abs().min(u64::MAX as u128) as u64;
    let body = units_to_display(magnitude, decimals);
    if units < 0 {
        format!("-{body}")
    } else {
        body
    }
}
