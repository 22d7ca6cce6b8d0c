//! Utility functions for amounts and wallets.
//!
//! This module provides helper functions for:
//! - Random amount draws
//! - Wei/ETH formatting
//! - Throwaway recipient generation

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use alloy_primitives::utils::{format_units, parse_units};
use rand::Rng;

use crate::{
    config::AmountRange,
    error::{Result, WalletError},
};

/// Draws a uniform amount in `[range.min, range.max]` at `range.decimals` precision.
///
/// The draw happens in integer units of `10^-decimals` ETH held as `U256`, so
/// large bounds never saturate.
///
/// # Returns
/// * The decimal string with exactly `range.decimals` fractional digits, and its wei value
pub fn random_amount<R: Rng + ?Sized>(rng: &mut R, range: &AmountRange) -> Result<(String, U256)> {
    if range.decimals > 18 {
        return Err(WalletError::InvalidConfig(format!(
            "amount precision {} exceeds 18 decimals",
            range.decimals
        )));
    }
    let unit = U256::from(10u64).pow(U256::from(18 - range.decimals));
    let min_wei = parse_ether(&range.min.to_string())?;
    let max_wei = parse_ether(&range.max.to_string())?;

    let low = (min_wei + unit - U256::from(1u64)) / unit;
    let high = max_wei / unit;
    if low > high {
        return Err(WalletError::InvalidConfig(format!(
            "no amount with {} decimals in [{}, {}]",
            range.decimals, range.min, range.max
        )));
    }
    let span = u128::try_from(high - low).map_err(|_| {
        WalletError::InvalidConfig(format!("amount range [{}, {}] is too wide", range.min, range.max))
    })?;

    let units = low + U256::from(rng.random_range(0..=span));
    Ok((format_fixed(units, range.decimals), units * unit))
}

/// Renders `units` of `10^-decimals` with exactly `decimals` fractional digits.
fn format_fixed(units: U256, decimals: u32) -> String {
    let digits = units.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    format!("{}.{}", whole, fraction)
}

/// Parses a decimal ETH string into wei.
pub fn parse_ether(amount: &str) -> Result<U256> {
    parse_units(amount, "ether")
        .map(Into::into)
        .map_err(|e| WalletError::InvalidConfig(format!("invalid ETH amount '{}': {}", amount, e)))
}

/// Formats wei as an ETH decimal string.
pub fn format_eth(wei: U256) -> String {
    format_units(wei, "ether").unwrap_or_else(|_| wei.to_string())
}

/// A fresh address nobody holds the key to after this call returns.
pub fn random_address() -> Address {
    PrivateKeySigner::random().address()
}
