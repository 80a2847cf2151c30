//! HBAR exchange-rate arithmetic
//!
//! ```text
//! X USD    100 CENT         1 HBAR            CENT
//! ------ * -------- * ------------------- = -------
//! 1 HBAR    1 USD     100,000,000 TINYBAR   TINYBAR
//! ```
//!
//! and then invert to get tinybar per cent.

use num_bigint::BigUint;
use num_traits::FromPrimitive;

use crate::errors::RateError;

pub const CENT_PER_USD: f64 = 100.0;
pub const TINYBAR_PER_HBAR: u64 = 100_000_000;

/// Exchange rate the escrow contract is constructed with
pub const DEFAULT_TINYBAR_PER_CENT: u64 = 17_523_291;

/// Allowance added to every purchase payment (0.5 HBAR)
pub const PURCHASE_PADDING_TINYBAR: u64 = 50_000_000;

/// Convert a USD/HBAR quote into tinybar per cent.
///
/// A missing quote, a non-positive or non-finite quote, or a rate that
/// truncates to zero is reported as [`RateError::PriceUnavailable`].
pub fn tinybar_per_cent(usd_per_hbar: Option<f64>) -> Result<BigUint, RateError> {
    let usd_per_hbar = usd_per_hbar.ok_or(RateError::PriceUnavailable)?;
    if !usd_per_hbar.is_finite() || usd_per_hbar <= 0.0 {
        return Err(RateError::PriceUnavailable);
    }

    let cent_per_hbar = usd_per_hbar * CENT_PER_USD;
    let cent_per_tinybar = cent_per_hbar / TINYBAR_PER_HBAR as f64;
    if cent_per_tinybar <= 0.0 {
        return Err(RateError::PriceUnavailable);
    }

    let inverted = (1.0 / cent_per_tinybar).trunc();
    if !inverted.is_finite() || inverted < 1.0 {
        return Err(RateError::PriceUnavailable);
    }

    BigUint::from_f64(inverted).ok_or(RateError::PriceUnavailable)
}

/// Settlement amount in tinybar for a price in cents
pub fn cents_to_tinybar(price_in_cents: &BigUint, tinybar_per_cent: &BigUint) -> BigUint {
    price_in_cents * tinybar_per_cent
}

/// Payment submitted with a purchase: the settlement amount plus padding
pub fn padded_payment(price_in_tinybar: &BigUint) -> BigUint {
    price_in_tinybar + BigUint::from(PURCHASE_PADDING_TINYBAR)
}

/// Narrow a tinybar amount to the ledger's signed 64-bit field
pub fn tinybar_to_i64(amount: &BigUint) -> Result<i64, RateError> {
    i64::try_from(amount).map_err(|_| RateError::AmountOverflow(amount.to_string()))
}
