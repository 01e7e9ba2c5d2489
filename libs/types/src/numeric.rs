//! Settlement-precision arithmetic
//!
//! The exchange contract on the external chain evaluates amounts as floats
//! truncated to 15 significant decimal digits and rounded half-to-even. The
//! matcher has to reproduce that arithmetic exactly: a one-atom disagreement
//! between the matcher and the contract makes a submitted trade bounce.

/// Truncate a float to 15 significant decimal digits.
///
/// Mirrors the `%.15g` formatting round-trip used by the settlement contract.
/// Applied around every multiplication or division on amounts.
pub fn to_settlement_precision(x: f64) -> f64 {
    // 1 digit before the exponent point + 14 after = 15 significant digits
    format!("{:.14e}", x).parse().expect("formatted float is parseable")
}

/// Round a float to the nearest integer amount, ties to even.
///
/// The input is truncated to settlement precision first, so a product that
/// the contract sees as exactly `x.5` rounds the same way here.
pub fn round_half_even(x: f64) -> i64 {
    to_settlement_precision(x).round_ties_even() as i64
}

/// Quote-side amount of `base` atoms at `price` (quote per base).
pub fn quote_amount(base: i64, price: f64) -> i64 {
    round_half_even(base as f64 * to_settlement_precision(price))
}

/// Base-side amount of `quote` atoms at `price` (quote per base).
pub fn base_amount(quote: i64, price: f64) -> i64 {
    round_half_even(quote as f64 / to_settlement_precision(price))
}
