//! Fill arithmetic
//!
//! Crosses one taker order against one maker order and mutates both. All
//! amounts are computed against the maker's *signed* price at settlement
//! precision, so the contract reproduces the same integers when the batch
//! lands on-chain. The signed price is buy-asset per sell-asset from the
//! maker's own perspective: quote-per-base on a resting SELL, base-per-quote
//! on a resting BUY.
//!
//! A nonzero residual where a side must have exhausted exactly means the
//! matcher's arithmetic has diverged from the contract's. That state must
//! never be persisted, so it aborts the process.

use types::errors::EngineError;
use types::numeric::{round_half_even, to_settlement_precision};
use types::order::{Order, OrderStatus, Side};

/// Amounts exchanged by one fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    /// Base atoms traded.
    pub amount: i64,
    /// Quote atoms traded.
    pub quote_amount: i64,
}

/// Cross `taker` against `maker`, updating fills, remaining sell amounts and
/// statuses of both orders.
///
/// # Panics
/// Panics when a side that must have exhausted exactly retains a residual
/// sell amount, or when a remaining sell amount goes negative.
pub fn fill(taker: &mut Order, maker: &mut Order) -> Result<Fill, EngineError> {
    let p = to_settlement_precision(
        maker
            .original_price()
            .map_err(|e| EngineError::InvalidOrder(e.to_string()))?,
    );

    let (amount, quote_amount) = if taker.side == Side::BUY {
        // quote the maker's whole remainder at its own price
        let maker_quote_output = round_half_even(maker.remaining_sell_amount as f64 * p);

        if maker_quote_output > taker.remaining_sell_amount {
            // taker's quote budget exhausts first
            let amount = round_half_even(taker.remaining_sell_amount as f64 / p);
            let quote_amount = taker.remaining_sell_amount;

            maker.filled_amount += amount;
            maker.remaining_sell_amount -= amount;
            taker.filled_amount += amount;
            taker.remaining_sell_amount = 0;

            maker.status = if maker.remaining_sell_amount == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFilled
            };
            taker.status = OrderStatus::Filled;

            (amount, quote_amount)
        } else {
            // maker exhausts (or exactly matches)
            let amount = maker.remaining_amount();
            let quote_amount = round_half_even(amount as f64 * p);

            maker.filled_amount += amount;
            maker.remaining_sell_amount -= amount;
            if maker.remaining_sell_amount != 0 {
                panic!(
                    "smaller maker seller: remaining sell amount = {}",
                    maker.remaining_sell_amount
                );
            }
            maker.status = OrderStatus::Filled;

            taker.filled_amount += amount;
            taker.remaining_sell_amount -= quote_amount;
            taker.status = taker_status_after(taker.remaining_sell_amount);

            (amount, quote_amount)
        }
    } else {
        // taker is the seller; the maker sells quote for base, and its
        // signed price (base per quote) converts its remainder to base
        let maker_output = round_half_even(maker.remaining_sell_amount as f64 * p);

        if maker_output > taker.remaining_amount() {
            // taker's base remainder exhausts first
            let amount = taker.remaining_amount();
            let quote_amount = round_half_even(amount as f64 / p);

            maker.filled_amount += amount;
            maker.remaining_sell_amount -= quote_amount;
            taker.filled_amount += amount;
            taker.remaining_sell_amount -= amount;
            if taker.remaining_sell_amount != 0 {
                panic!(
                    "smaller taker seller: remaining sell amount = {}",
                    taker.remaining_sell_amount
                );
            }

            maker.status = if maker.remaining_sell_amount == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartialFilled
            };
            taker.status = OrderStatus::Filled;

            (amount, quote_amount)
        } else {
            // maker exhausts (or exactly matches)
            let amount = maker_output;
            let quote_amount = maker.remaining_sell_amount;

            maker.filled_amount += amount;
            maker.remaining_sell_amount = 0;
            maker.status = OrderStatus::Filled;

            taker.filled_amount += amount;
            taker.remaining_sell_amount -= amount;
            taker.status = taker_status_after(taker.remaining_sell_amount);

            (amount, quote_amount)
        }
    };

    Ok(Fill { amount, quote_amount })
}

fn taker_status_after(remaining_sell_amount: i64) -> OrderStatus {
    if remaining_sell_amount > 0 {
        OrderStatus::PartialFilled
    } else if remaining_sell_amount == 0 {
        OrderStatus::Filled
    } else {
        panic!("taker remaining sell amount = {}", remaining_sell_amount);
    }
}
