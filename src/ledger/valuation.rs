//! Valuation arithmetic and the seed-or-adjust rule
//!
//! A user's entry for a day is adjusted incrementally once it exists. The
//! first touch of a day seeds the entry from ground truth (the full portfolio
//! value) instead of carrying forward the previous day, so errors from missed
//! days never compound.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::day::Day;
use crate::db;
use crate::error::{LedgerError, Result};

fn checked(value: Option<Decimal>, detail: impl FnOnce() -> String) -> Result<Decimal> {
    value.ok_or_else(|| LedgerError::amount_out_of_range(detail()).into())
}

/// Value of `units` units at `price`
pub fn holding_value(price: Decimal, units: i64) -> Result<Decimal> {
    checked(price.checked_mul(Decimal::from(units)), || {
        format!("{} x {}", price, units)
    })
}

/// Change in a holder's value when the item price moves from `old` to `new`
pub fn reprice_delta(old_price: Decimal, new_price: Decimal, units: i64) -> Result<Decimal> {
    let step = checked(new_price.checked_sub(old_price), || {
        format!("{} - {}", new_price, old_price)
    })?;
    holding_value(step, units)
}

/// Change in a holder's value when the unit count moves from `current` to `new`
pub fn recount_delta(price: Decimal, current: i64, new: i64) -> Result<Decimal> {
    let after = holding_value(price, new)?;
    let before = holding_value(price, current)?;
    checked(after.checked_sub(before), || format!("{} - {}", after, before))
}

/// Resulting state of a user's valuation entry after an adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValuationChange {
    pub day: Day,
    pub amount: Decimal,
    /// True when the entry did not exist and was seeded from ground truth
    pub seeded: bool,
}

/// Add `delta` to the user's entry for `day`, or store `seed` if absent.
///
/// `seed` computes the full amount for a missing entry and runs on the same
/// connection, so callers decide whether ground truth is read before or after
/// their own mutation.
pub fn adjust_valuation<F>(
    conn: &Connection,
    user_id: i64,
    day: Day,
    delta: Decimal,
    seed: F,
) -> Result<ValuationChange>
where
    F: FnOnce(&Connection) -> Result<Decimal>,
{
    let (amount, seeded) = match db::get_valuation(conn, user_id, day)? {
        Some(current) => (
            checked(current.checked_add(delta), || format!("{} + {}", current, delta))?,
            false,
        ),
        None => (seed(conn)?, true),
    };

    debug!(user_id, %day, %delta, %amount, seeded, "valuation adjusted");
    db::set_valuation(conn, user_id, day, amount)?;

    Ok(ValuationChange {
        day,
        amount,
        seeded,
    })
}

/// Seed closure for mutations that read ground truth before changing holdings
pub fn seed_before(user_id: i64, delta: Decimal) -> impl FnOnce(&Connection) -> Result<Decimal> {
    move |conn| {
        let before = db::portfolio_value(conn, user_id)?;
        checked(before.checked_add(delta), || format!("{} + {}", before, delta))
    }
}
