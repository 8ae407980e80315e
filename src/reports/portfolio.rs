use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::day::Day;
use crate::db::{self, Item, ItemWithCount, Valuation};
use crate::error::LedgerError;
use crate::ledger::require_user;

/// Portfolio statistics shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioStatistics {
    /// Units held, counting repeats of the same item
    pub item_count: i64,
    pub distinct_items: usize,
    pub last_known_valuation: Valuation,
    pub top_three_by_peak_price: Vec<Item>,
}

/// Every distinct item the user holds with its unit count, newest item first
pub fn list_holdings_with_count(conn: &Connection, user_id: i64) -> Result<Vec<ItemWithCount>> {
    require_user(conn, user_id)?;
    db::holdings_with_count(conn, user_id)
}

/// A single held item with its unit count
pub fn item_with_count(conn: &Connection, user_id: i64, item_id: i64) -> Result<ItemWithCount> {
    require_user(conn, user_id)?;
    let item = crate::ledger::require_item(conn, item_id)?;
    let count = db::holding_count(conn, user_id, item_id)?;
    if count == 0 {
        return Err(LedgerError::NotFound {
            entity: "holding",
            id: format!("user {} item {}", user_id, item_id),
        }
        .into());
    }
    Ok(ItemWithCount { item, count })
}

/// Ground-truth value of everything the user holds at current prices
pub fn portfolio_value(conn: &Connection, user_id: i64) -> Result<Decimal> {
    require_user(conn, user_id)?;
    db::portfolio_value(conn, user_id)
}

/// Distinct held items with the highest peak price, at most `n`
pub fn most_valuable_distinct_holdings(
    conn: &Connection,
    user_id: i64,
    n: usize,
) -> Result<Vec<Item>> {
    let holdings = list_holdings_with_count(conn, user_id)?;
    Ok(top_by_peak_price(holdings.into_iter().map(|h| h.item), n))
}

fn top_by_peak_price(items: impl IntoIterator<Item = Item>, n: usize) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut distinct: Vec<Item> = items.into_iter().filter(|i| seen.insert(i.id)).collect();
    distinct.sort_by(|a, b| b.peak_price.cmp(&a.peak_price).then(a.id.cmp(&b.id)));
    distinct.truncate(n);
    distinct
}

/// Most recent valuation entry, or zero on `as_of` when the ledger is empty
pub fn last_known_valuation(conn: &Connection, user_id: i64, as_of: Day) -> Result<Valuation> {
    require_user(conn, user_id)?;
    Ok(db::latest_valuation(conn, user_id)?.unwrap_or(Valuation {
        day: as_of,
        amount: Decimal::ZERO,
    }))
}

/// Full valuation series in day order
pub fn valuation_history(conn: &Connection, user_id: i64) -> Result<Vec<Valuation>> {
    require_user(conn, user_id)?;
    db::valuation_history(conn, user_id)
}

pub fn portfolio_statistics(
    conn: &Connection,
    user_id: i64,
    as_of: Day,
) -> Result<PortfolioStatistics> {
    let holdings = list_holdings_with_count(conn, user_id)?;
    let item_count = holdings.iter().map(|h| h.count).sum();
    let distinct_items = holdings.len();

    Ok(PortfolioStatistics {
        item_count,
        distinct_items,
        last_known_valuation: last_known_valuation(conn, user_id, as_of)?,
        top_three_by_peak_price: top_by_peak_price(holdings.into_iter().map(|h| h.item), 3),
    })
}
