//! Ledger engine
//!
//! Every operation that changes holdings, item prices or item existence runs
//! here. Each one mutates the catalog and the ownership multiset and keeps the
//! acting user's valuation entry for the given day reconciled with ground
//! truth. All writes of an operation share one transaction; the only exception
//! is the per-holder fan-out of [`update_item_price`].
//!
//! The day is always passed in explicitly so callers (and tests) control the
//! ledger timeline.

pub mod valuation;

use anyhow::Context;
use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::day::Day;
use crate::db::{self, Item, ModerationStatus, User};
use crate::error::{LedgerError, Result};
use crate::validation::{AttachRequest, CountUpdate, NewItem, PriceUpdate};
pub use valuation::{
    adjust_valuation, holding_value, recount_delta, reprice_delta, seed_before, ValuationChange,
};

/// Result of detaching an item from a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetachOutcome {
    /// Holding removed; the item stays in the catalog
    Detached { item: Item },
    /// The item was the user's own quarantined submission and was deleted
    ItemDeleted { user: User },
}

/// Valuation update applied to one holder during a price change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderValuation {
    pub user_id: i64,
    pub units: i64,
    pub delta: Decimal,
    pub change: ValuationChange,
}

/// Holder whose valuation update failed and can be retried with [`retry_holder`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderFailure {
    pub user_id: i64,
    pub error: String,
}

/// Outcome of a price change across every holder of the item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceFanout {
    pub item: Item,
    pub old_price: Decimal,
    pub updated: Vec<HolderValuation>,
    pub failed: Vec<HolderFailure>,
}

impl PriceFanout {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub(crate) fn require_user(conn: &Connection, user_id: i64) -> Result<User> {
    db::get_user(conn, user_id)?.ok_or_else(|| LedgerError::user_not_found(user_id).into())
}

pub(crate) fn require_item(conn: &Connection, item_id: i64) -> Result<Item> {
    db::get_item(conn, item_id)?.ok_or_else(|| LedgerError::item_not_found(item_id).into())
}

/// Create an item from a user submission and give the submitter `count` units.
///
/// Submissions by non-privileged users are owned by the submitter and stay
/// pending (hidden from other users' searches) until promoted.
pub fn submit_item(
    conn: &mut Connection,
    user_id: i64,
    new_item: &NewItem,
    day: Day,
) -> Result<Item> {
    let tx = db::begin_write(conn)?;
    let user = require_user(&tx, user_id)?;

    let (owner, status) = if user.is_privileged {
        (None, ModerationStatus::None)
    } else {
        (Some(user.id), ModerationStatus::Pending)
    };

    let added = holding_value(new_item.price, new_item.count)?;
    adjust_valuation(&tx, user.id, day, added, seed_before(user.id, added))?;

    let item_id = db::insert_item(&tx, new_item, owner, status, Utc::now())
        .context("Failed to insert item")?;
    db::upsert_price_point(&tx, item_id, day, new_item.price)?;
    db::attach_units(&tx, user.id, item_id, new_item.count)?;

    let item = require_item(&tx, item_id)?;
    tx.commit()?;

    info!(
        "User {} submitted item {} ({}) x{} at {}",
        user.id, item.id, item.name, new_item.count, new_item.price
    );
    Ok(item)
}

/// Add `count` units of an existing item to the user's holdings
pub fn attach_item(
    conn: &mut Connection,
    user_id: i64,
    request: &AttachRequest,
    day: Day,
) -> Result<Item> {
    let tx = db::begin_write(conn)?;
    let user = require_user(&tx, user_id)?;
    let item = require_item(&tx, request.item_id)?;

    let added = holding_value(item.current_price, request.count)?;
    adjust_valuation(&tx, user.id, day, added, seed_before(user.id, added))?;
    db::attach_units(&tx, user.id, item.id, request.count)?;

    tx.commit()?;

    info!("User {} attached {} x item {}", user.id, request.count, item.id);
    Ok(item)
}

/// Remove every unit of the item from the user's holdings.
///
/// When the item is the user's own quarantined submission it has no life of
/// its own and is deleted as well.
pub fn detach_item(
    conn: &mut Connection,
    user_id: i64,
    item_id: i64,
    day: Day,
) -> Result<DetachOutcome> {
    let tx = db::begin_write(conn)?;
    let user = require_user(&tx, user_id)?;
    let item = require_item(&tx, item_id)?;

    let units = db::holding_count(&tx, user.id, item.id)?;
    if units == 0 {
        return Err(LedgerError::NotFound {
            entity: "holding",
            id: format!("user {} item {}", user.id, item.id),
        }
        .into());
    }

    release_holding(&tx, &user, &item, units, day)?;

    let outcome = if item.is_quarantined_for(&user) {
        // Nobody else should hold a pending item, but keep their ledgers whole if they do
        release_all_holders(&tx, &item, day)?;
        db::delete_item(&tx, item.id)?;
        info!("User {} dropped own submission {}; item deleted", user.id, item.id);
        DetachOutcome::ItemDeleted { user }
    } else {
        info!("User {} detached {} x item {}", user.id, units, item.id);
        DetachOutcome::Detached { item }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Replace the user's unit count for an item.
///
/// Returns `Ok(None)` without writing anything when the user holds no units:
/// this path only changes existing holdings, use [`attach_item`] to start one.
pub fn update_holding_count(
    conn: &mut Connection,
    user_id: i64,
    update: &CountUpdate,
    day: Day,
) -> Result<Option<Item>> {
    let tx = db::begin_write(conn)?;
    let user = require_user(&tx, user_id)?;
    let item = require_item(&tx, update.item_id)?;

    let current = db::holding_count(&tx, user.id, item.id)?;
    if current == 0 {
        debug!("User {} holds no item {}; count update ignored", user.id, item.id);
        return Ok(None);
    }

    let delta = recount_delta(item.current_price, current, update.count)?;
    adjust_valuation(&tx, user.id, day, delta, seed_before(user.id, delta))?;

    db::detach_all(&tx, user.id, item.id)?;
    db::attach_units(&tx, user.id, item.id, update.count)?;

    tx.commit()?;

    info!(
        "User {} changed item {} count {} -> {}",
        user.id, item.id, current, update.count
    );
    Ok(Some(item))
}

/// Record a new price for the item and revalue every holder.
///
/// The item update commits first. Each holder is then revalued in its own
/// transaction; failures are collected in [`PriceFanout::failed`] and do not
/// undo holders that already succeeded.
pub fn update_item_price(
    conn: &mut Connection,
    user_id: i64,
    update: &PriceUpdate,
    day: Day,
) -> Result<PriceFanout> {
    let tx = db::begin_write(conn)?;
    require_user(&tx, user_id)?;
    let item = require_item(&tx, update.item_id)?;

    let old_price = item.current_price;
    let peak_price = item.peak_price.max(update.price);
    db::upsert_price_point(&tx, item.id, day, update.price)?;
    db::update_item_prices(&tx, item.id, update.price, peak_price)?;
    let holders = db::holders_of(&tx, item.id)?;
    let item = require_item(&tx, item.id)?;
    tx.commit()?;

    info!(
        "Item {} price {} -> {} (peak {}), revaluing {} holder(s)",
        item.id,
        old_price,
        update.price,
        peak_price,
        holders.len()
    );

    let mut updated = Vec::with_capacity(holders.len());
    let mut failed = Vec::new();
    for holder in holders {
        match retry_holder(conn, holder.id, item.id, old_price, update.price, day) {
            Ok(applied) => updated.push(applied),
            Err(e) => {
                warn!("Failed to revalue holder {} for item {}: {:#}", holder.id, item.id, e);
                failed.push(HolderFailure {
                    user_id: holder.id,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    Ok(PriceFanout {
        item,
        old_price,
        updated,
        failed,
    })
}

/// Apply one holder's share of a price change in its own transaction.
///
/// The item must already carry `new_price`: a missing entry for `day` is
/// seeded from ground truth, which then reflects the new price. Only call this
/// for holders that have not received the same `old_price -> new_price` change.
pub fn retry_holder(
    conn: &mut Connection,
    user_id: i64,
    item_id: i64,
    old_price: Decimal,
    new_price: Decimal,
    day: Day,
) -> Result<HolderValuation> {
    let tx = db::begin_write(conn)?;
    let user = require_user(&tx, user_id)?;
    let units = db::holding_count(&tx, user.id, item_id)?;

    let delta = reprice_delta(old_price, new_price, units)?;
    let change = adjust_valuation(&tx, user.id, day, delta, |c| {
        db::portfolio_value(c, user.id)
    })?;
    tx.commit()?;

    Ok(HolderValuation {
        user_id: user.id,
        units,
        delta,
        change,
    })
}

/// Delete an item from the catalog, releasing it from every holder first.
///
/// Restricted to privileged users. Returns the last holder whose ledger was
/// touched, if any.
pub fn delete_item(
    conn: &mut Connection,
    actor_id: i64,
    item_id: i64,
    day: Day,
) -> Result<Option<User>> {
    let tx = db::begin_write(conn)?;
    let actor = require_user(&tx, actor_id)?;
    if !actor.is_privileged {
        return Err(LedgerError::Forbidden(format!(
            "user {} may not delete catalog items",
            actor.id
        ))
        .into());
    }
    let item = require_item(&tx, item_id)?;

    let last_touched = release_all_holders(&tx, &item, day)?;
    db::delete_item(&tx, item.id)?;
    tx.commit()?;

    info!("User {} deleted item {} ({})", actor.id, item.id, item.name);
    Ok(last_touched)
}

/// Subtract a holding's value from the user's ledger and drop its rows
fn release_holding(
    conn: &Connection,
    user: &User,
    item: &Item,
    units: i64,
    day: Day,
) -> Result<ValuationChange> {
    let removed = holding_value(item.current_price, units)?;
    let change = adjust_valuation(conn, user.id, day, -removed, seed_before(user.id, -removed))?;
    db::detach_all(conn, user.id, item.id)?;
    Ok(change)
}

fn release_all_holders(conn: &Connection, item: &Item, day: Day) -> Result<Option<User>> {
    let mut last_touched = None;
    for holder in db::holders_of(conn, item.id)? {
        let units = db::holding_count(conn, holder.id, item.id)?;
        release_holding(conn, &holder, item, units, day)?;
        last_touched = Some(holder);
    }
    Ok(last_touched)
}
