use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, Item, PricePoint};
use crate::ledger::{require_item, require_user};
use crate::validation::validate_search;

/// Autocomplete suggestions returned per query
pub const AUTOCOMPLETE_LIMIT: usize = 5;

/// Public view of a holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderRef {
    pub id: i64,
    pub email: String,
}

/// Item with its price history and holders
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub price_history: Vec<PricePoint>,
    pub holders: Vec<HolderRef>,
}

/// Every catalog item, newest first
pub fn catalog(conn: &Connection) -> Result<Vec<Item>> {
    db::list_items(conn)
}

/// The item's recorded prices in day order
pub fn price_history(conn: &Connection, item_id: i64) -> Result<Vec<PricePoint>> {
    let item = require_item(conn, item_id)?;
    db::get_price_history(conn, item.id)
}

pub fn item_detail(conn: &Connection, item_id: i64) -> Result<ItemDetail> {
    let item = require_item(conn, item_id)?;
    let price_history = db::get_price_history(conn, item.id)?;
    let holders = db::holders_of(conn, item.id)?
        .into_iter()
        .map(|u| HolderRef {
            id: u.id,
            email: u.email,
        })
        .collect();

    Ok(ItemDetail {
        item,
        price_history,
        holders,
    })
}

/// Items the user could add: name contains `search`, not held yet, not quarantined
pub fn autocomplete(conn: &Connection, user_id: i64, search: &str) -> Result<Vec<Item>> {
    let user = require_user(conn, user_id)?;
    let search = validate_search(search)?;
    db::search_items_not_held(conn, user.id, &search, AUTOCOMPLETE_LIMIT)
}
