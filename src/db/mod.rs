// Database module - SQLite connection, schema and data access

pub mod models;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::day::Day;
use crate::error::LedgerError;
use crate::validation::NewItem;
pub use models::{Item, ItemWithCount, ModerationStatus, PricePoint, User, Valuation};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the default database path (~/.stash/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let stash_dir = PathBuf::from(home).join(".stash");

    std::fs::create_dir_all(&stash_dir).context("Failed to create .stash directory")?;

    Ok(stash_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;
    // Writers queue on the IMMEDIATE lock instead of failing with SQLITE_BUSY
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    Ok(conn)
}

/// Initialize the database with schema
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    init_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Run the schema SQL on an open connection (idempotent)
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;
    Ok(())
}

/// Begin a write transaction that takes the database write lock up front.
///
/// Every valuation update is a read-modify-write of one `valuations` row;
/// holding the lock from the first read serializes concurrent writers.
pub fn begin_write(conn: &mut Connection) -> Result<rusqlite::Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to begin write transaction")
}

// ============ Users ============

const USER_COLUMNS: &str = "u.id, u.display_name, u.email, u.is_privileged, u.created_at";

fn user_from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        is_privileged: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    email: &str,
    display_name: Option<&str>,
    is_privileged: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (display_name, email, is_privileged, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![display_name, email, is_privileged, Utc::now()],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, [user_id], user_from_row)
        .optional()?;
    Ok(user)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!(
        "SELECT {} FROM users u WHERE u.email = ?1 COLLATE NOCASE",
        USER_COLUMNS
    );
    let user = conn
        .query_row(&sql, [email.trim()], user_from_row)
        .optional()?;
    Ok(user)
}

// ============ Items ============

const ITEM_COLUMNS: &str = "i.id, i.name, i.image_ref, i.source_url, i.current_price, \
     i.peak_price, i.moderation_status, i.owner_user_id, i.created_at";

fn item_from_row(row: &Row) -> Result<Item, rusqlite::Error> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        image_ref: row.get(2)?,
        source_url: row.get(3)?,
        current_price: get_decimal_value(row, 4)?,
        peak_price: get_decimal_value(row, 5)?,
        moderation_status: row
            .get::<_, String>(6)?
            .parse::<ModerationStatus>()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
            })?,
        owner_user_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new item; current and peak price both start at the submitted price
pub fn insert_item(
    conn: &Connection,
    item: &NewItem,
    owner_user_id: Option<i64>,
    status: ModerationStatus,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO items (
            name, image_ref, source_url, current_price, peak_price,
            moderation_status, owner_user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            item.name,
            item.image_ref,
            item.source_url,
            item.price.to_string(),
            item.price.to_string(),
            status.as_str(),
            owner_user_id,
            created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_item(conn: &Connection, item_id: i64) -> Result<Option<Item>> {
    let sql = format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS);
    let item = conn
        .query_row(&sql, [item_id], item_from_row)
        .optional()?;
    Ok(item)
}

pub fn update_item_prices(
    conn: &Connection,
    item_id: i64,
    current_price: Decimal,
    peak_price: Decimal,
) -> Result<()> {
    conn.execute(
        "UPDATE items SET current_price = ?2, peak_price = ?3 WHERE id = ?1",
        params![item_id, current_price.to_string(), peak_price.to_string()],
    )?;
    Ok(())
}

/// Delete an item; ownership rows and price history cascade
pub fn delete_item(conn: &Connection, item_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM items WHERE id = ?1", [item_id])?;
    Ok(deleted > 0)
}

/// All items, newest first
pub fn list_items(conn: &Connection) -> Result<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM items i ORDER BY i.created_at DESC, i.id ASC",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map([], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Escape LIKE wildcards so the search text matches literally
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Visible items matching `search` that the user does not hold yet
pub fn search_items_not_held(
    conn: &Connection,
    user_id: i64,
    search: &str,
    limit: usize,
) -> Result<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM items i
         WHERE i.moderation_status = 'NONE'
           AND i.name LIKE ?2 ESCAPE '\\'
           AND i.id NOT IN (SELECT item_id FROM item_user WHERE user_id = ?1)
         ORDER BY i.created_at DESC, i.id ASC
         LIMIT ?3",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![user_id, like_pattern(search), limit as i64], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

// ============ Price history ============

/// Record a price for a day, overwriting any same-day entry
pub fn upsert_price_point(conn: &Connection, item_id: i64, day: Day, price: Decimal) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO item_prices (item_id, day, price) VALUES (?1, ?2, ?3)",
        params![item_id, day, price.to_string()],
    )?;
    Ok(())
}

pub fn get_price_history(conn: &Connection, item_id: i64) -> Result<Vec<PricePoint>> {
    let mut stmt =
        conn.prepare("SELECT day, price FROM item_prices WHERE item_id = ?1 ORDER BY day ASC")?;
    let points = stmt
        .query_map([item_id], |row| {
            Ok(PricePoint {
                day: row.get(0)?,
                price: get_decimal_value(row, 1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

// ============ Ownership multiset ============

/// Number of units of `item_id` held by `user_id` (zero if none)
pub fn holding_count(conn: &Connection, user_id: i64, item_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM item_user WHERE user_id = ?1 AND item_id = ?2",
        params![user_id, item_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Add `count` ownership rows for the pair
pub fn attach_units(conn: &Connection, user_id: i64, item_id: i64, count: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO item_user (user_id, item_id, created_at) VALUES (?1, ?2, ?3)",
    )?;
    let now = Utc::now();
    for _ in 0..count {
        stmt.execute(params![user_id, item_id, now])?;
    }
    Ok(())
}

/// Remove every ownership row for the pair, returning how many were removed
pub fn detach_all(conn: &Connection, user_id: i64, item_id: i64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM item_user WHERE user_id = ?1 AND item_id = ?2",
        params![user_id, item_id],
    )?;
    Ok(removed)
}

/// Users holding at least one unit of the item, each listed once
pub fn holders_of(conn: &Connection, item_id: i64) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users u
         WHERE u.id IN (SELECT user_id FROM item_user WHERE item_id = ?1)
         ORDER BY u.id ASC",
        USER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([item_id], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

const HOLDINGS_SQL: &str = "FROM items i
     JOIN item_user iu ON iu.item_id = i.id
     WHERE iu.user_id = ?1";

/// Distinct items held by the user with their unit counts, newest item first
pub fn holdings_with_count(conn: &Connection, user_id: i64) -> Result<Vec<ItemWithCount>> {
    let sql = format!(
        "SELECT {}, COUNT(iu.id) {}
         GROUP BY i.id
         ORDER BY i.created_at DESC, i.id ASC",
        ITEM_COLUMNS, HOLDINGS_SQL
    );
    let mut stmt = conn.prepare(&sql)?;
    let holdings = stmt
        .query_map([user_id], |row| {
            Ok(ItemWithCount {
                item: item_from_row(row)?,
                count: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(holdings)
}

/// Ground-truth portfolio value: sum of current price x units over all holdings
pub fn portfolio_value(conn: &Connection, user_id: i64) -> Result<Decimal> {
    holdings_with_count(conn, user_id)?
        .iter()
        .try_fold(Decimal::ZERO, |total, holding| {
            holding
                .total_value()
                .and_then(|value| total.checked_add(value))
        })
        .ok_or_else(|| {
            LedgerError::amount_out_of_range(format!("portfolio of user {}", user_id)).into()
        })
}

// ============ Valuations ============

pub fn get_valuation(conn: &Connection, user_id: i64, day: Day) -> Result<Option<Decimal>> {
    let amount = conn
        .query_row(
            "SELECT amount FROM valuations WHERE user_id = ?1 AND day = ?2",
            params![user_id, day],
            |row| get_decimal_value(row, 0),
        )
        .optional()?;
    Ok(amount)
}

pub fn set_valuation(conn: &Connection, user_id: i64, day: Day, amount: Decimal) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO valuations (user_id, day, amount) VALUES (?1, ?2, ?3)",
        params![user_id, day, amount.to_string()],
    )?;
    Ok(())
}

/// Most recent valuation entry for the user
pub fn latest_valuation(conn: &Connection, user_id: i64) -> Result<Option<Valuation>> {
    let valuation = conn
        .query_row(
            "SELECT day, amount FROM valuations WHERE user_id = ?1 ORDER BY day DESC LIMIT 1",
            [user_id],
            |row| {
                Ok(Valuation {
                    day: row.get(0)?,
                    amount: get_decimal_value(row, 1)?,
                })
            },
        )
        .optional()?;
    Ok(valuation)
}

pub fn valuation_history(conn: &Connection, user_id: i64) -> Result<Vec<Valuation>> {
    let mut stmt =
        conn.prepare("SELECT day, amount FROM valuations WHERE user_id = ?1 ORDER BY day ASC")?;
    let entries = stmt
        .query_map([user_id], |row| {
            Ok(Valuation {
                day: row.get(0)?,
                amount: get_decimal_value(row, 1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::{Type, ValueRef};

    let conversion = |ty: Type, e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(idx, ty, e)
    };

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| conversion(Type::Text, Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| conversion(Type::Text, Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| conversion(Type::Real, Box::new(e))),
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            Type::Null,
        )),
    }
}
