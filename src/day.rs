//! Calendar day used as the ledger timeline key
//!
//! Both item price history and user valuations are keyed by `Day`. Internally
//! it is a `NaiveDate`, so ordering is chronological and SQLite stores it as an
//! ISO date. The `DD/MM/YYYY` form only appears at the CLI/JSON boundary.

use chrono::{Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// External day-key format: day/month/4-digit-year, zero padded
pub const DAY_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }

    /// The server's local calendar date
    pub fn today() -> Self {
        Day(Local::now().date_naive())
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Day(date)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for Day {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // chrono accepts unpadded fields; the day key is always 10 chars
        if s.len() != 10 {
            anyhow::bail!("Invalid day '{}'. Use DD/MM/YYYY", s);
        }
        NaiveDate::parse_from_str(s, DAY_FORMAT)
            .map(Day)
            .map_err(|_| anyhow::anyhow!("Invalid day '{}'. Use DD/MM/YYYY", s))
    }
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Day {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Day {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Day {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        NaiveDate::column_result(value).map(Day)
    }
}
