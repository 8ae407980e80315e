//! Stash - collectibles inventory tracker
//!
//! This library catalogs items with their price history, tracks how many
//! units each user holds, and keeps a per-user, per-day portfolio valuation
//! ledger reconciled with the current holdings.

pub mod cli;
pub mod config;
pub mod day;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod reports;
pub mod utils;
pub mod validation;
