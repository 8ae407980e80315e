//! Command dispatcher that routes parsed CLI commands to the ledger and
//! reporting layers, then prints the result as text or JSON.

use anyhow::{Context, Result};
use colored::Colorize;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

use crate::cli::{formatters, Cli, Commands, ItemCommands, UserCommands};
use crate::config::Config;
use crate::day::Day;
use crate::db::{self, User};
use crate::identity;
use crate::ledger;
use crate::reports;
use crate::utils::format_money;
use crate::validation::{self, ItemSubmission};

/// Per-invocation settings shared by every handler
struct Session {
    conn: Connection,
    day: Day,
    json: bool,
    symbol: String,
    user_email: Option<String>,
}

impl Session {
    fn acting_user(&self) -> Result<User> {
        identity::resolve_user(&self.conn, self.user_email.as_deref())
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&str) -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text(&self.symbol));
        }
        Ok(())
    }
}

fn parse_price(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).context("Invalid price. Must be a decimal number")
}

/// Route a parsed command line to its handler
pub async fn dispatch_command(cli: Cli, config: Config) -> Result<()> {
    let day = match cli.as_of.as_deref() {
        Some(raw) => raw.parse::<Day>()?,
        None => Day::today(),
    };
    let db_path = cli.db.or(config.database_path);

    db::init_database(db_path.clone())?;
    let conn = db::open_db(db_path)?;

    let mut session = Session {
        conn,
        day,
        json: cli.json,
        symbol: config.currency_symbol.unwrap_or_default(),
        user_email: cli.user.or(config.user),
    };

    match cli.command {
        Commands::Users { action } => dispatch_users(&session, action),
        Commands::Items { action } => dispatch_items(&mut session, action),
        Commands::Holdings => dispatch_holdings(&session),
        Commands::Holding { item_id } => {
            let user = session.acting_user()?;
            let holding = reports::item_with_count(&session.conn, user.id, item_id)?;
            session.emit(&holding, |s| formatters::format_holding(&holding, s))
        }
        Commands::Stats => {
            let user = session.acting_user()?;
            let stats = reports::portfolio_statistics(&session.conn, user.id, session.day)?;
            session.emit(&stats, |s| formatters::format_statistics(&stats, s))
        }
        Commands::History => {
            let user = session.acting_user()?;
            let history = reports::valuation_history(&session.conn, user.id)?;
            if history.is_empty() && !session.json {
                println!("{} No valuation recorded yet", "ℹ".blue().bold());
                return Ok(());
            }
            session.emit(&history, |s| {
                format!("{}\n", formatters::format_history_table(&history, s))
            })
        }
    }
}

fn dispatch_users(session: &Session, action: UserCommands) -> Result<()> {
    match action {
        UserCommands::Add {
            email,
            name,
            privileged,
        } => {
            let user = identity::register_user(&session.conn, &email, name.as_deref(), privileged)?;
            session.emit(&user, |_| {
                format!("{} Registered {}", "✓".green().bold(), formatters::format_user(&user))
            })
        }
        UserCommands::Show { email } => {
            let user = identity::find_user_by_email(&session.conn, &email)?;
            session.emit(&user, |_| formatters::format_user(&user))
        }
    }
}

fn dispatch_holdings(session: &Session) -> Result<()> {
    let user = session.acting_user()?;
    let holdings = reports::list_holdings_with_count(&session.conn, user.id)?;
    if holdings.is_empty() && !session.json {
        print!("{}", formatters::format_empty_holdings());
        return Ok(());
    }
    session.emit(&holdings, |s| formatters::format_holdings_table(&holdings, s))
}

fn dispatch_items(session: &mut Session, action: ItemCommands) -> Result<()> {
    let day = session.day;

    match action {
        ItemCommands::Submit {
            name,
            image,
            price,
            url,
            count,
        } => {
            let user = session.acting_user()?;
            let submission = ItemSubmission {
                name,
                image,
                price: parse_price(&price)?,
                url,
                count,
            };
            let new_item = validation::validate_submission(&submission)?;
            let item = ledger::submit_item(&mut session.conn, user.id, &new_item, day)?;
            session.emit(&item, |_| {
                format!(
                    "{} Submitted {} (#{}) x{}\n",
                    "✓".green().bold(),
                    item.name.cyan().bold(),
                    item.id,
                    new_item.count
                )
            })
        }
        ItemCommands::Attach { item_id, count } => {
            let user = session.acting_user()?;
            let request = validation::validate_attach(item_id, count)?;
            let item = ledger::attach_item(&mut session.conn, user.id, &request, day)?;
            session.emit(&item, |_| {
                format!("{} Added {} x {}\n", "✓".green().bold(), count, item.name)
            })
        }
        ItemCommands::Detach { item_id } => {
            let user = session.acting_user()?;
            let outcome = ledger::detach_item(&mut session.conn, user.id, item_id, day)?;
            session.emit(&outcome, |_| formatters::format_detach_outcome(&outcome))
        }
        ItemCommands::Count { item_id, count } => {
            let user = session.acting_user()?;
            let update = validation::validate_count_update(item_id, count)?;
            let item = ledger::update_holding_count(&mut session.conn, user.id, &update, day)?;
            session.emit(&item, |_| match &item {
                Some(item) => format!(
                    "{} You now hold {} x {}\n",
                    "✓".green().bold(),
                    count,
                    item.name
                ),
                None => format!(
                    "{} You hold no units of item {}; use attach first\n",
                    "ℹ".blue().bold(),
                    item_id
                ),
            })
        }
        ItemCommands::Price { item_id, price } => {
            let user = session.acting_user()?;
            let update = validation::validate_price_update(item_id, parse_price(&price)?)?;
            let fanout = ledger::update_item_price(&mut session.conn, user.id, &update, day)?;
            session.emit(&fanout, |s| formatters::format_price_fanout(&fanout, s))?;
            if !fanout.is_complete() {
                anyhow::bail!(
                    "{} holder(s) were not revalued; run `stash items retry {} <email> --from {}` for each",
                    fanout.failed.len(),
                    item_id,
                    fanout.old_price
                );
            }
            Ok(())
        }
        ItemCommands::Retry {
            item_id,
            holder,
            old_price,
        } => {
            session.acting_user()?;
            let holder = identity::find_user_by_email(&session.conn, &holder)?;
            let item = ledger::require_item(&session.conn, item_id)?;
            let applied = ledger::retry_holder(
                &mut session.conn,
                holder.id,
                item.id,
                parse_price(&old_price)?,
                item.current_price,
                day,
            )?;
            session.emit(&applied, |s| {
                format!(
                    "{} Revalued {}: {} unit(s), valuation now {}\n",
                    "✓".green().bold(),
                    holder.email,
                    applied.units,
                    format_money(applied.change.amount, s)
                )
            })
        }
        ItemCommands::Delete { item_id } => {
            let user = session.acting_user()?;
            let last_touched = ledger::delete_item(&mut session.conn, user.id, item_id, day)?;
            info!("Deleted item {}; last holder touched: {:?}", item_id, last_touched.map(|u| u.id));
            session.emit(&serde_json::json!({ "deleted": item_id }), |_| {
                format!("{} Deleted item {}\n", "✓".green().bold(), item_id)
            })
        }
        ItemCommands::Show { item_id } => {
            let detail = reports::item_detail(&session.conn, item_id)?;
            session.emit(&detail, |s| formatters::format_item_detail(&detail, s))
        }
        ItemCommands::Search { text } => {
            let user = session.acting_user()?;
            let items = reports::autocomplete(&session.conn, user.id, &text)?;
            session.emit(&items, |s| {
                if items.is_empty() {
                    "No matching items\n".to_string()
                } else {
                    format!("{}\n", formatters::format_items_table(&items, s))
                }
            })
        }
        ItemCommands::Catalog => {
            let user = session.acting_user()?;
            if !user.is_privileged {
                return Err(crate::error::LedgerError::Forbidden(
                    "the full catalog is restricted to privileged users".to_string(),
                )
                .into());
            }
            let items = reports::catalog(&session.conn)?;
            session.emit(&items, |s| format!("{}\n", formatters::format_items_table(&items, s)))
        }
    }
}
