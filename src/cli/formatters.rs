//! Output formatting module for CLI display
//!
//! This module handles terminal output formatting, separating the concerns
//! of ledger computation from presentation. JSON output serializes the
//! domain types directly.

use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::{Item, ItemWithCount, ModerationStatus, User, Valuation};
use crate::ledger::{DetachOutcome, PriceFanout};
use crate::reports::{ItemDetail, PortfolioStatistics};
use crate::utils::format_money;

fn colored_delta(value: Decimal, symbol: &str) -> String {
    let text = format_money(value, symbol);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn status_label(item: &Item) -> String {
    match item.moderation_status {
        ModerationStatus::None => String::new(),
        ModerationStatus::Pending => "pending".yellow().to_string(),
    }
}

/// Format the user's holdings as a table with a total line
pub fn format_holdings_table(holdings: &[ItemWithCount], symbol: &str) -> String {
    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Units")]
        count: i64,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Peak")]
        peak: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<HoldingRow> = holdings
        .iter()
        .map(|h| HoldingRow {
            id: h.item.id,
            name: h.item.name.clone(),
            count: h.count,
            price: format_money(h.item.current_price, symbol),
            peak: format_money(h.item.peak_price, symbol),
            value: h
                .total_value()
                .map(|v| format_money(v, symbol))
                .unwrap_or_else(|| "overflow".to_string()),
            status: status_label(&h.item),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..6), Alignment::right());

    let total = holdings
        .iter()
        .filter_map(ItemWithCount::total_value)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    format!(
        "{}\n{:<14} {}\n",
        table,
        "Total value:".bold(),
        format_money(total, symbol).cyan().bold()
    )
}

/// Format a plain list of catalog items
pub fn format_items_table(items: &[Item], symbol: &str) -> String {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Peak")]
        peak: String,
        #[tabled(rename = "Added")]
        added: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            name: i.name.clone(),
            price: format_money(i.current_price, symbol),
            peak: format_money(i.peak_price, symbol),
            added: i.created_at.format("%d/%m/%Y").to_string(),
            status: status_label(i),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..4), Alignment::right());
    table.to_string()
}

pub fn format_item_detail(detail: &ItemDetail, symbol: &str) -> String {
    let item = &detail.item;
    let mut output = format!(
        "\n{} {} (#{})\n",
        "◆".cyan().bold(),
        item.name.bold(),
        item.id
    );
    output.push_str(&format!("  Price:   {}\n", format_money(item.current_price, symbol)));
    output.push_str(&format!("  Peak:    {}\n", format_money(item.peak_price, symbol)));
    output.push_str(&format!("  Image:   {}\n", item.image_ref));
    output.push_str(&format!("  Source:  {}\n", item.source_url));
    if item.moderation_status == ModerationStatus::Pending {
        output.push_str(&format!("  Status:  {}\n", status_label(item)));
    }

    if !detail.price_history.is_empty() {
        output.push_str(&format!("\n{}\n", "Price history:".bold()));
        for point in &detail.price_history {
            output.push_str(&format!(
                "  {}  {}\n",
                point.day,
                format_money(point.price, symbol)
            ));
        }
    }

    output.push_str(&format!("\n{} {}\n", "Holders:".bold(), detail.holders.len()));
    for holder in &detail.holders {
        output.push_str(&format!("  #{} {}\n", holder.id, holder.email));
    }
    output
}

pub fn format_holding(holding: &ItemWithCount, symbol: &str) -> String {
    let item = &holding.item;
    let value = holding
        .total_value()
        .map(|v| format_money(v, symbol))
        .unwrap_or_else(|| "overflow".to_string());
    let mut output = format!(
        "\n{} {} (#{})\n",
        "◆".cyan().bold(),
        item.name.bold(),
        item.id
    );
    output.push_str(&format!("  Units:   {}\n", holding.count));
    output.push_str(&format!("  Price:   {}\n", format_money(item.current_price, symbol)));
    output.push_str(&format!("  Value:   {}\n", value.green()));
    if item.moderation_status == ModerationStatus::Pending {
        output.push_str(&format!("  Status:  {}\n", status_label(item)));
    }
    output
}

pub fn format_statistics(stats: &PortfolioStatistics, symbol: &str) -> String {
    let mut output = format!("\n{} Portfolio statistics\n\n", "📊".cyan().bold());
    output.push_str(&format!(
        "{:<22} {} ({} distinct)\n",
        "Units held:".bold(),
        stats.item_count,
        stats.distinct_items
    ));
    output.push_str(&format!(
        "{:<22} {} on {}\n",
        "Last known valuation:".bold(),
        format_money(stats.last_known_valuation.amount, symbol).cyan(),
        stats.last_known_valuation.day
    ));

    if !stats.top_three_by_peak_price.is_empty() {
        output.push_str(&format!("\n{}\n", "Most valuable items:".bold()));
        for (rank, item) in stats.top_three_by_peak_price.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (peak {})\n",
                rank + 1,
                item.name,
                format_money(item.peak_price, symbol)
            ));
        }
    }
    output
}

/// Valuation series with the change from the previous recorded day
pub fn format_history_table(history: &[Valuation], symbol: &str) -> String {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Value")]
        amount: String,
        #[tabled(rename = "Change")]
        change: String,
    }

    let rows: Vec<HistoryRow> = history
        .iter()
        .enumerate()
        .map(|(idx, v)| HistoryRow {
            day: v.day.to_string(),
            amount: format_money(v.amount, symbol),
            change: match idx.checked_sub(1).map(|prev| &history[prev]) {
                Some(prev) => colored_delta(v.amount - prev.amount, symbol),
                None => String::new(),
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_price_fanout(fanout: &PriceFanout, symbol: &str) -> String {
    let mut output = format!(
        "\n{} {} price {} -> {}\n",
        "✓".green().bold(),
        fanout.item.name.bold(),
        format_money(fanout.old_price, symbol),
        format_money(fanout.item.current_price, symbol).cyan()
    );
    for holder in &fanout.updated {
        output.push_str(&format!(
            "  holder #{} x{}: {} (day total {})\n",
            holder.user_id,
            holder.units,
            colored_delta(holder.delta, symbol),
            format_money(holder.change.amount, symbol)
        ));
    }
    for failure in &fanout.failed {
        output.push_str(&format!(
            "  {} holder #{} not revalued: {}\n",
            "✗".red().bold(),
            failure.user_id,
            failure.error
        ));
    }
    output
}

pub fn format_detach_outcome(outcome: &DetachOutcome) -> String {
    match outcome {
        DetachOutcome::Detached { item } => {
            format!("{} Removed {} from your holdings\n", "✓".green().bold(), item.name)
        }
        DetachOutcome::ItemDeleted { .. } => format!(
            "{} Removed your own submission; the item was deleted\n",
            "✓".green().bold()
        ),
    }
}

pub fn format_user(user: &User) -> String {
    let role = if user.is_privileged { " (privileged)" } else { "" };
    match &user.display_name {
        Some(name) => format!("#{} {} <{}>{}\n", user.id, name, user.email, role),
        None => format!("#{} <{}>{}\n", user.id, user.email, role),
    }
}

/// Format empty holdings message
pub fn format_empty_holdings() -> String {
    format!(
        "{} No items held\nAdd one using: {} items submit or {} items attach <id>\n",
        "ℹ".blue().bold(),
        "stash".bold(),
        "stash".bold()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::Day;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(id: i64, name: &str, price: Decimal) -> Item {
        Item {
            id,
            name: name.to_string(),
            image_ref: "img.png".to_string(),
            source_url: "https://example.com".to_string(),
            current_price: price,
            peak_price: price,
            moderation_status: ModerationStatus::None,
            owner_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_holdings_message() {
        let msg = format_empty_holdings();
        assert!(msg.contains("No items held"));
        assert!(msg.contains("items submit"));
    }

    #[test]
    fn test_holdings_table_shows_total() {
        colored::control::set_override(false);
        let holdings = vec![
            ItemWithCount {
                item: item(1, "Booster Box", dec!(120)),
                count: 2,
            },
            ItemWithCount {
                item: item(2, "Sleeve", dec!(3.5)),
                count: 10,
            },
        ];
        let out = format_holdings_table(&holdings, "$ ");
        assert!(out.contains("Booster Box"));
        assert!(out.contains("$ 240.00"));
        assert!(out.contains("$ 275.00"));
    }

    #[test]
    fn test_single_holding_shows_units_and_value() {
        colored::control::set_override(false);
        let holding = ItemWithCount {
            item: item(7, "Booster Box", dec!(120)),
            count: 3,
        };
        let out = format_holding(&holding, "$ ");
        assert!(out.contains("Booster Box (#7)"));
        assert!(out.contains("Units:   3"));
        assert!(out.contains("$ 360.00"));
    }

    #[test]
    fn test_history_first_row_has_no_change() {
        colored::control::set_override(false);
        let history = vec![
            Valuation {
                day: Day::from_ymd(2024, 1, 1).unwrap(),
                amount: dec!(100),
            },
            Valuation {
                day: Day::from_ymd(2024, 1, 5).unwrap(),
                amount: dec!(80),
            },
        ];
        let out = format_history_table(&history, "");
        assert!(out.contains("01/01/2024"));
        assert!(out.contains("-20.00"));
    }
}
