//! Money formatting for CLI output
//!
//! Amounts are shown with two decimals, `,` thousands separators and an
//! optional currency prefix taken from the config file.

use rust_decimal::Decimal;

/// Format a Decimal with two decimals and thousands separators.
///
/// # Examples
/// ```
/// use stash::utils::format_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_money(dec!(1234.5), "$ "), "$ 1,234.50");
/// assert_eq!(format_money(dec!(-500), ""), "-500.00");
/// ```
pub fn format_money(value: Decimal, symbol: &str) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs().round_dp(2));
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer_part.chars().collect();
    let mut with_separators = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            with_separators.push(',');
        }
        with_separators.push(*c);
    }

    let sign = if is_negative { "-" } else { "" };
    format!("{}{}{}.{}", symbol, sign, with_separators, decimal_part)
}
