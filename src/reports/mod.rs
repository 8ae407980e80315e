// Read-only projections over the catalog, holdings and valuation ledger

pub mod catalog;
pub mod portfolio;

pub use catalog::{
    autocomplete, catalog, item_detail, price_history, HolderRef, ItemDetail,
};
pub use portfolio::{
    item_with_count, last_known_valuation, list_holdings_with_count,
    most_valuable_distinct_holdings, portfolio_statistics, portfolio_value, valuation_history,
    PortfolioStatistics,
};
