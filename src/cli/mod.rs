use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "stash")]
#[command(version, about = "Collectibles inventory tracker with daily portfolio valuation")]
#[command(
    long_about = "Catalog collectibles with their price history, track how many units you hold, and follow the total value of your collection day by day."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Email of the acting user (overrides STASH_USER and the config file)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Path to the SQLite database (overrides STASH_DB and the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Ledger day for the operation (DD/MM/YYYY, defaults to today)
    #[arg(long = "as-of", global = true)]
    pub as_of: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// User management
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Catalog items and holdings changes
    Items {
        #[command(subcommand)]
        action: ItemCommands,
    },

    /// List the items you hold with their unit counts
    Holdings,

    /// Show one item you hold with your unit count
    Holding {
        /// Item ID
        item_id: i64,
    },

    /// Show portfolio statistics (units, last valuation, top items)
    Stats,

    /// Show the day-by-day valuation of your portfolio
    History,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user
    Add {
        /// Email address (unique)
        email: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Grant catalog moderation rights
        #[arg(long)]
        privileged: bool,
    },

    /// Show a user by email
    Show { email: String },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Submit a new item and add it to your holdings
    Submit {
        #[arg(long)]
        name: String,

        /// Image reference (path or URL)
        #[arg(long)]
        image: String,

        /// Current price (minimum 1)
        #[arg(long)]
        price: String,

        /// Source page of the item
        #[arg(long)]
        url: String,

        /// Units to add
        #[arg(long, default_value_t = 1)]
        count: i64,
    },

    /// Add units of an existing item to your holdings
    Attach {
        item_id: i64,

        #[arg(default_value_t = 1)]
        count: i64,
    },

    /// Remove all units of an item from your holdings
    Detach { item_id: i64 },

    /// Replace the number of units you hold of an item
    Count {
        item_id: i64,

        #[arg(allow_negative_numbers = true)]
        count: i64,
    },

    /// Record a new price for an item
    Price { item_id: i64, price: String },

    /// Re-apply a price change to a holder the last price update failed to revalue
    Retry {
        item_id: i64,

        /// Email of the holder to revalue
        holder: String,

        /// Price before the failed update
        #[arg(long = "from")]
        old_price: String,
    },

    /// Delete an item from the catalog (privileged users only)
    Delete { item_id: i64 },

    /// Show an item with its price history and holders
    Show { item_id: i64 },

    /// Suggest catalog items you don't hold yet
    Search { text: String },

    /// List every catalog item, newest first
    Catalog,
}
