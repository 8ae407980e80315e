use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::day::Day;

/// Moderation state of a catalog item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    None,    // Visible to everyone
    Pending, // Self-submitted, visible only to its submitter
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::None => "NONE",
            ModerationStatus::Pending => "PENDING",
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(ModerationStatus::None),
            "PENDING" => Ok(ModerationStatus::Pending),
            _ => Err(format!("unknown moderation status '{}'", s)),
        }
    }
}

/// Catalog item (collectible/product)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub image_ref: String,
    pub source_url: String,
    pub current_price: Decimal,
    pub peak_price: Decimal,
    pub moderation_status: ModerationStatus,
    pub owner_user_id: Option<i64>, // Set only for non-privileged submissions
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Quarantined items belong to their submitter until promoted
    pub fn is_quarantined_for(&self, user: &User) -> bool {
        !user.is_privileged && self.owner_user_id == Some(user.id)
    }
}

/// User of the tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub display_name: Option<String>,
    pub email: String,
    pub is_privileged: bool,
    pub created_at: DateTime<Utc>,
}

/// One entry of an item's price history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricePoint {
    pub day: Day,
    pub price: Decimal,
}

/// One entry of a user's valuation ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Valuation {
    pub day: Day,
    pub amount: Decimal,
}

/// Item together with how many units a user holds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemWithCount {
    #[serde(flatten)]
    pub item: Item,
    pub count: i64,
}

impl ItemWithCount {
    /// Current price x units, `None` on overflow
    pub fn total_value(&self) -> Option<Decimal> {
        self.item.current_price.checked_mul(Decimal::from(self.count))
    }
}
