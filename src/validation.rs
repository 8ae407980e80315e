//! Input validation for ledger operations
//!
//! Raw inputs (CLI arguments or JSON payloads) are checked here before the
//! ledger is invoked. All issues are collected instead of failing on the
//! first error, and reported together as `LedgerError::Validation`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, Result};

/// Lowest accepted price for submissions and price updates
pub const MIN_PRICE: Decimal = Decimal::ONE;

/// Highest accepted price; keeps price x count arithmetic far from `Decimal::MAX`
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Most units a single operation may add or set
pub const MAX_COUNT: i64 = 10_000;

/// A validation issue found in an operation input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field name that has the issue (e.g., "price", "count")
    pub field: String,
    /// The problematic value
    pub value: String,
    /// Description of why this is an issue
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' {}", self.field, self.value, self.reason)
    }
}

/// Raw item submission payload
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSubmission {
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub url: String,
    pub count: i64,
}

/// Checked item submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub image_ref: String,
    pub source_url: String,
    pub price: Decimal,
    pub count: i64,
}

/// Checked request to add units of an existing item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachRequest {
    pub item_id: i64,
    pub count: i64,
}

/// Checked request to replace a holding count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountUpdate {
    pub item_id: i64,
    pub count: i64,
}

/// Checked request to record a new item price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceUpdate {
    pub item_id: i64,
    pub price: Decimal,
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn not_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.0
                .push(ValidationIssue::new(field, value, "must not be blank"));
        }
    }

    fn price(&mut self, value: Decimal) {
        if value < MIN_PRICE {
            self.0.push(ValidationIssue::new(
                "price",
                value.to_string(),
                format!("must be at least {}", MIN_PRICE),
            ));
        } else if value > MAX_PRICE {
            self.0.push(ValidationIssue::new(
                "price",
                value.to_string(),
                format!("must be at most {}", MAX_PRICE),
            ));
        }
    }

    fn count(&mut self, value: i64, min: i64) {
        if value < min {
            self.0.push(ValidationIssue::new(
                "count",
                value.to_string(),
                format!("must be at least {}", min),
            ));
        } else if value > MAX_COUNT {
            self.0.push(ValidationIssue::new(
                "count",
                value.to_string(),
                format!("must be at most {}", MAX_COUNT),
            ));
        }
    }

    fn finish<T>(self, value: T) -> Result<T> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(LedgerError::Validation(self.0).into())
        }
    }
}

pub fn validate_submission(input: &ItemSubmission) -> Result<NewItem> {
    let mut issues = Issues::default();
    issues.not_blank("name", &input.name);
    issues.not_blank("image", &input.image);
    issues.not_blank("url", &input.url);
    issues.price(input.price);
    issues.count(input.count, 1);

    issues.finish(NewItem {
        name: input.name.trim().to_string(),
        image_ref: input.image.trim().to_string(),
        source_url: input.url.trim().to_string(),
        price: input.price,
        count: input.count,
    })
}

pub fn validate_attach(item_id: i64, count: i64) -> Result<AttachRequest> {
    let mut issues = Issues::default();
    issues.count(count, 1);
    issues.finish(AttachRequest { item_id, count })
}

/// Negative counts are rejected here rather than sign-stripped by the ledger.
pub fn validate_count_update(item_id: i64, count: i64) -> Result<CountUpdate> {
    let mut issues = Issues::default();
    issues.count(count, 0);
    issues.finish(CountUpdate { item_id, count })
}

pub fn validate_price_update(item_id: i64, price: Decimal) -> Result<PriceUpdate> {
    let mut issues = Issues::default();
    issues.price(price);
    issues.finish(PriceUpdate { item_id, price })
}

pub fn validate_search(search: &str) -> Result<String> {
    let mut issues = Issues::default();
    issues.not_blank("search", search);
    issues.finish(search.trim().to_string())
}
