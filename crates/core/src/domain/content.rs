use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a user as seen by the feed engine. Analysts and subscribers
/// share the same identity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalystProfile {
    pub username: String,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: i32,
    pub analyst: AnalystProfile,
}

/// Canonical instrument reference, shared by every dashboard that covers it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockRef {
    pub id: i32,
    pub name: String,
    pub ticker: String,
}

/// Root content container of one analyst. The dashboard id is the owner's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: i32,
    pub stocks: Vec<Stock>,
}

/// Per-dashboard covering record for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: i32,
    pub name: String,
    pub stock_ref: StockRef,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub modules: Vec<ContentModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentModule {
    pub id: i32,
    pub content: Value,
    pub post_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// Layout metadata for a module inside a category. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub id: i32,
    pub category_id: i32,
    pub module_id: i32,
    pub height: i32,
    pub width: i32,
    pub x: i32,
    pub y: i32,
}

/// One content module with its ancestors already flattened in, as produced by
/// the store's feed projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatFeedRecord {
    pub analyst_username: String,
    pub stock_name: String,
    /// `None` when the projection cannot recover the dashboard-local stock id.
    pub stock_id: Option<i32>,
    pub category_name: String,
    pub category_id: i32,
    pub content: Value,
    pub post_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl Dashboard {
    pub fn modules(&self) -> impl Iterator<Item = &ContentModule> {
        self.stocks
            .iter()
            .flat_map(|stock| stock.categories.iter())
            .flat_map(|category| category.modules.iter())
    }
}
