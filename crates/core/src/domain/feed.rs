use crate::domain::content::AnalystProfile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Stand-in for an id the feed path could not resolve. Items carrying it are
/// still emitted.
pub const UNRESOLVED_ID: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockView {
    pub name: String,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub id: i32,
}

/// Display-ready projection of one content module. The date strings are
/// rendered once at construction and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub profile: AnalystProfile,
    pub stock: StockView,
    pub category: CategoryView,
    pub content: Value,
    pub post_date: String,
    pub updated_date: String,
    #[serde(skip)]
    pub(crate) posted_at: DateTime<Utc>,
}

impl FeedItem {
    /// Source instant behind `post_date`; feed ordering uses this, not the string.
    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub content: Vec<FeedItem>,
    pub page: i64,
    pub size: i64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl FeedPage {
    pub fn new(content: Vec<FeedItem>, page: i64, size: i64, total_elements: u64) -> Self {
        let total_pages = match u64::try_from(size) {
            Ok(size) if size > 0 => total_elements.div_ceil(size),
            _ => 0,
        };

        Self {
            content,
            page,
            size,
            total_elements,
            total_pages,
        }
    }
}
