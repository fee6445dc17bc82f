use crate::domain::content::{AnalystProfile, Dashboard, FlatFeedRecord};
use crate::domain::feed::{CategoryView, FeedItem, StockView, UNRESOLVED_ID};
use crate::time::zone::FeedTimeZone;

/// Walks stock → category → module and emits one record per module, in tree
/// order. The dashboard-local stock id is kept.
pub fn flatten_dashboard(owner_username: &str, dashboard: &Dashboard) -> Vec<FlatFeedRecord> {
    let mut out = Vec::new();
    for stock in &dashboard.stocks {
        for category in &stock.categories {
            for module in &category.modules {
                out.push(FlatFeedRecord {
                    analyst_username: owner_username.to_string(),
                    stock_name: stock.name.clone(),
                    stock_id: Some(stock.id),
                    category_name: category.name.clone(),
                    category_id: category.id,
                    content: module.content.clone(),
                    post_date: module.post_date,
                    updated_date: module.updated_date,
                });
            }
        }
    }
    out
}

/// Builds the feed item for one record. Missing ids degrade to
/// [`UNRESOLVED_ID`]; the item itself is always produced.
pub fn project(record: FlatFeedRecord, analyst_id: Option<i32>, zone: &FeedTimeZone) -> FeedItem {
    FeedItem {
        profile: AnalystProfile {
            username: record.analyst_username,
            id: analyst_id.unwrap_or(UNRESOLVED_ID),
        },
        stock: StockView {
            name: record.stock_name,
            id: record.stock_id.unwrap_or(UNRESOLVED_ID),
        },
        category: CategoryView {
            name: record.category_name,
            id: record.category_id,
        },
        content: record.content,
        post_date: zone.format(record.post_date),
        updated_date: zone.format(record.updated_date),
        posted_at: record.post_date,
    }
}

/// Newest first. `sort_by` is stable, so equal post instants keep input order.
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
}
