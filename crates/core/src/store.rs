//! Read-side interfaces to the persisted entity graph. The engine only ever
//! reads through these; writes belong to the CRUD layer.

use crate::domain::content::{
    AnalystProfile, Dashboard, FlatFeedRecord, LayoutRecord, StockRef, Subscription,
};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Analyst id → dashboard, shared by coverage, recency and the dashboard view.
#[async_trait::async_trait]
pub trait DashboardLookup: Send + Sync {
    async fn find_dashboard(&self, analyst_id: i32) -> Result<Option<Dashboard>>;

    async fn find_layouts_by_category(&self, category_id: i32) -> Result<Vec<LayoutRecord>>;

    async fn stock_refs(&self) -> Result<Vec<StockRef>>;
}

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_by_subscriber(&self, subscriber_id: i32) -> Result<Vec<Subscription>>;
}

#[async_trait::async_trait]
pub trait AnalystDirectory: Send + Sync {
    async fn find_analyst(&self, username: &str) -> Result<Option<AnalystProfile>>;
}

/// Flat projection of every content module, keyed by owning analyst.
/// All list queries return records ordered by post date, newest first.
#[async_trait::async_trait]
pub trait FeedRecordStore: Send + Sync {
    async fn find_by_analyst(&self, username: &str) -> Result<Vec<FlatFeedRecord>>;

    /// Records posted strictly after `cutoff`.
    async fn find_by_analyst_after(
        &self,
        username: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FlatFeedRecord>>;

    /// One slice of `find_by_analyst` plus the total record count.
    async fn find_page_by_analyst(
        &self,
        username: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FlatFeedRecord>, u64)>;

    async fn find_first_by_post_date(&self, username: &str) -> Result<Option<FlatFeedRecord>>;

    async fn find_first_by_updated_date(&self, username: &str)
        -> Result<Option<FlatFeedRecord>>;
}
