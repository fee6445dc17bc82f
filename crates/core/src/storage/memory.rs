use crate::domain::content::{
    AnalystProfile, Dashboard, FlatFeedRecord, LayoutRecord, StockRef, Subscription,
};
use crate::feed::projector::flatten_dashboard;
use crate::store::{AnalystDirectory, DashboardLookup, FeedRecordStore, SubscriptionStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// In-process store over a materialized entity graph. Feed records are derived
/// by flattening dashboards, with the same shape the Postgres `feed_cards`
/// projection returns (no stock id).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    analysts: Vec<AnalystProfile>,
    dashboards: HashMap<i32, Dashboard>,
    subscriptions: Vec<Subscription>,
    layouts: Vec<LayoutRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyst(mut self, analyst: AnalystProfile) -> Self {
        self.analysts.push(analyst);
        self
    }

    pub fn with_dashboard(mut self, dashboard: Dashboard) -> Self {
        self.dashboards.insert(dashboard.id, dashboard);
        self
    }

    pub fn with_subscription(mut self, subscriber_id: i32, analyst: &AnalystProfile) -> Self {
        let exists = self
            .subscriptions
            .iter()
            .any(|s| s.subscriber_id == subscriber_id && s.analyst.id == analyst.id);
        if !exists {
            self.subscriptions.push(Subscription {
                subscriber_id,
                analyst: analyst.clone(),
            });
        }
        self
    }

    pub fn with_layout(mut self, layout: LayoutRecord) -> Self {
        self.layouts.push(layout);
        self
    }

    fn records_for(&self, username: &str) -> Vec<FlatFeedRecord> {
        let Some(analyst) = self.analysts.iter().find(|a| a.username == username) else {
            return Vec::new();
        };
        let Some(dashboard) = self.dashboards.get(&analyst.id) else {
            return Vec::new();
        };

        let mut records = flatten_dashboard(&analyst.username, dashboard);
        for record in &mut records {
            record.stock_id = None;
        }
        records.sort_by(|a, b| b.post_date.cmp(&a.post_date));
        records
    }
}

#[async_trait::async_trait]
impl DashboardLookup for MemoryStore {
    async fn find_dashboard(&self, analyst_id: i32) -> Result<Option<Dashboard>> {
        Ok(self.dashboards.get(&analyst_id).cloned())
    }

    async fn find_layouts_by_category(&self, category_id: i32) -> Result<Vec<LayoutRecord>> {
        Ok(self
            .layouts
            .iter()
            .filter(|l| l.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn stock_refs(&self) -> Result<Vec<StockRef>> {
        let mut refs: Vec<StockRef> = self
            .dashboards
            .values()
            .flat_map(|d| d.stocks.iter().map(|s| s.stock_ref.clone()))
            .collect();
        refs.sort_by_key(|r| r.id);
        refs.dedup_by_key(|r| r.id);
        Ok(refs)
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_by_subscriber(&self, subscriber_id: i32) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == subscriber_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl AnalystDirectory for MemoryStore {
    async fn find_analyst(&self, username: &str) -> Result<Option<AnalystProfile>> {
        Ok(self.analysts.iter().find(|a| a.username == username).cloned())
    }
}

#[async_trait::async_trait]
impl FeedRecordStore for MemoryStore {
    async fn find_by_analyst(&self, username: &str) -> Result<Vec<FlatFeedRecord>> {
        Ok(self.records_for(username))
    }

    async fn find_by_analyst_after(
        &self,
        username: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FlatFeedRecord>> {
        let mut records = self.records_for(username);
        records.retain(|r| r.post_date > cutoff);
        Ok(records)
    }

    async fn find_page_by_analyst(
        &self,
        username: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FlatFeedRecord>, u64)> {
        let records = self.records_for(username);
        let total = records.len() as u64;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);
        let page = records.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_first_by_post_date(&self, username: &str) -> Result<Option<FlatFeedRecord>> {
        Ok(self.records_for(username).into_iter().next())
    }

    async fn find_first_by_updated_date(
        &self,
        username: &str,
    ) -> Result<Option<FlatFeedRecord>> {
        Ok(self
            .records_for(username)
            .into_iter()
            .reduce(|best, r| if r.updated_date > best.updated_date { r } else { best }))
    }
}
