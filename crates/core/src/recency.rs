use crate::domain::content::{AnalystProfile, Dashboard};
use crate::store::{DashboardLookup, FeedRecordStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest activity of one analyst. Both values are [`DateTime::<Utc>::MIN_UTC`]
/// when the analyst has no content, so recency compares cleanly across analysts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recency {
    pub last_post: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Default for Recency {
    fn default() -> Self {
        Self {
            last_post: DateTime::<Utc>::MIN_UTC,
            last_update: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl Recency {
    pub fn of_dashboard(dashboard: &Dashboard) -> Self {
        dashboard.modules().fold(Self::default(), |acc, module| Self {
            last_post: acc.last_post.max(module.post_date),
            last_update: acc.last_update.max(module.updated_date),
        })
    }

    pub fn has_content(&self) -> bool {
        self.last_post != DateTime::<Utc>::MIN_UTC
    }
}

/// Full walk over the analyst's dashboard tree.
pub async fn resolve<L: DashboardLookup + ?Sized>(
    lookup: &L,
    analyst_id: i32,
) -> Result<Recency> {
    let recency = match lookup.find_dashboard(analyst_id).await? {
        Some(dashboard) => Recency::of_dashboard(&dashboard),
        None => Recency::default(),
    };
    tracing::debug!(analyst_id, ?recency, "resolved analyst recency");
    Ok(recency)
}

pub async fn last_post_time<L: DashboardLookup + ?Sized>(
    lookup: &L,
    analyst_id: i32,
) -> Result<DateTime<Utc>> {
    Ok(resolve(lookup, analyst_id).await?.last_post)
}

pub async fn last_update_time<L: DashboardLookup + ?Sized>(
    lookup: &L,
    analyst_id: i32,
) -> Result<DateTime<Utc>> {
    Ok(resolve(lookup, analyst_id).await?.last_update)
}

/// Same answer as [`resolve`], read from the flat projection's
/// newest-by-post and newest-by-update records.
pub async fn resolve_from_records<S: FeedRecordStore + ?Sized>(
    store: &S,
    analyst: &AnalystProfile,
) -> Result<Recency> {
    let last_post = store
        .find_first_by_post_date(&analyst.username)
        .await?
        .map(|r| r.post_date)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let last_update = store
        .find_first_by_updated_date(&analyst.username)
        .await?
        .map(|r| r.updated_date)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    Ok(Recency {
        last_post,
        last_update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::{Category, ContentModule, Stock, StockRef};
    use crate::storage::memory::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap()
    }

    fn module(id: i32, posted_days: i64, updated_days: i64) -> ContentModule {
        ContentModule {
            id,
            content: json!({}),
            post_date: base() + Duration::days(posted_days),
            updated_date: base() + Duration::days(updated_days),
        }
    }

    fn stock(id: i32, categories: Vec<Category>) -> Stock {
        Stock {
            id,
            name: format!("stock {id}"),
            stock_ref: StockRef {
                id,
                name: format!("stock {id}"),
                ticker: format!("T{id}"),
            },
            categories,
        }
    }

    fn store() -> (MemoryStore, AnalystProfile) {
        let analyst = AnalystProfile {
            username: "anna".to_string(),
            id: 1,
        };
        let dashboard = Dashboard {
            id: 1,
            stocks: vec![
                stock(
                    10,
                    vec![Category {
                        id: 100,
                        name: "News".to_string(),
                        // Newest post, but edited long ago.
                        modules: vec![module(1, 5, 5), module(2, 1, 1)],
                    }],
                ),
                stock(
                    11,
                    vec![Category {
                        id: 110,
                        name: "Valuation".to_string(),
                        // Old post, edited most recently.
                        modules: vec![module(3, 0, 9)],
                    }],
                ),
            ],
        };
        let store = MemoryStore::new()
            .with_analyst(analyst.clone())
            .with_dashboard(dashboard);
        (store, analyst)
    }

    #[tokio::test]
    async fn walks_every_stock_and_category() {
        let (store, analyst) = store();
        let recency = resolve(&store, analyst.id).await.unwrap();
        assert_eq!(recency.last_post, base() + Duration::days(5));
        assert_eq!(recency.last_update, base() + Duration::days(9));
        assert!(recency.has_content());
    }

    #[tokio::test]
    async fn aliases_agree_with_resolve() {
        let (store, analyst) = store();
        let recency = resolve(&store, analyst.id).await.unwrap();
        assert_eq!(
            last_post_time(&store, analyst.id).await.unwrap(),
            recency.last_post
        );
        assert_eq!(
            last_update_time(&store, analyst.id).await.unwrap(),
            recency.last_update
        );
    }

    #[tokio::test]
    async fn record_path_agrees_with_tree_walk() {
        let (store, analyst) = store();
        let walked = resolve(&store, analyst.id).await.unwrap();
        let queried = resolve_from_records(&store, &analyst).await.unwrap();
        assert_eq!(walked, queried);
    }

    #[tokio::test]
    async fn missing_dashboard_is_min_sentinel() {
        let store = MemoryStore::new();
        let recency = resolve(&store, 42).await.unwrap();
        assert_eq!(recency, Recency::default());
        assert_eq!(recency.last_post, DateTime::<Utc>::MIN_UTC);
        assert!(!recency.has_content());
    }

    #[tokio::test]
    async fn dashboard_without_modules_is_min_sentinel() {
        let analyst = AnalystProfile {
            username: "bare".to_string(),
            id: 2,
        };
        let store = MemoryStore::new()
            .with_analyst(analyst.clone())
            .with_dashboard(Dashboard {
                id: 2,
                stocks: vec![stock(20, Vec::new())],
            });

        assert_eq!(resolve(&store, 2).await.unwrap(), Recency::default());
        assert_eq!(
            resolve_from_records(&store, &analyst).await.unwrap(),
            Recency::default()
        );
    }
}
