use crate::domain::content::{FlatFeedRecord, Subscription};
use crate::domain::feed::{FeedItem, FeedPage};
use crate::feed::projector::{project, sort_newest_first};
use crate::feed::{FeedError, FeedResult};
use crate::store::{AnalystDirectory, FeedRecordStore, SubscriptionStore};
use crate::time::zone::{window_cutoff, Cutoff, FeedTimeZone};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const WEEK_DAYS: i64 = 7;

/// Builds subscriber and analyst feeds from the flat feed projection.
pub struct FeedAssembler<'a, S> {
    store: &'a S,
}

impl<'a, S> FeedAssembler<'a, S>
where
    S: SubscriptionStore + FeedRecordStore + AnalystDirectory,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Everything posted by every analyst the subscriber follows, newest first.
    pub async fn full_feed(
        &self,
        subscriber_id: i32,
        zone: &FeedTimeZone,
    ) -> FeedResult<Vec<FeedItem>> {
        let subscriptions = self.subscriptions(subscriber_id).await?;

        let mut analyst_ids = HashMap::new();
        let mut records = Vec::new();
        for subscription in subscriptions {
            let analyst = subscription.analyst;
            records.extend(self.store.find_by_analyst(&analyst.username).await?);
            analyst_ids.insert(analyst.username, analyst.id);
        }

        if records.is_empty() {
            return Err(FeedError::NoContent);
        }

        let items = into_sorted_items(records, &analyst_ids, zone);
        tracing::debug!(subscriber_id, items = items.len(), "assembled full feed");
        Ok(items)
    }

    /// Items posted strictly after `now - days`. An empty window is a valid,
    /// empty result.
    pub async fn windowed_feed(
        &self,
        subscriber_id: i32,
        days: i64,
        now: DateTime<Utc>,
        zone: &FeedTimeZone,
    ) -> FeedResult<Vec<FeedItem>> {
        let subscriptions = self.subscriptions(subscriber_id).await?;
        let cutoff = window_cutoff(now, days);

        let mut analyst_ids = HashMap::new();
        let mut records = Vec::new();
        for subscription in subscriptions {
            let analyst = subscription.analyst;
            match cutoff {
                Cutoff::AllTime => {
                    records.extend(self.store.find_by_analyst(&analyst.username).await?);
                }
                Cutoff::After(after) => {
                    records.extend(
                        self.store
                            .find_by_analyst_after(&analyst.username, after)
                            .await?,
                    );
                }
                Cutoff::Nothing => {}
            }
            analyst_ids.insert(analyst.username, analyst.id);
        }

        let items = into_sorted_items(records, &analyst_ids, zone);
        tracing::debug!(
            subscriber_id,
            days,
            ?cutoff,
            items = items.len(),
            "assembled windowed feed"
        );
        Ok(items)
    }

    pub async fn weekly_feed(
        &self,
        subscriber_id: i32,
        now: DateTime<Utc>,
        zone: &FeedTimeZone,
    ) -> FeedResult<Vec<FeedItem>> {
        self.windowed_feed(subscriber_id, WEEK_DAYS, now, zone).await
    }

    /// One 0-based page of a single analyst's items, newest first. Pages past
    /// the end, negative pages and non-positive sizes yield an empty page.
    pub async fn analyst_page(
        &self,
        username: &str,
        page: i64,
        size: i64,
        zone: &FeedTimeZone,
    ) -> FeedResult<FeedPage> {
        let analyst = self
            .store
            .find_analyst(username)
            .await?
            .ok_or(FeedError::NotFound)?;

        let (offset, limit) = match page.checked_mul(size) {
            Some(offset) if page >= 0 && size > 0 => (offset, size),
            _ => (0, 0),
        };

        let (records, total) = self
            .store
            .find_page_by_analyst(&analyst.username, offset, limit)
            .await?;

        let analyst_ids = HashMap::from([(analyst.username, analyst.id)]);
        let items = into_sorted_items(records, &analyst_ids, zone);
        Ok(FeedPage::new(items, page, size, total))
    }

    async fn subscriptions(&self, subscriber_id: i32) -> FeedResult<Vec<Subscription>> {
        let subscriptions = self.store.find_by_subscriber(subscriber_id).await?;
        if subscriptions.is_empty() {
            tracing::debug!(subscriber_id, "subscriber has no subscriptions");
            return Err(FeedError::NoContent);
        }
        Ok(subscriptions)
    }
}

fn into_sorted_items(
    records: Vec<FlatFeedRecord>,
    analyst_ids: &HashMap<String, i32>,
    zone: &FeedTimeZone,
) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = records
        .into_iter()
        .map(|r| {
            let analyst_id = analyst_ids.get(&r.analyst_username).copied();
            project(r, analyst_id, zone)
        })
        .collect();
    sort_newest_first(&mut items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::{
        AnalystProfile, Category, ContentModule, Dashboard, Stock, StockRef,
    };
    use crate::domain::feed::UNRESOLVED_ID;
    use crate::storage::memory::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    const SUBSCRIBER: i32 = 1;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap()
    }

    fn analyst(id: i32, username: &str) -> AnalystProfile {
        AnalystProfile {
            username: username.to_string(),
            id,
        }
    }

    fn dashboard(owner: i32, posted: &[DateTime<Utc>]) -> Dashboard {
        let modules = posted
            .iter()
            .enumerate()
            .map(|(i, p)| ContentModule {
                id: owner * 100 + i as i32,
                content: json!({"owner": owner, "n": i}),
                post_date: *p,
                updated_date: *p,
            })
            .collect();

        Dashboard {
            id: owner,
            stocks: vec![Stock {
                id: owner * 10,
                name: "Volvo".to_string(),
                stock_ref: StockRef {
                    id: 1,
                    name: "Volvo".to_string(),
                    ticker: "VOLV-B".to_string(),
                },
                categories: vec![Category {
                    id: owner * 10 + 1,
                    name: "News".to_string(),
                    modules,
                }],
            }],
        }
    }

    /// Subscriber follows B (posted 10 days ago) and C (posted 2 days ago).
    fn two_analyst_store() -> MemoryStore {
        let b = analyst(2, "bertil");
        let c = analyst(3, "cecilia");
        MemoryStore::new()
            .with_analyst(b.clone())
            .with_analyst(c.clone())
            .with_dashboard(dashboard(2, &[now() - Duration::days(10)]))
            .with_dashboard(dashboard(3, &[now() - Duration::days(2)]))
            .with_subscription(SUBSCRIBER, &b)
            .with_subscription(SUBSCRIBER, &c)
    }

    fn usernames(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.profile.username.as_str()).collect()
    }

    #[tokio::test]
    async fn full_feed_is_newest_first_across_analysts() {
        let store = two_analyst_store();
        let feed = FeedAssembler::new(&store)
            .full_feed(SUBSCRIBER, &FeedTimeZone::default())
            .await
            .unwrap();

        assert_eq!(usernames(&feed), vec!["cecilia", "bertil"]);
        assert_eq!(feed[0].profile.id, 3);
        assert_eq!(feed[1].profile.id, 2);
    }

    #[tokio::test]
    async fn full_feed_never_increases() {
        let b = analyst(2, "bertil");
        let c = analyst(3, "cecilia");
        let t = now();
        let store = MemoryStore::new()
            .with_analyst(b.clone())
            .with_analyst(c.clone())
            .with_dashboard(dashboard(
                2,
                &[t - Duration::hours(5), t - Duration::days(40), t],
            ))
            .with_dashboard(dashboard(3, &[t - Duration::hours(1), t - Duration::days(3)]))
            .with_subscription(SUBSCRIBER, &b)
            .with_subscription(SUBSCRIBER, &c);

        let feed = FeedAssembler::new(&store)
            .full_feed(SUBSCRIBER, &FeedTimeZone::default())
            .await
            .unwrap();

        assert_eq!(feed.len(), 5);
        assert!(feed.windows(2).all(|w| w[0].posted_at() >= w[1].posted_at()));
    }

    #[tokio::test]
    async fn no_subscriptions_is_no_content() {
        let store = two_analyst_store();
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        assert!(matches!(
            assembler.full_feed(99, &zone).await,
            Err(FeedError::NoContent)
        ));
        assert!(matches!(
            assembler.windowed_feed(99, 7, now(), &zone).await,
            Err(FeedError::NoContent)
        ));
    }

    #[tokio::test]
    async fn full_feed_without_any_items_is_no_content() {
        let lonely = analyst(4, "dagny");
        let store = MemoryStore::new()
            .with_analyst(lonely.clone())
            .with_subscription(SUBSCRIBER, &lonely);

        let res = FeedAssembler::new(&store)
            .full_feed(SUBSCRIBER, &FeedTimeZone::default())
            .await;
        assert!(matches!(res, Err(FeedError::NoContent)));
    }

    #[tokio::test]
    async fn seven_day_window_keeps_only_recent_items() {
        let store = two_analyst_store();
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        let week = assembler
            .windowed_feed(SUBSCRIBER, 7, now(), &zone)
            .await
            .unwrap();
        assert_eq!(usernames(&week), vec!["cecilia"]);

        let weekly = assembler.weekly_feed(SUBSCRIBER, now(), &zone).await.unwrap();
        assert_eq!(weekly, week);
    }

    #[tokio::test]
    async fn windowed_feed_is_subset_of_full_feed() {
        let store = two_analyst_store();
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        let full = assembler.full_feed(SUBSCRIBER, &zone).await.unwrap();
        for days in [0, 1, 3, 7, 10, 11, 365] {
            let window = assembler
                .windowed_feed(SUBSCRIBER, days, now(), &zone)
                .await
                .unwrap();
            let cutoff = now() - Duration::days(days);
            assert!(window.iter().all(|i| i.posted_at() > cutoff));
            assert!(window.iter().all(|i| full.contains(i)));
        }
    }

    #[tokio::test]
    async fn empty_window_is_ok_and_empty() {
        let b = analyst(2, "bertil");
        let store = MemoryStore::new()
            .with_analyst(b.clone())
            .with_dashboard(dashboard(2, &[now() - Duration::days(10)]))
            .with_subscription(SUBSCRIBER, &b);

        let window = FeedAssembler::new(&store)
            .windowed_feed(SUBSCRIBER, 5, now(), &FeedTimeZone::default())
            .await
            .unwrap();
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn extreme_windows_are_defined() {
        let store = two_analyst_store();
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        let everything = assembler
            .windowed_feed(SUBSCRIBER, i64::MAX, now(), &zone)
            .await
            .unwrap();
        assert_eq!(everything.len(), 2);

        for days in [-1, i64::MIN] {
            let nothing = assembler
                .windowed_feed(SUBSCRIBER, days, now(), &zone)
                .await
                .unwrap();
            assert!(nothing.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_analyst_is_not_found() {
        let store = two_analyst_store();
        let res = FeedAssembler::new(&store)
            .analyst_page("nobody", 0, 10, &FeedTimeZone::default())
            .await;
        assert!(matches!(res, Err(FeedError::NotFound)));
    }

    #[tokio::test]
    async fn known_analyst_without_content_is_an_empty_page() {
        let store = MemoryStore::new().with_analyst(analyst(5, "erik"));
        let page = FeedAssembler::new(&store)
            .analyst_page("erik", 0, 10, &FeedTimeZone::default())
            .await
            .unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn pages_partition_the_analyst_feed() {
        let b = analyst(2, "bertil");
        let posted: Vec<_> = (0..23).map(|h| now() - Duration::hours(h)).collect();
        let store = MemoryStore::new()
            .with_analyst(b.clone())
            .with_dashboard(dashboard(2, &posted));
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        let mut seen = Vec::new();
        let mut page_no = 0;
        loop {
            let page = assembler
                .analyst_page("bertil", page_no, 10, &zone)
                .await
                .unwrap();
            assert_eq!(page.total_elements, 23);
            assert_eq!(page.total_pages, 3);
            if page.content.is_empty() {
                break;
            }
            assert!(page.content.iter().all(|i| i.profile.id == 2));
            seen.extend(page.content);
            page_no += 1;
        }

        assert_eq!(page_no, 3);
        assert_eq!(seen.len(), 23);
        assert!(seen.windows(2).all(|w| w[0].posted_at() >= w[1].posted_at()));
    }

    #[tokio::test]
    async fn degenerate_page_arguments_yield_empty_pages() {
        let b = analyst(2, "bertil");
        let store = MemoryStore::new()
            .with_analyst(b.clone())
            .with_dashboard(dashboard(2, &[now(), now() - Duration::days(1)]));
        let assembler = FeedAssembler::new(&store);
        let zone = FeedTimeZone::default();

        for (page, size) in [(-1, 10), (0, 0), (0, -5), (i64::MAX, i64::MAX), (50, 10)] {
            let res = assembler
                .analyst_page("bertil", page, size, &zone)
                .await
                .unwrap();
            assert!(res.content.is_empty(), "page={page} size={size}");
            assert_eq!(res.total_elements, 2);
        }
    }

    #[tokio::test]
    async fn flat_path_reports_unresolved_stock_id() {
        let store = two_analyst_store();
        let feed = FeedAssembler::new(&store)
            .full_feed(SUBSCRIBER, &FeedTimeZone::default())
            .await
            .unwrap();
        assert!(feed.iter().all(|i| i.stock.id == UNRESOLVED_ID));
        assert!(feed.iter().all(|i| i.stock.name == "Volvo"));
    }
}
