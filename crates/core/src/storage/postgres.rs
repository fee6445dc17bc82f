use crate::domain::content::{
    AnalystProfile, Category, ContentModule, Dashboard, FlatFeedRecord, LayoutRecord, Stock,
    StockRef, Subscription,
};
use crate::store::{AnalystDirectory, DashboardLookup, FeedRecordStore, SubscriptionStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use std::collections::HashMap;

type FeedCardRow = (String, String, String, i32, Value, DateTime<Utc>, DateTime<Utc>);

const FEED_CARD_COLUMNS: &str =
    "analyst_username, stock_name, category_name, category_id, content, post_date, updated_date";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn load_stocks(&self, dashboard_id: i32) -> Result<Vec<Stock>> {
        let rows = sqlx::query_as::<_, (i32, String, i32, String, String)>(
            "SELECT s.id, s.name, r.id, r.name, r.ticker \
             FROM stocks s \
             JOIN stock_refs r ON r.id = s.stock_ref_id \
             WHERE s.dashboard_id = $1 \
             ORDER BY s.id ASC",
        )
        .bind(dashboard_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select stocks failed (dashboard_id={dashboard_id})"))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, ref_id, ref_name, ticker)| Stock {
                id,
                name,
                stock_ref: StockRef {
                    id: ref_id,
                    name: ref_name,
                    ticker,
                },
                categories: Vec::new(),
            })
            .collect())
    }

    async fn load_categories(&self, stock_ids: &[i32]) -> Result<Vec<(i32, Category)>> {
        let rows = sqlx::query_as::<_, (i32, i32, String)>(
            "SELECT stock_id, id, name \
             FROM categories \
             WHERE stock_id = ANY($1) \
             ORDER BY id ASC",
        )
        .bind(stock_ids)
        .fetch_all(&self.pool)
        .await
        .context("select categories failed")?;

        Ok(rows
            .into_iter()
            .map(|(stock_id, id, name)| {
                (
                    stock_id,
                    Category {
                        id,
                        name,
                        modules: Vec::new(),
                    },
                )
            })
            .collect())
    }

    async fn load_modules(&self, category_ids: &[i32]) -> Result<Vec<(i32, ContentModule)>> {
        let rows = sqlx::query_as::<_, (i32, i32, Value, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT category_id, id, content, post_date, updated_date \
             FROM modules \
             WHERE category_id = ANY($1) \
             ORDER BY id ASC",
        )
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await
        .context("select modules failed")?;

        Ok(rows
            .into_iter()
            .map(|(category_id, id, content, post_date, updated_date)| {
                (
                    category_id,
                    ContentModule {
                        id,
                        content,
                        post_date,
                        updated_date,
                    },
                )
            })
            .collect())
    }

    async fn fetch_cards(&self, sql: &str, username: &str) -> Result<Vec<FlatFeedRecord>> {
        let rows = sqlx::query_as::<_, FeedCardRow>(sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select feed_cards failed (analyst={username})"))?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn fetch_first_card(&self, sql: &str, username: &str) -> Result<Option<FlatFeedRecord>> {
        let row = sqlx::query_as::<_, FeedCardRow>(sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select first feed_card failed (analyst={username})"))?;
        Ok(row.map(into_record))
    }
}

fn into_record(row: FeedCardRow) -> FlatFeedRecord {
    let (analyst_username, stock_name, category_name, category_id, content, post_date, updated_date) =
        row;
    FlatFeedRecord {
        analyst_username,
        stock_name,
        stock_id: None,
        category_name,
        category_id,
        content,
        post_date,
        updated_date,
    }
}

#[async_trait::async_trait]
impl DashboardLookup for PgStore {
    async fn find_dashboard(&self, analyst_id: i32) -> Result<Option<Dashboard>> {
        let exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM dashboards WHERE id = $1")
            .bind(analyst_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select dashboard failed (id={analyst_id})"))?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stocks = self.load_stocks(analyst_id).await?;
        let stock_ids: Vec<i32> = stocks.iter().map(|s| s.id).collect();
        let categories = self.load_categories(&stock_ids).await?;
        let category_ids: Vec<i32> = categories.iter().map(|(_, c)| c.id).collect();

        let mut modules_by_category: HashMap<i32, Vec<ContentModule>> = HashMap::new();
        for (category_id, module) in self.load_modules(&category_ids).await? {
            modules_by_category.entry(category_id).or_default().push(module);
        }

        let mut categories_by_stock: HashMap<i32, Vec<Category>> = HashMap::new();
        for (stock_id, mut category) in categories {
            category.modules = modules_by_category.remove(&category.id).unwrap_or_default();
            categories_by_stock.entry(stock_id).or_default().push(category);
        }

        for stock in &mut stocks {
            stock.categories = categories_by_stock.remove(&stock.id).unwrap_or_default();
        }

        tracing::debug!(
            dashboard_id = analyst_id,
            stocks = stocks.len(),
            categories = category_ids.len(),
            "loaded dashboard tree"
        );

        Ok(Some(Dashboard {
            id: analyst_id,
            stocks,
        }))
    }

    async fn find_layouts_by_category(&self, category_id: i32) -> Result<Vec<LayoutRecord>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i32, i32, i32, i32)>(
            "SELECT id, category_id, module_id, height, width, x, y \
             FROM dashboard_layouts \
             WHERE category_id = $1 \
             ORDER BY id ASC",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select dashboard_layouts failed (category_id={category_id})"))?;

        Ok(rows
            .into_iter()
            .map(|(id, category_id, module_id, height, width, x, y)| LayoutRecord {
                id,
                category_id,
                module_id,
                height,
                width,
                x,
                y,
            })
            .collect())
    }

    async fn stock_refs(&self) -> Result<Vec<StockRef>> {
        let rows = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT id, name, ticker FROM stock_refs ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("select stock_refs failed")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, ticker)| StockRef { id, name, ticker })
            .collect())
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgStore {
    async fn find_by_subscriber(&self, subscriber_id: i32) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, (i32, String)>(
            "SELECT u.id, u.username \
             FROM subscriptions s \
             JOIN users u ON u.id = s.subscribed_to_id \
             WHERE s.subscriber_id = $1 \
             ORDER BY s.id ASC",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select subscriptions failed (subscriber_id={subscriber_id})"))?;

        Ok(rows
            .into_iter()
            .map(|(id, username)| Subscription {
                subscriber_id,
                analyst: AnalystProfile { username, id },
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl AnalystDirectory for PgStore {
    async fn find_analyst(&self, username: &str) -> Result<Option<AnalystProfile>> {
        let row = sqlx::query_as::<_, (i32, String)>(
            "SELECT id, username FROM users WHERE username = $1 LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select user failed (username={username})"))?;

        Ok(row.map(|(id, username)| AnalystProfile { username, id }))
    }
}

#[async_trait::async_trait]
impl FeedRecordStore for PgStore {
    async fn find_by_analyst(&self, username: &str) -> Result<Vec<FlatFeedRecord>> {
        let sql = format!(
            "SELECT {FEED_CARD_COLUMNS} FROM feed_cards \
             WHERE analyst_username = $1 \
             ORDER BY post_date DESC, id ASC"
        );
        self.fetch_cards(&sql, username).await
    }

    async fn find_by_analyst_after(
        &self,
        username: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FlatFeedRecord>> {
        // timestamptz cannot hold instants this early; every stored row is later.
        if cutoff.year() < 1 {
            return self.find_by_analyst(username).await;
        }

        let sql = format!(
            "SELECT {FEED_CARD_COLUMNS} FROM feed_cards \
             WHERE analyst_username = $1 AND post_date > $2 \
             ORDER BY post_date DESC, id ASC"
        );
        let rows = sqlx::query_as::<_, FeedCardRow>(&sql)
            .bind(username)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select windowed feed_cards failed (analyst={username})"))?;
        Ok(rows.into_iter().map(into_record).collect())
    }

    async fn find_page_by_analyst(
        &self,
        username: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FlatFeedRecord>, u64)> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_cards WHERE analyst_username = $1")
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("count feed_cards failed (analyst={username})"))?;
        let total = u64::try_from(total).unwrap_or(0);

        if offset < 0 || limit <= 0 {
            return Ok((Vec::new(), total));
        }

        let sql = format!(
            "SELECT {FEED_CARD_COLUMNS} FROM feed_cards \
             WHERE analyst_username = $1 \
             ORDER BY post_date DESC, id ASC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, FeedCardRow>(&sql)
            .bind(username)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select feed_cards page failed (analyst={username})"))?;

        Ok((rows.into_iter().map(into_record).collect(), total))
    }

    async fn find_first_by_post_date(&self, username: &str) -> Result<Option<FlatFeedRecord>> {
        let sql = format!(
            "SELECT {FEED_CARD_COLUMNS} FROM feed_cards \
             WHERE analyst_username = $1 \
             ORDER BY post_date DESC, id ASC \
             LIMIT 1"
        );
        self.fetch_first_card(&sql, username).await
    }

    async fn find_first_by_updated_date(
        &self,
        username: &str,
    ) -> Result<Option<FlatFeedRecord>> {
        let sql = format!(
            "SELECT {FEED_CARD_COLUMNS} FROM feed_cards \
             WHERE analyst_username = $1 \
             ORDER BY updated_date DESC, id ASC \
             LIMIT 1"
        );
        self.fetch_first_card(&sql, username).await
    }
}
