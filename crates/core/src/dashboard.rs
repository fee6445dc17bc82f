use crate::domain::content::{Dashboard, LayoutRecord, StockRef};
use crate::feed::{FeedError, FeedResult};
use crate::store::DashboardLookup;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardWithLayout {
    pub dashboard: Dashboard,
    pub layouts: Vec<LayoutRecord>,
}

/// The dashboard plus every layout record of every category, in stock then
/// category order.
pub async fn dashboard_with_layout<L: DashboardLookup + ?Sized>(
    lookup: &L,
    dashboard_id: i32,
) -> FeedResult<DashboardWithLayout> {
    let dashboard = lookup
        .find_dashboard(dashboard_id)
        .await?
        .ok_or(FeedError::NotFound)?;

    let mut layouts = Vec::new();
    for stock in &dashboard.stocks {
        for category in &stock.categories {
            layouts.extend(lookup.find_layouts_by_category(category.id).await?);
        }
    }

    Ok(DashboardWithLayout { dashboard, layouts })
}

pub async fn stock_refs<L: DashboardLookup + ?Sized>(
    lookup: &L,
) -> anyhow::Result<Vec<StockRef>> {
    lookup.stock_refs().await
}
