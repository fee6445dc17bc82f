use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onlyfin_core::coverage::{CoverageMap, CoverageSource, DashboardWalk};
use onlyfin_core::dashboard::DashboardWithLayout;
use onlyfin_core::domain::content::{AnalystProfile, StockRef};
use onlyfin_core::domain::feed::{FeedItem, FeedPage};
use onlyfin_core::feed::assembler::FeedAssembler;
use onlyfin_core::feed::FeedError;
use onlyfin_core::recency::Recency;
use onlyfin_core::storage::postgres::PgStore;
use onlyfin_core::store::AnalystDirectory;
use onlyfin_core::time::zone::FeedTimeZone;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = onlyfin_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let default_zone = settings.default_time_zone()?;

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match onlyfin_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState { pool, default_zone };

    let app = router(state)
        .layer(cors_layer(&settings.cors_allowed_origins))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, zone = %default_zone.tz(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/subscribers/:subscriber_id/feed", get(get_full_feed))
        .route("/subscribers/:subscriber_id/feed/week", get(get_weekly_feed))
        .route("/subscribers/:subscriber_id/feed/days", get(get_windowed_feed))
        .route("/analysts/:username/feed", get(get_analyst_feed))
        .route("/analysts/:username/recency", get(get_analyst_recency))
        .route("/coverage", post(post_coverage))
        .route("/dashboards/:dashboard_id", get(get_dashboard))
        .route("/stock-refs", get(get_stock_refs))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
    default_zone: FeedTimeZone,
}

impl AppState {
    fn store(&self) -> Result<PgStore, StatusCode> {
        let Some(pool) = &self.pool else {
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        };
        Ok(PgStore::new(pool.clone()))
    }

    fn zone(&self, requested: Option<&str>) -> Result<FeedTimeZone, StatusCode> {
        match requested {
            Some(name) => FeedTimeZone::parse(name).map_err(|_| StatusCode::BAD_REQUEST),
            None => Ok(self.default_zone),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZoneQuery {
    zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: i64,
    zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    size: Option<i64>,
    zone: Option<String>,
}

fn feed_status(err: FeedError) -> StatusCode {
    match err {
        FeedError::NotFound => StatusCode::NOT_FOUND,
        FeedError::NoContent => StatusCode::NO_CONTENT,
        FeedError::Store(e) => internal_error(e),
    }
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "store request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_full_feed(
    State(state): State<AppState>,
    Path(subscriber_id): Path<i32>,
    Query(q): Query<ZoneQuery>,
) -> Result<Json<Vec<FeedItem>>, StatusCode> {
    let store = state.store()?;
    let zone = state.zone(q.zone.as_deref())?;

    let items = FeedAssembler::new(&store)
        .full_feed(subscriber_id, &zone)
        .await
        .map_err(feed_status)?;

    Ok(Json(items))
}

async fn get_weekly_feed(
    State(state): State<AppState>,
    Path(subscriber_id): Path<i32>,
    Query(q): Query<ZoneQuery>,
) -> Result<Json<Vec<FeedItem>>, StatusCode> {
    let store = state.store()?;
    let zone = state.zone(q.zone.as_deref())?;

    let items = FeedAssembler::new(&store)
        .weekly_feed(subscriber_id, Utc::now(), &zone)
        .await
        .map_err(feed_status)?;

    Ok(Json(items))
}

async fn get_windowed_feed(
    State(state): State<AppState>,
    Path(subscriber_id): Path<i32>,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Vec<FeedItem>>, StatusCode> {
    let store = state.store()?;
    let zone = state.zone(q.zone.as_deref())?;

    let items = FeedAssembler::new(&store)
        .windowed_feed(subscriber_id, q.days, Utc::now(), &zone)
        .await
        .map_err(feed_status)?;

    Ok(Json(items))
}

async fn get_analyst_feed(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<FeedPage>, StatusCode> {
    let store = state.store()?;
    let zone = state.zone(q.zone.as_deref())?;

    let page = FeedAssembler::new(&store)
        .analyst_page(
            &username,
            q.page.unwrap_or(0),
            q.size.unwrap_or(DEFAULT_PAGE_SIZE),
            &zone,
        )
        .await
        .map_err(feed_status)?;

    Ok(Json(page))
}

async fn get_analyst_recency(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Recency>, StatusCode> {
    let store = state.store()?;

    let analyst = store
        .find_analyst(&username)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let recency = onlyfin_core::recency::resolve(&store, analyst.id)
        .await
        .map_err(internal_error)?;

    Ok(Json(recency))
}

async fn post_coverage(
    State(state): State<AppState>,
    Json(analysts): Json<Vec<AnalystProfile>>,
) -> Result<Json<CoverageMap>, StatusCode> {
    let store = state.store()?;

    let map = DashboardWalk::new(&store)
        .coverage_for(&analysts)
        .await
        .map_err(internal_error)?;

    Ok(Json(map))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Path(dashboard_id): Path<i32>,
) -> Result<Json<DashboardWithLayout>, StatusCode> {
    let store = state.store()?;

    let view = onlyfin_core::dashboard::dashboard_with_layout(&store, dashboard_id)
        .await
        .map_err(feed_status)?;

    Ok(Json(view))
}

async fn get_stock_refs(State(state): State<AppState>) -> Result<Json<Vec<StockRef>>, StatusCode> {
    let store = state.store()?;

    let refs = onlyfin_core::dashboard::stock_refs(&store)
        .await
        .map_err(internal_error)?;

    Ok(Json(refs))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &onlyfin_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
