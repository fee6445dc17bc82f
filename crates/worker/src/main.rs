use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onlyfin_core::coverage::{CoverageSource, DashboardWalk};
use onlyfin_core::domain::content::AnalystProfile;
use onlyfin_core::recency::{self, Recency};
use onlyfin_core::storage::postgres::PgStore;
use onlyfin_core::store::AnalystDirectory;

#[derive(Debug, Parser)]
#[command(name = "onlyfin_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print which analysts cover which instruments, as JSON.
    Coverage {
        /// Analyst username. Repeat for several analysts.
        #[arg(long = "analyst", required = true)]
        analysts: Vec<String>,
    },

    /// Print each analyst's latest post and update time, stalest last.
    Recency {
        /// Analyst username. Repeat for several analysts.
        #[arg(long = "analyst", required = true)]
        analysts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = onlyfin_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    onlyfin_core::storage::migrate(&pool).await?;
    let store = PgStore::new(pool);

    let res = match args.command {
        Command::Coverage { analysts } => coverage_report(&store, &analysts).await,
        Command::Recency { analysts } => recency_report(&store, &analysts).await,
    };

    let report = match res {
        Ok(report) => report,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "report failed");
            return Err(err);
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn resolve_analysts(
    store: &PgStore,
    usernames: &[String],
) -> anyhow::Result<Vec<AnalystProfile>> {
    let mut out = Vec::with_capacity(usernames.len());
    for username in usernames {
        match store.find_analyst(username).await? {
            Some(analyst) if !out.contains(&analyst) => out.push(analyst),
            Some(_) => {}
            None => tracing::warn!(%username, "unknown analyst; skipping"),
        }
    }
    Ok(out)
}

async fn coverage_report(
    store: &PgStore,
    usernames: &[String],
) -> anyhow::Result<serde_json::Value> {
    let analysts = resolve_analysts(store, usernames).await?;
    let map = DashboardWalk::new(store).coverage_for(&analysts).await?;

    tracing::info!(analysts = analysts.len(), stocks = map.len(), "built coverage map");
    Ok(serde_json::to_value(&map)?)
}

async fn recency_report(
    store: &PgStore,
    usernames: &[String],
) -> anyhow::Result<serde_json::Value> {
    let analysts = resolve_analysts(store, usernames).await?;

    let mut rows: Vec<(AnalystProfile, Recency)> = Vec::with_capacity(analysts.len());
    for analyst in analysts {
        let walked = recency::resolve(store, analyst.id).await?;
        let queried = recency::resolve_from_records(store, &analyst).await?;
        if walked != queried {
            tracing::warn!(
                analyst = %analyst.username,
                ?walked,
                ?queried,
                "dashboard walk and feed projection disagree on recency"
            );
        }
        rows.push((analyst, walked));
    }

    rows.sort_by(|a, b| b.1.last_post.cmp(&a.1.last_post));

    tracing::info!(analysts = rows.len(), "resolved recency");
    Ok(serde_json::Value::Array(
        rows.into_iter()
            .map(|(analyst, recency)| {
                json!({
                    "analyst": analyst,
                    "has_content": recency.has_content(),
                    "recency": recency,
                })
            })
            .collect(),
    ))
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
