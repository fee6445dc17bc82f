pub mod coverage;
pub mod dashboard;
pub mod domain;
pub mod feed;
pub mod recency;
pub mod storage;
pub mod store;
pub mod time;

pub mod config {
    use crate::time::zone::FeedTimeZone;
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub feed_time_zone: Option<String>,
        pub cors_allowed_origins: Vec<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                feed_time_zone: std::env::var("FEED_TIME_ZONE")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .map(|s| parse_origins(&s))
                    .unwrap_or_default(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        /// Zone feed dates are rendered in when a request names none.
        pub fn default_time_zone(&self) -> anyhow::Result<FeedTimeZone> {
            match self.feed_time_zone.as_deref() {
                Some(name) => FeedTimeZone::parse(name).context("invalid FEED_TIME_ZONE"),
                None => Ok(FeedTimeZone::default()),
            }
        }
    }

    fn parse_origins(s: &str) -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }

}
