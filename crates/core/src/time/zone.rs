use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

pub const DEFAULT_FEED_TIME_ZONE: Tz = chrono_tz::Europe::Stockholm;

// e.g. "07 March 14:05 2026"
const FEED_DATE_FORMAT: &str = "%d %B %H:%M %Y";

/// Zone used to render feed dates. Callers pass it explicitly; the default is
/// `Europe/Stockholm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedTimeZone(Tz);

impl Default for FeedTimeZone {
    fn default() -> Self {
        Self(DEFAULT_FEED_TIME_ZONE)
    }
}

impl FeedTimeZone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    pub fn parse(name: &str) -> anyhow::Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self)
            .map_err(|e| anyhow::anyhow!("unknown time zone {name:?}: {e}"))
    }

    pub fn tz(&self) -> Tz {
        self.0
    }

    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.0)
            .format(FEED_DATE_FORMAT)
            .to_string()
    }
}

/// Lower bound of a "last N days" window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// The window reaches further back than any representable instant.
    AllTime,
    /// Admit instants strictly after this one.
    After(DateTime<Utc>),
    /// The window starts beyond any representable instant.
    Nothing,
}

impl Cutoff {
    pub fn admits(&self, instant: DateTime<Utc>) -> bool {
        match self {
            Cutoff::AllTime => true,
            Cutoff::After(cutoff) => instant > *cutoff,
            Cutoff::Nothing => false,
        }
    }
}

/// `now - days`, saturating instead of overflowing. `days` is not clamped:
/// zero or negative values simply move the cutoff to `now` or later.
pub fn window_cutoff(now: DateTime<Utc>, days: i64) -> Cutoff {
    match Duration::try_days(days).and_then(|d| now.checked_sub_signed(d)) {
        Some(cutoff) => Cutoff::After(cutoff),
        None if days > 0 => Cutoff::AllTime,
        None => Cutoff::Nothing,
    }
}
