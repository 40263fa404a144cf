use chrono::Datelike;
use chrono_tz::Tz;
use time::{Date, OffsetDateTime};

/// Source of "today" and "now" for date filtering and token expiry.
pub trait Clock: Send + Sync {
    /// The current calendar day at local midnight boundary.
    fn today(&self) -> Date;

    fn now_unix(&self) -> i64;
}

/// Wall clock. "Today" is taken in the configured zone, or the machine's
/// local zone when none is configured.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    tz: Option<Tz>,
}

impl SystemClock {
    pub fn new(tz: Option<Tz>) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> Date {
        let naive = match self.tz {
            Some(tz) => chrono::Utc::now().with_timezone(&tz).date_naive(),
            None => chrono::Local::now().date_naive(),
        };
        Date::from_ordinal_date(naive.year(), naive.ordinal() as u16)
            .unwrap_or_else(|_| OffsetDateTime::now_utc().date())
    }

    fn now_unix(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Clock pinned to one day; used by tests and by callers that replay a
/// specific date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }

    fn now_unix(&self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp()
    }
}
