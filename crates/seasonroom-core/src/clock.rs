use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str = "SEASONROOM_TIMEZONE";
const TIMEZONE_CONFIG_KEY: &str = "timezone";

/// Wall-clock source for availability checks.
///
/// Readings are naive local date-times: every availability comparison
/// happens in one wall clock, the same one the crew's opening rule is
/// expressed in.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    pub fn local() -> Self {
        Self { timezone: None }
    }

    pub fn in_timezone(timezone: Tz) -> Self {
        Self {
            timezone: Some(timezone),
        }
    }

    /// `$SEASONROOM_TIMEZONE`, then the `timezone` rc key, then the
    /// machine's local zone.
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> Self {
        if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
            && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
        {
            return Self::in_timezone(tz);
        }

        if let Some(raw) = cfg.get(TIMEZONE_CONFIG_KEY)
            && let Some(tz) = parse_timezone(&raw, TIMEZONE_CONFIG_KEY)
        {
            return Self::in_timezone(tz);
        }

        debug!("no timezone configured; using system local time");
        Self::local()
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read()
    }
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            info!(source, timezone = %trimmed, "configured wall-clock timezone");
            Some(tz)
        }
        Err(err) => {
            warn!(
                source,
                timezone = %trimmed,
                error = %err,
                "failed to parse timezone id; ignoring"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{Clock, FixedClock, parse_timezone};

    #[test]
    fn fixed_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2025, 12, 12)
            .and_then(|d| d.and_hms_opt(17, 59, 0))
            .expect("valid instant");
        let clock = FixedClock::new(start);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.now(), start + Duration::minutes(2));
        assert_eq!(clock.today(), start.date());
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(parse_timezone("Asia/Seoul", "test").is_some());
        assert!(parse_timezone("Mars/Olympus", "test").is_none());
        assert!(parse_timezone("  ", "test").is_none());
    }
}
