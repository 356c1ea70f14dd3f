use std::fmt;

use anyhow::anyhow;
use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calendar::{CalendarDate, parse_weekday_name, weekday_in_week_of};

pub type CrewId = i64;
pub type ReservationId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Pending,
}

impl ReservationStatus {
    /// Maps a backend status string. `None` means the reservation is
    /// cancelled and must be treated as absent.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" | "canceled" => None,
            _ => Some(Self::Pending),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,

    #[serde(default)]
    pub crew_id: Option<CrewId>,

    pub date: CalendarDate,

    pub status: ReservationStatus,

    #[serde(default)]
    pub teaching: bool,

    #[serde(default)]
    pub waiting_order: Option<u32>,
}

impl Reservation {
    pub fn new(date: CalendarDate, status: ReservationStatus) -> Self {
        Self {
            reservation_id: None,
            crew_id: None,
            date,
            status,
            teaching: false,
            waiting_order: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

/// Weekday and time at which next week's days open for booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningRule {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl OpeningRule {
    pub fn new(weekday: Weekday, time: NaiveTime) -> Self {
        Self { weekday, time }
    }

    /// Accepts `FRIDAY`/`fri` style weekdays and `HH:MM` or `HH:MM:SS`
    /// times.
    pub fn parse(day: &str, time: &str) -> anyhow::Result<Self> {
        let weekday =
            parse_weekday_name(day).ok_or_else(|| anyhow!("unknown weekday: {day}"))?;
        let trimmed = time.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
            .map_err(|e| anyhow!("invalid opening time {time}: {e}"))?;
        Ok(Self { weekday, time })
    }

    /// Lenient variant for crew settings: anything missing or malformed
    /// yields no rule, which keeps next week closed.
    pub fn from_settings(day: Option<&str>, time: Option<&str>) -> Option<Self> {
        let (day, time) = (day?, time?);
        match Self::parse(day, time) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!(day, time, error = %err, "ignoring malformed crew opening rule");
                None
            }
        }
    }

    /// The rule projected onto the Sunday-start week containing `date`.
    /// May fall before or after `date` itself.
    pub fn instant_in_week_of(&self, date: CalendarDate) -> NaiveDateTime {
        weekday_in_week_of(date, self.weekday).and_time(self.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unlimited,
    Limited(u32),
}

impl Capacity {
    pub fn from_settings(daily_capacity: Option<u32>, is_limited: bool) -> Self {
        match daily_capacity {
            Some(cap) if is_limited => Self::Limited(cap),
            _ => Self::Unlimited,
        }
    }

    /// The limit for one day. A per-day figure from the server narrows a
    /// limited crew but never limits an unlimited one.
    pub fn for_day(self, reported: Option<u32>) -> Self {
        match (self, reported) {
            (Self::Unlimited, _) => Self::Unlimited,
            (Self::Limited(_), Some(cap)) => Self::Limited(cap),
            (limited, None) => limited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewSettings {
    pub crew_id: CrewId,
    pub name: String,
    pub opening_rule: Option<OpeningRule>,
    pub capacity: Capacity,
}

/// Crew-wide headcount for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrewReservationSummary {
    pub date: CalendarDate,
    pub booked: u32,
    pub capacity: Capacity,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::{Capacity, OpeningRule, ReservationStatus};

    #[test]
    fn day_capacity_respects_unlimited_crew() {
        assert_eq!(Capacity::Unlimited.for_day(Some(20)), Capacity::Unlimited);
        assert_eq!(Capacity::Limited(20).for_day(Some(24)), Capacity::Limited(24));
        assert_eq!(Capacity::Limited(20).for_day(None), Capacity::Limited(20));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            ReservationStatus::from_wire("confirmed"),
            Some(ReservationStatus::Confirmed)
        );
        assert_eq!(
            ReservationStatus::from_wire("CONFIRMED"),
            Some(ReservationStatus::Confirmed)
        );
        assert_eq!(
            ReservationStatus::from_wire("waiting"),
            Some(ReservationStatus::Pending)
        );
        assert_eq!(
            ReservationStatus::from_wire("created"),
            Some(ReservationStatus::Pending)
        );
        assert_eq!(ReservationStatus::from_wire("CANCELLED"), None);
    }

    #[test]
    fn parses_opening_rule() {
        let rule = OpeningRule::parse("FRIDAY", "18:00").expect("parse rule");
        assert_eq!(rule.weekday, Weekday::Fri);
        assert_eq!(rule.time, NaiveTime::from_hms_opt(18, 0, 0).expect("time"));

        let with_seconds = OpeningRule::parse("mon", "09:30:00").expect("parse rule");
        assert_eq!(with_seconds.weekday, Weekday::Mon);

        assert!(OpeningRule::parse("FUNDAY", "18:00").is_err());
        assert!(OpeningRule::from_settings(Some("FRIDAY"), Some("25:00")).is_none());
        assert!(OpeningRule::from_settings(None, Some("18:00")).is_none());
    }

    #[test]
    fn projects_rule_onto_current_week() {
        let rule = OpeningRule::parse("FRIDAY", "18:00").expect("parse rule");
        let wednesday = NaiveDate::from_ymd_opt(2025, 12, 10).expect("date");
        let saturday = NaiveDate::from_ymd_opt(2025, 12, 13).expect("date");
        let expected = NaiveDate::from_ymd_opt(2025, 12, 12)
            .and_then(|d| d.and_hms_opt(18, 0, 0))
            .expect("instant");
        assert_eq!(rule.instant_in_week_of(wednesday), expected);
        assert_eq!(rule.instant_in_week_of(saturday), expected);
    }

    #[test]
    fn capacity_from_settings() {
        assert_eq!(Capacity::from_settings(Some(20), true), Capacity::Limited(20));
        assert_eq!(Capacity::from_settings(Some(20), false), Capacity::Unlimited);
        assert_eq!(Capacity::from_settings(None, true), Capacity::Unlimited);
    }
}
