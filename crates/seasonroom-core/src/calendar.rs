use std::fmt;
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Weekday
};
use regex::Regex;

/// A concrete calendar day. Equality is by
/// date, never by timestamp.
pub type CalendarDate = NaiveDate;

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Weeks run Sunday..=Saturday.
pub const WEEK_END: Weekday = Weekday::Sat;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct YearMonth {
  year:  i32,
  month: u32
}

impl YearMonth {
  pub fn new(
    year: i32,
    month: u32
  ) -> anyhow::Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "month out of range: {month}"
      ));
    }
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .ok_or_else(|| {
      anyhow!(
        "year out of range: {year}"
      )
    })?;
    Ok(Self { year, month })
  }

  #[must_use]
  pub fn of(date: CalendarDate) -> Self {
    Self {
      year:  date.year(),
      month: date.month()
    }
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.year
  }

  /// 1-based month number.
  #[must_use]
  pub fn month(&self) -> u32 {
    self.month
  }

  #[must_use]
  pub fn first_day(&self) -> CalendarDate {
    NaiveDate::from_ymd_opt(
      self.year, self.month, 1
    )
    .unwrap_or(NaiveDate::MIN)
  }

  #[must_use]
  pub fn last_day(&self) -> CalendarDate {
    add_days(
      self.first_day(),
      i64::from(self.days_in_month()) - 1
    )
  }

  #[must_use]
  pub fn days_in_month(&self) -> u32 {
    days_in_month(self.year, self.month)
      .unwrap_or(0)
  }

  /// 0 = Sunday.
  #[must_use]
  pub fn first_weekday(&self) -> u32 {
    self
      .first_day()
      .weekday()
      .num_days_from_sunday()
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = CalendarDate>
  {
    let first = self.first_day();
    (0..self.days_in_month()).map(
      move |offset| {
        add_days(first, i64::from(offset))
      }
    )
  }

  #[must_use]
  pub fn contains(
    &self,
    date: CalendarDate
  ) -> bool {
    Self::of(date) == *self
  }

  #[must_use]
  pub fn succ(&self) -> Self {
    if self.month == 12 {
      Self {
        year:  self.year + 1,
        month: 1
      }
    } else {
      Self {
        year:  self.year,
        month: self.month + 1
      }
    }
  }

  #[must_use]
  pub fn pred(&self) -> Self {
    if self.month == 1 {
      Self {
        year:  self.year - 1,
        month: 12
      }
    } else {
      Self {
        year:  self.year,
        month: self.month - 1
      }
    }
  }
}

impl fmt::Display for YearMonth {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year, self.month
    )
  }
}

impl FromStr for YearMonth {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let re = Regex::new(
      r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
    )
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })?;
    let caps = re
      .captures(s.trim())
      .ok_or_else(|| {
        anyhow!(
          "expected YYYY-MM, got: {s}"
        )
      })?;
    let year: i32 = caps["year"]
      .parse()
      .context("invalid year")?;
    let month: u32 = caps["month"]
      .parse()
      .context("invalid month")?;
    Self::new(year, month)
  }
}

/// Inclusive navigation range for month
/// views.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MonthBounds {
  pub start: YearMonth,
  pub end:   YearMonth
}

impl MonthBounds {
  pub fn new(
    start: YearMonth,
    end: YearMonth
  ) -> anyhow::Result<Self> {
    if end < start {
      return Err(anyhow!(
        "season end {end} is before \
         season start {start}"
      ));
    }
    Ok(Self { start, end })
  }

  #[must_use]
  pub fn clamp(
    &self,
    month: YearMonth
  ) -> YearMonth {
    month.clamp(self.start, self.end)
  }

  #[must_use]
  pub fn can_go_prev(
    &self,
    month: YearMonth
  ) -> bool {
    month.pred() >= self.start
  }

  #[must_use]
  pub fn can_go_next(
    &self,
    month: YearMonth
  ) -> bool {
    month.succ() <= self.end
  }

  #[must_use]
  pub fn prev(
    &self,
    month: YearMonth
  ) -> Option<YearMonth> {
    self
      .can_go_prev(month)
      .then(|| month.pred())
  }

  #[must_use]
  pub fn next(
    &self,
    month: YearMonth
  ) -> Option<YearMonth> {
    self
      .can_go_next(month)
      .then(|| month.succ())
  }
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> Option<u32> {
  let first =
    NaiveDate::from_ymd_opt(year, month, 1)?;
  let next_first = if month == 12 {
    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
  } else {
    NaiveDate::from_ymd_opt(
      year,
      month + 1,
      1
    )?
  };
  u32::try_from(
    next_first
      .signed_duration_since(first)
      .num_days()
  )
  .ok()
}

/// 0 = Sunday.
#[must_use]
pub fn first_weekday_of_month(
  year: i32,
  month: u32
) -> Option<u32> {
  NaiveDate::from_ymd_opt(year, month, 1)
    .map(|d| {
      d.weekday().num_days_from_sunday()
    })
}

#[must_use]
pub fn add_days(
  date: CalendarDate,
  n: i64
) -> CalendarDate {
  date
    .checked_add_signed(Duration::days(n))
    .unwrap_or(if n < 0 {
      NaiveDate::MIN
    } else {
      NaiveDate::MAX
    })
}

#[must_use]
pub fn start_of_day(
  date: CalendarDate
) -> NaiveDateTime {
  date.and_time(NaiveTime::MIN)
}

#[must_use]
pub fn end_of_day(
  date: CalendarDate
) -> NaiveDateTime {
  let last = NaiveTime::from_hms_nano_opt(
    23,
    59,
    59,
    999_999_999
  )
  .unwrap_or(NaiveTime::MIN);
  date.and_time(last)
}

#[must_use]
pub fn format_iso_date(
  date: CalendarDate
) -> String {
  date.format(ISO_DATE_FORMAT).to_string()
}

pub fn parse_iso_date(
  raw: &str
) -> anyhow::Result<CalendarDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    ISO_DATE_FORMAT
  )
  .with_context(|| {
    format!(
      "expected YYYY-MM-DD, got: {raw}"
    )
  })
}

/// Sunday on or before `date`.
#[must_use]
pub fn week_start(
  date: CalendarDate
) -> CalendarDate {
  let back = date
    .weekday()
    .num_days_from_sunday();
  add_days(date, -i64::from(back))
}

/// `date` advanced to the next Saturday,
/// inclusive.
#[must_use]
pub fn this_saturday(
  date: CalendarDate
) -> CalendarDate {
  let ahead = WEEK_END
    .num_days_from_sunday()
    - date.weekday().num_days_from_sunday();
  add_days(date, i64::from(ahead))
}

/// Occurrence of `weekday` within the
/// Sunday-start week containing `date`.
#[must_use]
pub fn weekday_in_week_of(
  date: CalendarDate,
  weekday: Weekday
) -> CalendarDate {
  add_days(
    week_start(date),
    i64::from(
      weekday.num_days_from_sunday()
    )
  )
}

#[must_use]
pub fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}
