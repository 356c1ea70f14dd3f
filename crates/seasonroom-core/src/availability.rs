//! Which calendar days may be reserved right now.
//!
//! The current week (today through Saturday) is always open. The week after
//! it opens at the crew's opening instant, projected onto the current week.
//! Everything before today or past next Saturday is closed.

use chrono::NaiveDateTime;

use crate::calendar::{CalendarDate, add_days, this_saturday};
use crate::reservation::OpeningRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Past,
    ThisWeek,
    NextWeekOpen,
    /// `opens_at` is `None` when the crew has no opening rule.
    NextWeekNotYetOpen {
        opens_at: Option<NaiveDateTime>,
    },
    BeyondHorizon,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::ThisWeek | Self::NextWeekOpen)
    }
}

/// The two-week booking horizon as seen from one wall-clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub today: CalendarDate,
    pub this_saturday: CalendarDate,
    pub next_saturday: CalendarDate,
    pub opens_at: Option<NaiveDateTime>,
    pub next_week_open: bool,
}

impl AvailabilityWindow {
    pub fn at(now: NaiveDateTime, rule: Option<&OpeningRule>) -> Self {
        let today = now.date();
        let this_saturday = this_saturday(today);
        let next_saturday = add_days(this_saturday, 7);
        let opens_at = rule.map(|r| r.instant_in_week_of(today));
        let next_week_open = opens_at.is_some_and(|open| now >= open);

        Self {
            today,
            this_saturday,
            next_saturday,
            opens_at,
            next_week_open,
        }
    }

    pub fn evaluate(&self, target: CalendarDate) -> Availability {
        if target < self.today {
            return Availability::Past;
        }
        if target <= self.this_saturday {
            return Availability::ThisWeek;
        }
        if target > self.next_saturday {
            return Availability::BeyondHorizon;
        }
        if self.next_week_open {
            Availability::NextWeekOpen
        } else {
            Availability::NextWeekNotYetOpen {
                opens_at: self.opens_at,
            }
        }
    }

    pub fn is_available(&self, target: CalendarDate) -> bool {
        self.evaluate(target).is_available()
    }

    /// Every day that can be selected right now, in order.
    pub fn bookable_days(&self) -> impl Iterator<Item = CalendarDate> + '_ {
        let last = if self.next_week_open {
            self.next_saturday
        } else {
            self.this_saturday
        };
        let span = last.signed_duration_since(self.today).num_days();
        (0..=span).map(move |offset| add_days(self.today, offset))
    }
}

/// Decides whether `target` is reservable at wall-clock instant `now`
/// (today is `now`'s date). Without an opening rule next week stays closed.
pub fn is_day_available(
    target: CalendarDate,
    now: NaiveDateTime,
    rule: Option<&OpeningRule>,
) -> bool {
    AvailabilityWindow::at(now, rule).is_available(target)
}
