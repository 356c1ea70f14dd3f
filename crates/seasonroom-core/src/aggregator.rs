use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::calendar::{CalendarDate, YearMonth};
use crate::reservation::{Reservation, ReservationId, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayStatus {
    Confirmed,
    Pending,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayClassification {
    pub status: DayStatus,
    pub teaching: bool,
    pub reservation_id: Option<ReservationId>,
    pub waiting_order: Option<u32>,
}

impl DayClassification {
    pub fn is_reserved(&self) -> bool {
        self.status != DayStatus::None
    }

    fn from_reservation(reservation: &Reservation) -> Self {
        let status = match reservation.status {
            ReservationStatus::Confirmed => DayStatus::Confirmed,
            ReservationStatus::Pending => DayStatus::Pending,
        };
        Self {
            status,
            teaching: reservation.teaching,
            reservation_id: reservation.reservation_id,
            waiting_order: reservation.waiting_order,
        }
    }
}

/// More than one active reservation came back for one day. The first one
/// is used; the rest are reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReservation {
    pub date: CalendarDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthClassification {
    pub month: YearMonth,
    pub days: BTreeMap<CalendarDate, DayClassification>,
    /// Confirmed reservations across all time, as reported by the server.
    pub usage_count: u32,
    pub anomalies: Vec<DuplicateReservation>,
}

impl MonthClassification {
    pub fn get(&self, date: CalendarDate) -> DayClassification {
        self.days.get(&date).copied().unwrap_or_default()
    }

    pub fn days_with(&self, status: DayStatus) -> impl Iterator<Item = CalendarDate> + '_ {
        self.days
            .iter()
            .filter(move |(_, c)| c.status == status)
            .map(|(date, _)| *date)
    }
}

/// Classifies each of `days` against the user's reservations. Days without
/// a reservation are `DayStatus::None`.
pub fn classify<I>(
    days: I,
    reservations: &[Reservation],
) -> (BTreeMap<CalendarDate, DayClassification>, Vec<DuplicateReservation>)
where
    I: IntoIterator<Item = CalendarDate>,
{
    let mut out = BTreeMap::new();
    let mut anomalies = Vec::new();

    for day in days {
        let mut matches = reservations.iter().filter(|r| r.date == day);
        let classification = match matches.next() {
            Some(first) => {
                let extra = matches.count();
                if extra > 0 {
                    warn!(
                        date = %day,
                        count = extra + 1,
                        "multiple active reservations for one day; using the first"
                    );
                    anomalies.push(DuplicateReservation {
                        date: day,
                        count: extra + 1,
                    });
                }
                DayClassification::from_reservation(first)
            }
            None => DayClassification::default(),
        };
        out.insert(day, classification);
    }

    (out, anomalies)
}

#[tracing::instrument(skip(reservations), fields(month = %month, count = reservations.len()))]
pub fn classify_month(
    month: YearMonth,
    reservations: &[Reservation],
    usage_count: u32,
) -> MonthClassification {
    let (days, anomalies) = classify(month.days(), reservations);
    debug!(
        confirmed = days.values().filter(|c| c.status == DayStatus::Confirmed).count(),
        pending = days.values().filter(|c| c.status == DayStatus::Pending).count(),
        "classified month"
    );
    MonthClassification {
        month,
        days,
        usage_count,
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DayStatus, classify_month};
    use crate::calendar::YearMonth;
    use crate::reservation::{Reservation, ReservationStatus};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).expect("valid date")
    }

    fn december() -> YearMonth {
        YearMonth::new(2025, 12).expect("month")
    }

    #[test]
    fn single_confirmed_day() {
        let reservations = vec![Reservation::new(date(14), ReservationStatus::Confirmed)];
        let month = classify_month(december(), &reservations, 3);

        assert_eq!(month.get(date(14)).status, DayStatus::Confirmed);
        for day in december().days().filter(|d| *d != date(14)) {
            assert_eq!(month.get(day).status, DayStatus::None, "{day}");
        }
        assert_eq!(month.days.len(), 31);
        assert_eq!(month.usage_count, 3);
        assert!(month.anomalies.is_empty());
    }

    #[test]
    fn pending_and_teaching_carry_through() {
        let mut taught = Reservation::new(date(13), ReservationStatus::Confirmed);
        taught.teaching = true;
        taught.reservation_id = Some(42);
        let mut waiting = Reservation::new(date(27), ReservationStatus::Pending);
        waiting.waiting_order = Some(2);

        let month = classify_month(december(), &[taught, waiting], 0);
        let thirteenth = month.get(date(13));
        assert!(thirteenth.teaching);
        assert_eq!(thirteenth.reservation_id, Some(42));
        assert_eq!(month.get(date(27)).status, DayStatus::Pending);
        assert_eq!(month.get(date(27)).waiting_order, Some(2));
        assert_eq!(
            month.days_with(DayStatus::Pending).collect::<Vec<_>>(),
            vec![date(27)]
        );
    }

    #[test]
    fn duplicate_reservations_use_first_and_report() {
        let reservations = vec![
            Reservation::new(date(20), ReservationStatus::Pending),
            Reservation::new(date(20), ReservationStatus::Confirmed),
        ];
        let month = classify_month(december(), &reservations, 0);
        assert_eq!(month.get(date(20)).status, DayStatus::Pending);
        assert_eq!(month.anomalies.len(), 1);
        assert_eq!(month.anomalies[0].count, 2);
    }

    #[test]
    fn reservations_outside_month_are_ignored() {
        let jan = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
        let month = classify_month(
            december(),
            &[Reservation::new(jan, ReservationStatus::Confirmed)],
            1,
        );
        assert_eq!(month.days_with(DayStatus::Confirmed).count(), 0);
        assert_eq!(month.get(jan).status, DayStatus::None);
    }
}
