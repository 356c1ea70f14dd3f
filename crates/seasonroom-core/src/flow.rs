//! Per-day reservation command state machine.
//!
//! ```text
//! NONE -> SELECTED -> SUBMITTING -> RESERVED(pending|confirmed)
//! RESERVED -> CANCEL_CONFIRMING -> SUBMITTING -> NONE
//! ```
//!
//! The board never talks to the backend. Callers take the command returned
//! by a `begin_*` transition, run it, and hand the same command back to the
//! matching `finish_*`. Only the days of that command are settled. Observable consequences are queued as [`FlowEvent`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::aggregator::{DayClassification, DayStatus, MonthClassification};
use crate::availability::{Availability, AvailabilityWindow};
use crate::calendar::{CalendarDate, YearMonth};
use crate::reservation::{ReservationId, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    None,
    Selected,
    Submitting,
    Reserved {
        status: ReservationStatus,
        teaching: bool,
    },
    CancelConfirming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Cancel,
    Teaching,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Cancel => write!(f, "cancel"),
            Self::Teaching => write!(f, "teaching"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    SelectionChanged {
        date: CalendarDate,
        selected: bool,
    },
    CancelPrompted {
        date: CalendarDate,
    },
    /// The cached view of the user's reservations is stale.
    RefreshRequested,
    CommandFailed {
        command: CommandKind,
        dates: Vec<CalendarDate>,
        message: String,
    },
    TeachingReverted {
        date: CalendarDate,
        teaching: bool,
    },
    DataIntegrityWarning {
        date: CalendarDate,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("{date} cannot be reserved right now ({availability:?})")]
    Unavailable {
        date: CalendarDate,
        availability: Availability,
    },
    #[error("{date} is already reserved")]
    AlreadyReserved { date: CalendarDate },
    #[error("a {command} command for {date} is still in flight")]
    InFlight {
        date: CalendarDate,
        command: CommandKind,
    },
    #[error("no dates selected")]
    EmptySelection,
    #[error("{date} has no reservation")]
    NotReserved { date: CalendarDate },
    #[error("teaching can only be toggled on a confirmed reservation ({date})")]
    NotConfirmed { date: CalendarDate },
    #[error("reservation on {date} has no id")]
    MissingReservationId { date: CalendarDate },
    #[error("no cancellation is waiting for confirmation")]
    NoCancelPending,
    #[error("no {command} command is in flight for {date}")]
    NotInFlight {
        date: CalendarDate,
        command: CommandKind,
    },
    #[error("{date} is waiting for a cancel confirmation")]
    CancelPending { date: CalendarDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommand {
    pub dates: Vec<CalendarDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelCommand {
    pub date: CalendarDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeachingCommand {
    pub date: CalendarDate,
    pub reservation_id: ReservationId,
    /// `true` applies to teach, `false` withdraws.
    pub apply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDate {
    pub date: CalendarDate,
    pub reason: String,
}

/// What the backend did with a batch create.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateReport {
    pub rejected: Vec<RejectedDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Selected,
    Deselected,
    CancelPrompted,
}

#[derive(Debug, Default)]
pub struct ReservationBoard {
    month: Option<YearMonth>,
    usage_count: u32,
    reserved: BTreeMap<CalendarDate, DayClassification>,
    selection: BTreeSet<CalendarDate>,
    in_flight: BTreeMap<CalendarDate, CommandKind>,
    cancel_prompt: Option<CalendarDate>,
    teaching_rollback: BTreeMap<CalendarDate, bool>,
    events: Vec<FlowEvent>,
}

impl ReservationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn selection(&self) -> impl Iterator<Item = CalendarDate> + '_ {
        self.selection.iter().copied()
    }

    pub fn cancel_prompt(&self) -> Option<CalendarDate> {
        self.cancel_prompt
    }

    pub fn reservation(&self, date: CalendarDate) -> Option<DayClassification> {
        self.reserved.get(&date).copied()
    }

    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn day_state(&self, date: CalendarDate) -> DayState {
        if self.in_flight.contains_key(&date) {
            return DayState::Submitting;
        }
        if self.cancel_prompt == Some(date) {
            return DayState::CancelConfirming;
        }
        if let Some(day) = self.reserved.get(&date) {
            let status = match day.status {
                DayStatus::Confirmed => ReservationStatus::Confirmed,
                _ => ReservationStatus::Pending,
            };
            return DayState::Reserved {
                status,
                teaching: day.teaching,
            };
        }
        if self.selection.contains(&date) {
            return DayState::Selected;
        }
        DayState::None
    }

    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces the persisted view with a fresh classification. Optimistic
    /// teaching flips for commands still in flight survive the refresh.
    #[tracing::instrument(skip(self, month), fields(month = %month.month))]
    pub fn apply_refresh(&mut self, month: MonthClassification) {
        let mut reserved: BTreeMap<_, _> = month
            .days
            .iter()
            .filter(|(_, c)| c.is_reserved())
            .map(|(d, c)| (*d, *c))
            .collect();

        for (date, command) in &self.in_flight {
            if *command == CommandKind::Teaching
                && let (Some(fresh), Some(local)) =
                    (reserved.get_mut(date), self.reserved.get(date))
            {
                fresh.teaching = local.teaching;
            }
        }
        self.teaching_rollback
            .retain(|date, _| self.in_flight.get(date) == Some(&CommandKind::Teaching));

        self.selection.retain(|date| !reserved.contains_key(date));
        if let Some(date) = self.cancel_prompt
            && !reserved.contains_key(&date)
        {
            self.cancel_prompt = None;
        }

        for anomaly in &month.anomalies {
            self.events.push(FlowEvent::DataIntegrityWarning {
                date: anomaly.date,
                count: anomaly.count,
            });
        }

        debug!(reserved = reserved.len(), usage = month.usage_count, "applied refresh");
        self.reserved = reserved;
        self.usage_count = month.usage_count;
        self.month = Some(month.month);
    }

    /// A tap on a calendar cell: reserved days open the cancel prompt,
    /// everything else toggles selection.
    pub fn tap(
        &mut self,
        date: CalendarDate,
        window: &AvailabilityWindow,
    ) -> Result<TapOutcome, FlowError> {
        if self.reserved.contains_key(&date) && !self.in_flight.contains_key(&date) {
            self.request_cancel(date)?;
            return Ok(TapOutcome::CancelPrompted);
        }
        if self.toggle_select(date, window)? {
            Ok(TapOutcome::Selected)
        } else {
            Ok(TapOutcome::Deselected)
        }
    }

    /// Returns whether `date` is selected afterwards. Deselecting is always
    /// allowed; selecting needs an available, unreserved, idle day.
    pub fn toggle_select(
        &mut self,
        date: CalendarDate,
        window: &AvailabilityWindow,
    ) -> Result<bool, FlowError> {
        self.ensure_idle(date)?;
        self.ensure_no_prompt(date)?;
        if self.selection.remove(&date) {
            self.events.push(FlowEvent::SelectionChanged {
                date,
                selected: false,
            });
            return Ok(false);
        }
        if self.reserved.contains_key(&date) {
            return Err(FlowError::AlreadyReserved { date });
        }
        let availability = window.evaluate(date);
        if !availability.is_available() {
            return Err(FlowError::Unavailable { date, availability });
        }
        self.selection.insert(date);
        self.events.push(FlowEvent::SelectionChanged {
            date,
            selected: true,
        });
        Ok(true)
    }

    pub fn clear_selection(&mut self) {
        let dates: Vec<_> = self
            .selection
            .iter()
            .copied()
            .filter(|d| !self.in_flight.contains_key(d))
            .collect();
        for date in dates {
            self.selection.remove(&date);
            self.events.push(FlowEvent::SelectionChanged {
                date,
                selected: false,
            });
        }
    }

    pub fn begin_submit(&mut self) -> Result<CreateCommand, FlowError> {
        if self.selection.is_empty() {
            return Err(FlowError::EmptySelection);
        }
        for date in &self.selection {
            self.ensure_idle(*date)?;
        }
        let dates: Vec<_> = self.selection.iter().copied().collect();
        for date in &dates {
            self.in_flight.insert(*date, CommandKind::Create);
        }
        info!(count = dates.len(), "submitting reservation batch");
        Ok(CreateCommand { dates })
    }

    pub fn finish_submit(
        &mut self,
        command: &CreateCommand,
        result: Result<CreateReport, String>,
    ) -> Result<(), FlowError> {
        if command.dates.is_empty() {
            return Err(FlowError::EmptySelection);
        }
        self.take_in_flight(CommandKind::Create, &command.dates)?;
        let dates = command.dates.clone();
        match result {
            Ok(report) => {
                let rejected: BTreeSet<_> = report.rejected.iter().map(|r| r.date).collect();
                for date in dates.iter().filter(|d| !rejected.contains(d)) {
                    self.selection.remove(date);
                }
                if !report.rejected.is_empty() {
                    let message = report
                        .rejected
                        .iter()
                        .map(|r| format!("{}: {}", r.date, r.reason))
                        .collect::<Vec<_>>()
                        .join("; ");
                    warn!(rejected = report.rejected.len(), %message, "some dates were rejected");
                    self.events.push(FlowEvent::CommandFailed {
                        command: CommandKind::Create,
                        dates: rejected.into_iter().collect(),
                        message,
                    });
                }
                if report.rejected.len() < dates.len() {
                    self.events.push(FlowEvent::RefreshRequested);
                }
            }
            Err(message) => {
                warn!(%message, "reservation batch failed; keeping selection");
                self.events.push(FlowEvent::CommandFailed {
                    command: CommandKind::Create,
                    dates,
                    message,
                });
            }
        }
        Ok(())
    }

    pub fn request_cancel(&mut self, date: CalendarDate) -> Result<(), FlowError> {
        self.ensure_idle(date)?;
        if !self.reserved.contains_key(&date) {
            return Err(FlowError::NotReserved { date });
        }
        self.cancel_prompt = Some(date);
        self.events.push(FlowEvent::CancelPrompted { date });
        Ok(())
    }

    pub fn dismiss_cancel(&mut self) {
        self.cancel_prompt = None;
    }

    pub fn confirm_cancel(&mut self) -> Result<CancelCommand, FlowError> {
        let date = self.cancel_prompt.ok_or(FlowError::NoCancelPending)?;
        self.ensure_idle(date)?;
        self.cancel_prompt = None;
        self.in_flight.insert(date, CommandKind::Cancel);
        info!(%date, "cancelling reservation");
        Ok(CancelCommand { date })
    }

    pub fn finish_cancel(
        &mut self,
        command: &CancelCommand,
        result: Result<(), String>,
    ) -> Result<(), FlowError> {
        let date = command.date;
        self.take_in_flight(CommandKind::Cancel, &[date])?;
        match result {
            Ok(()) => {
                self.reserved.remove(&date);
                self.events.push(FlowEvent::RefreshRequested);
            }
            Err(message) => {
                warn!(%date, %message, "cancellation failed; reservation kept");
                self.events.push(FlowEvent::CommandFailed {
                    command: CommandKind::Cancel,
                    dates: vec![date],
                    message,
                });
            }
        }
        Ok(())
    }

    /// Flips the local teaching flag straight away and hands back the call
    /// that makes it true on the server.
    pub fn begin_teaching_toggle(&mut self, date: CalendarDate) -> Result<TeachingCommand, FlowError> {
        self.ensure_idle(date)?;
        self.ensure_no_prompt(date)?;
        let day = self
            .reserved
            .get_mut(&date)
            .ok_or(FlowError::NotReserved { date })?;
        if day.status != DayStatus::Confirmed {
            return Err(FlowError::NotConfirmed { date });
        }
        let reservation_id = day
            .reservation_id
            .ok_or(FlowError::MissingReservationId { date })?;

        let previous = day.teaching;
        day.teaching = !previous;
        self.teaching_rollback.insert(date, previous);
        self.in_flight.insert(date, CommandKind::Teaching);

        Ok(TeachingCommand {
            date,
            reservation_id,
            apply: !previous,
        })
    }

    pub fn finish_teaching_toggle(
        &mut self,
        command: &TeachingCommand,
        result: Result<(), String>,
    ) -> Result<(), FlowError> {
        let date = command.date;
        self.take_in_flight(CommandKind::Teaching, &[date])?;
        let previous = self.teaching_rollback.remove(&date);
        match result {
            Ok(()) => {
                self.events.push(FlowEvent::RefreshRequested);
            }
            Err(message) => {
                if let Some(previous) = previous
                    && let Some(day) = self.reserved.get_mut(&date)
                {
                    day.teaching = previous;
                    self.events.push(FlowEvent::TeachingReverted {
                        date,
                        teaching: previous,
                    });
                }
                warn!(%date, %message, "teaching toggle failed; reverted");
                self.events.push(FlowEvent::CommandFailed {
                    command: CommandKind::Teaching,
                    dates: vec![date],
                    message,
                });
            }
        }
        Ok(())
    }

    fn ensure_idle(&self, date: CalendarDate) -> Result<(), FlowError> {
        match self.in_flight.get(&date) {
            Some(command) => Err(FlowError::InFlight {
                date,
                command: *command,
            }),
            None => Ok(()),
        }
    }

    fn ensure_no_prompt(&self, date: CalendarDate) -> Result<(), FlowError> {
        if self.cancel_prompt == Some(date) {
            return Err(FlowError::CancelPending { date });
        }
        Ok(())
    }

    /// Settles exactly `dates`, all of which must be in flight for `command`.
    fn take_in_flight(
        &mut self,
        command: CommandKind,
        dates: &[CalendarDate],
    ) -> Result<(), FlowError> {
        if let Some(date) = dates
            .iter()
            .find(|d| self.in_flight.get(d) != Some(&command))
        {
            return Err(FlowError::NotInFlight {
                date: *date,
                command,
            });
        }
        for date in dates {
            self.in_flight.remove(date);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};

    use super::{
        CommandKind, CreateCommand, CreateReport, DayState, FlowError, FlowEvent, RejectedDate,
        ReservationBoard, TapOutcome,
    };
    use crate::aggregator::classify_month;
    use crate::availability::AvailabilityWindow;
    use crate::calendar::YearMonth;
    use crate::reservation::{OpeningRule, Reservation, ReservationStatus};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, d).expect("valid date")
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(d).and_hms_opt(h, m, 0).expect("valid time")
    }

    fn rule() -> OpeningRule {
        OpeningRule::new(Weekday::Fri, NaiveTime::from_hms_opt(18, 0, 0).expect("time"))
    }

    fn window(now: NaiveDateTime) -> AvailabilityWindow {
        AvailabilityWindow::at(now, Some(&rule()))
    }

    fn board_with(reservations: &[Reservation]) -> ReservationBoard {
        let mut board = ReservationBoard::new();
        let month = YearMonth::new(2025, 12).expect("month");
        board.apply_refresh(classify_month(month, reservations, 0));
        board.drain_events();
        board
    }

    fn confirmed(d: u32, id: i64) -> Reservation {
        let mut r = Reservation::new(date(d), ReservationStatus::Confirmed);
        r.reservation_id = Some(id);
        r
    }

    #[test]
    fn select_only_available_days() {
        let mut board = ReservationBoard::new();
        let w = window(at(10, 10, 0));

        assert_eq!(board.toggle_select(date(11), &w), Ok(true));
        assert_eq!(board.day_state(date(11)), DayState::Selected);
        assert!(matches!(
            board.toggle_select(date(20), &w),
            Err(FlowError::Unavailable { .. })
        ));
        assert!(matches!(
            board.toggle_select(date(9), &w),
            Err(FlowError::Unavailable { .. })
        ));
        assert_eq!(board.toggle_select(date(11), &w), Ok(false));
        assert_eq!(board.day_state(date(11)), DayState::None);
    }

    #[test]
    fn reserved_day_routes_to_cancel_prompt() {
        let mut board = board_with(&[confirmed(12, 1)]);
        let w = window(at(10, 10, 0));

        assert_eq!(
            board.toggle_select(date(12), &w),
            Err(FlowError::AlreadyReserved { date: date(12) })
        );
        assert_eq!(board.tap(date(12), &w), Ok(TapOutcome::CancelPrompted));
        assert_eq!(board.day_state(date(12)), DayState::CancelConfirming);
        board.dismiss_cancel();
        assert_eq!(
            board.day_state(date(12)),
            DayState::Reserved {
                status: ReservationStatus::Confirmed,
                teaching: false
            }
        );
    }

    #[test]
    fn submit_success_clears_selection_and_requests_refresh() {
        let mut board = ReservationBoard::new();
        let w = window(at(12, 19, 0));
        board.toggle_select(date(13), &w).expect("select 13");
        board.toggle_select(date(20), &w).expect("select 20");
        board.drain_events();

        let command = board.begin_submit().expect("begin submit");
        assert_eq!(command.dates, vec![date(13), date(20)]);
        assert_eq!(board.day_state(date(20)), DayState::Submitting);
        assert!(matches!(board.begin_submit(), Err(FlowError::InFlight { .. })));
        assert!(matches!(
            board.toggle_select(date(20), &w),
            Err(FlowError::InFlight { .. })
        ));

        board
            .finish_submit(&command, Ok(CreateReport::default()))
            .expect("finish");
        assert_eq!(board.selection().count(), 0);
        assert_eq!(board.drain_events(), vec![FlowEvent::RefreshRequested]);
    }

    #[test]
    fn submit_failure_keeps_selection() {
        let mut board = ReservationBoard::new();
        let w = window(at(12, 19, 0));
        board.toggle_select(date(20), &w).expect("select");
        board.drain_events();

        let command = board.begin_submit().expect("begin");
        board
            .finish_submit(&command, Err("connection reset".to_string()))
            .expect("finish");

        assert_eq!(board.day_state(date(20)), DayState::Selected);
        assert!(board.reservation(date(20)).is_none());
        assert_eq!(
            board.drain_events(),
            vec![FlowEvent::CommandFailed {
                command: CommandKind::Create,
                dates: vec![date(20)],
                message: "connection reset".to_string(),
            }]
        );
    }

    #[test]
    fn partial_rejection_keeps_only_rejected_dates() {
        let mut board = ReservationBoard::new();
        let w = window(at(12, 19, 0));
        board.toggle_select(date(15), &w).expect("select");
        board.toggle_select(date(16), &w).expect("select");
        let command = board.begin_submit().expect("begin");
        board.drain_events();

        board
            .finish_submit(&command, Ok(CreateReport {
                rejected: vec![RejectedDate {
                    date: date(16),
                    reason: "duplicated".to_string(),
                }],
            }))
            .expect("finish");

        assert_eq!(board.selection().collect::<Vec<_>>(), vec![date(16)]);
        let events = board.drain_events();
        assert!(events.contains(&FlowEvent::RefreshRequested));
        assert!(events.iter().any(|e| matches!(
            e,
            FlowEvent::CommandFailed { command: CommandKind::Create, dates, .. } if dates == &vec![date(16)]
        )));
    }

    #[test]
    fn cancel_flow() {
        let mut board = board_with(&[confirmed(13, 7)]);
        assert_eq!(board.confirm_cancel(), Err(FlowError::NoCancelPending));

        board.request_cancel(date(13)).expect("prompt");
        let command = board.confirm_cancel().expect("confirm");
        assert_eq!(command.date, date(13));
        assert_eq!(board.day_state(date(13)), DayState::Submitting);

        board.finish_cancel(&command, Err("500".to_string())).expect("finish");
        assert!(matches!(board.day_state(date(13)), DayState::Reserved { .. }));

        board.request_cancel(date(13)).expect("prompt again");
        let command = board.confirm_cancel().expect("confirm again");
        board.drain_events();
        board.finish_cancel(&command, Ok(())).expect("finish");
        assert_eq!(board.day_state(date(13)), DayState::None);
        assert_eq!(board.drain_events(), vec![FlowEvent::RefreshRequested]);
    }

    #[test]
    fn cancelling_unreserved_day_is_rejected() {
        let mut board = board_with(&[]);
        assert_eq!(
            board.request_cancel(date(14)),
            Err(FlowError::NotReserved { date: date(14) })
        );
        assert_eq!(board.day_state(date(14)), DayState::None);
    }

    #[test]
    fn teaching_toggle_is_optimistic_and_reverts() {
        let mut pending = Reservation::new(date(27), ReservationStatus::Pending);
        pending.reservation_id = Some(9);
        let mut board = board_with(&[confirmed(13, 5), pending]);

        assert_eq!(
            board.begin_teaching_toggle(date(27)),
            Err(FlowError::NotConfirmed { date: date(27) })
        );

        let command = board.begin_teaching_toggle(date(13)).expect("begin");
        assert!(command.apply);
        assert_eq!(command.reservation_id, 5);
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(true));

        board
            .finish_teaching_toggle(&command, Err("timeout".to_string()))
            .expect("finish");
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(false));
        assert!(board.drain_events().contains(&FlowEvent::TeachingReverted {
            date: date(13),
            teaching: false
        }));
    }

    #[test]
    fn refresh_keeps_in_flight_teaching_flip() {
        let mut board = board_with(&[confirmed(13, 5)]);
        let command = board.begin_teaching_toggle(date(13)).expect("begin");

        let month = YearMonth::new(2025, 12).expect("month");
        board.apply_refresh(classify_month(month, &[confirmed(13, 5)], 1));
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(true));

        board.finish_teaching_toggle(&command, Ok(())).expect("finish");
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(true));
        assert_eq!(board.usage_count(), 1);
    }

    #[test]
    fn finishing_without_command_is_an_error() {
        let mut board = ReservationBoard::new();
        let command = CreateCommand {
            dates: vec![date(20)],
        };
        assert_eq!(
            board.finish_submit(&command, Ok(CreateReport::default())),
            Err(FlowError::NotInFlight {
                date: date(20),
                command: CommandKind::Create
            })
        );
    }

    #[test]
    fn concurrent_teaching_toggles_settle_independently() {
        let mut board = board_with(&[confirmed(13, 5), confirmed(20, 6)]);
        let first = board.begin_teaching_toggle(date(13)).expect("begin 13");
        let second = board.begin_teaching_toggle(date(20)).expect("begin 20");
        board.drain_events();

        board
            .finish_teaching_toggle(&first, Err("timeout".to_string()))
            .expect("finish 13");
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(false));
        assert_eq!(board.reservation(date(20)).map(|d| d.teaching), Some(true));
        assert_eq!(board.day_state(date(20)), DayState::Submitting);
        assert!(!board.drain_events().contains(&FlowEvent::TeachingReverted {
            date: date(20),
            teaching: false
        }));

        board.finish_teaching_toggle(&second, Ok(())).expect("finish 20");
        assert_eq!(
            board.day_state(date(20)),
            DayState::Reserved {
                status: ReservationStatus::Confirmed,
                teaching: true
            }
        );
        assert_eq!(
            board.finish_teaching_toggle(&second, Ok(())),
            Err(FlowError::NotInFlight {
                date: date(20),
                command: CommandKind::Teaching
            })
        );
    }

    #[test]
    fn one_cancel_reply_leaves_other_cancel_in_flight() {
        let mut board = board_with(&[confirmed(13, 5), confirmed(20, 6)]);
        board.request_cancel(date(13)).expect("prompt 13");
        let first = board.confirm_cancel().expect("confirm 13");
        board.request_cancel(date(20)).expect("prompt 20");
        let second = board.confirm_cancel().expect("confirm 20");

        board.finish_cancel(&first, Ok(())).expect("finish 13");
        assert_eq!(board.day_state(date(13)), DayState::None);
        assert_eq!(board.day_state(date(20)), DayState::Submitting);

        board
            .finish_cancel(&second, Err("500".to_string()))
            .expect("finish 20");
        assert!(matches!(board.day_state(date(20)), DayState::Reserved { .. }));
    }

    #[test]
    fn open_cancel_prompt_blocks_other_commands_on_that_day() {
        let mut board = board_with(&[confirmed(13, 5)]);
        board.request_cancel(date(13)).expect("prompt");

        assert_eq!(
            board.begin_teaching_toggle(date(13)),
            Err(FlowError::CancelPending { date: date(13) })
        );
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(false));
        assert_eq!(
            board.toggle_select(date(13), &window(at(10, 10, 0))),
            Err(FlowError::CancelPending { date: date(13) })
        );

        let command = board.confirm_cancel().expect("confirm");
        board.finish_cancel(&command, Ok(())).expect("finish");
        assert_eq!(board.day_state(date(13)), DayState::None);
    }

    #[test]
    fn confirm_cancel_refuses_a_busy_day() {
        let mut board = board_with(&[confirmed(13, 5)]);
        board.request_cancel(date(13)).expect("prompt");
        board.dismiss_cancel();
        let toggle = board.begin_teaching_toggle(date(13)).expect("begin");
        // A stale prompt for a day that went busy afterwards.
        board.cancel_prompt = Some(date(13));

        assert_eq!(
            board.confirm_cancel(),
            Err(FlowError::InFlight {
                date: date(13),
                command: CommandKind::Teaching
            })
        );
        assert_eq!(board.cancel_prompt(), Some(date(13)));
        board.finish_teaching_toggle(&toggle, Ok(())).expect("finish");
        assert_eq!(board.reservation(date(13)).map(|d| d.teaching), Some(true));
    }

    #[test]
    fn duplicate_rows_surface_as_warning() {
        let mut board = ReservationBoard::new();
        let month = YearMonth::new(2025, 12).expect("month");
        board.apply_refresh(classify_month(month, &[confirmed(20, 1), confirmed(20, 2)], 0));
        assert_eq!(
            board.drain_events(),
            vec![FlowEvent::DataIntegrityWarning {
                date: date(20),
                count: 2
            }]
        );
    }
}
