//! Drives a [`ReservationBoard`] against a backend for one crew.

use std::sync::Arc;

use tracing::{info, warn};

use seasonroom_core::flow::{CreateReport, TapOutcome};
use seasonroom_core::occupancy::bucket_summary;
use seasonroom_core::{
    Availability, AvailabilityWindow, CalendarDate, Clock, CrewId, CrewReservationSummary,
    CrewSettings, FlowError, FlowEvent, MonthClassification, OccupancyTier, ReservationBoard,
    YearMonth, classify_month,
};

use crate::backend::ReservationBackend;
use crate::cache::CalendarCache;
use crate::dto::GuestInfo;
use crate::error::{ClientError, SessionError};
use crate::validate::guest_info;

pub struct ReservationSession<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    crew_id: CrewId,
    settings: Option<CrewSettings>,
    cache: Arc<CalendarCache>,
    board: ReservationBoard,
    month: YearMonth,
}

impl<B: ReservationBackend> ReservationSession<B> {
    pub fn new(backend: B, clock: Arc<dyn Clock>, crew_id: CrewId) -> Self {
        let month = YearMonth::of(clock.today());
        Self {
            backend,
            clock,
            crew_id,
            settings: None,
            cache: Arc::new(CalendarCache::new()),
            board: ReservationBoard::new(),
            month,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CalendarCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn crew_id(&self) -> CrewId {
        self.crew_id
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn settings(&self) -> Option<&CrewSettings> {
        self.settings.as_ref()
    }

    pub fn board(&self) -> &ReservationBoard {
        &self.board
    }

    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        self.board.drain_events()
    }

    pub async fn load_settings(&mut self) -> Result<&CrewSettings, ClientError> {
        let settings = self.backend.crew_settings(self.crew_id).await?;
        if settings.opening_rule.is_none() {
            warn!(crew_id = self.crew_id, "crew has no usable opening rule; next week stays closed");
        }
        Ok(self.settings.insert(settings))
    }

    /// The booking horizon at this instant. Until settings are loaded next
    /// week counts as closed.
    pub fn window(&self) -> AvailabilityWindow {
        let rule = self.settings.as_ref().and_then(|s| s.opening_rule.as_ref());
        AvailabilityWindow::at(self.clock.now(), rule)
    }

    pub fn availability(&self, date: CalendarDate) -> Availability {
        self.window().evaluate(date)
    }

    pub async fn show_month(
        &mut self,
        month: YearMonth,
    ) -> Result<MonthClassification, ClientError> {
        self.month = month;
        self.refresh().await
    }

    /// Re-reads the viewed month, from cache when possible, and feeds it to
    /// the board.
    #[tracing::instrument(skip(self), fields(crew_id = self.crew_id, month = %self.month))]
    pub async fn refresh(&mut self) -> Result<MonthClassification, ClientError> {
        let snapshot = match self.cache.get(self.crew_id, self.month) {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = self
                    .backend
                    .month_reservations(self.crew_id, self.month)
                    .await?;
                self.cache.insert(self.crew_id, self.month, snapshot.clone());
                snapshot
            }
        };
        let classification =
            classify_month(self.month, &snapshot.reservations, snapshot.usage_count);
        self.board.apply_refresh(classification.clone());
        Ok(classification)
    }

    pub fn tap(&mut self, date: CalendarDate) -> Result<TapOutcome, FlowError> {
        let window = self.window();
        self.board.tap(date, &window)
    }

    pub fn toggle_select(&mut self, date: CalendarDate) -> Result<bool, FlowError> {
        let window = self.window();
        self.board.toggle_select(date, &window)
    }

    pub fn clear_selection(&mut self) {
        self.board.clear_selection();
    }

    /// Sends the whole selection as one batch. Guest details are checked
    /// and normalized before anything is marked in flight.
    pub async fn submit(&mut self, guest: Option<&GuestInfo>) -> Result<CreateReport, SessionError> {
        let guest = guest
            .map(|g| guest_info(&g.name, &g.phone_number))
            .transpose()?;
        let command = self.board.begin_submit()?;
        let result = self
            .backend
            .create_reservations(self.crew_id, &command.dates, guest.as_ref())
            .await;
        self.cache.invalidate_crew(self.crew_id);

        match result {
            Ok(report) => {
                self.board.finish_submit(&command, Ok(report.clone()))?;
                info!(
                    requested = command.dates.len(),
                    rejected = report.rejected.len(),
                    "reservation batch done"
                );
                self.refresh_after_command().await;
                Ok(report)
            }
            Err(err) => {
                self.board.finish_submit(&command, Err(err.to_string()))?;
                Err(err.into())
            }
        }
    }

    pub fn request_cancel(&mut self, date: CalendarDate) -> Result<(), FlowError> {
        self.board.request_cancel(date)
    }

    pub fn dismiss_cancel(&mut self) {
        self.board.dismiss_cancel();
    }

    pub async fn confirm_cancel(&mut self) -> Result<CalendarDate, SessionError> {
        let command = self.board.confirm_cancel()?;
        let result = self
            .backend
            .cancel_reservation(self.crew_id, command.date)
            .await;
        self.cache.invalidate_crew(self.crew_id);

        match result {
            Ok(()) => {
                self.board.finish_cancel(&command, Ok(()))?;
                self.refresh_after_command().await;
                Ok(command.date)
            }
            Err(err) => {
                self.board.finish_cancel(&command, Err(err.to_string()))?;
                Err(err.into())
            }
        }
    }

    /// Flips teaching on a confirmed reservation. Returns the flag the
    /// server now holds.
    pub async fn toggle_teaching(&mut self, date: CalendarDate) -> Result<bool, SessionError> {
        let command = self.board.begin_teaching_toggle(date)?;
        let result = self
            .backend
            .set_teaching(self.crew_id, command.reservation_id, command.apply)
            .await;
        self.cache.invalidate_crew(self.crew_id);

        match result {
            Ok(()) => {
                self.board.finish_teaching_toggle(&command, Ok(()))?;
                self.refresh_after_command().await;
                Ok(command.apply)
            }
            Err(err) => {
                self.board.finish_teaching_toggle(&command, Err(err.to_string()))?;
                Err(err.into())
            }
        }
    }

    /// Crew-wide headcount for `date` and its congestion tier.
    pub async fn day_occupancy(
        &self,
        date: CalendarDate,
    ) -> Result<(CrewReservationSummary, OccupancyTier), ClientError> {
        let summary = self.backend.day_summary(self.crew_id, date).await?;
        Ok((summary, bucket_summary(&summary)))
    }

    async fn refresh_after_command(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "refresh after command failed; view may be stale");
        }
    }
}
