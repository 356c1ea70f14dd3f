use std::sync::Arc;

use async_trait::async_trait;

use seasonroom_core::flow::CreateReport;
use seasonroom_core::{
    CalendarDate, CrewId, CrewReservationSummary, CrewSettings, ReservationId, YearMonth,
};

use crate::api::ApiClient;
use crate::cache::MonthSnapshot;
use crate::dto::{GuestInfo, active_reservations};
use crate::error::ClientError;

/// What a [`crate::ReservationSession`] needs from the server.
#[async_trait]
pub trait ReservationBackend: Send + Sync {
    async fn crew_settings(&self, crew_id: CrewId) -> Result<CrewSettings, ClientError>;

    async fn month_reservations(
        &self,
        crew_id: CrewId,
        month: YearMonth,
    ) -> Result<MonthSnapshot, ClientError>;

    async fn create_reservations(
        &self,
        crew_id: CrewId,
        dates: &[CalendarDate],
        guest: Option<&GuestInfo>,
    ) -> Result<CreateReport, ClientError>;

    async fn cancel_reservation(&self, crew_id: CrewId, date: CalendarDate)
    -> Result<(), ClientError>;

    async fn set_teaching(
        &self,
        crew_id: CrewId,
        reservation_id: ReservationId,
        apply: bool,
    ) -> Result<(), ClientError>;

    async fn day_summary(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<CrewReservationSummary, ClientError>;
}

#[async_trait]
impl ReservationBackend for ApiClient {
    async fn crew_settings(&self, crew_id: CrewId) -> Result<CrewSettings, ClientError> {
        Ok(self.crew(crew_id).await?.to_settings())
    }

    async fn month_reservations(
        &self,
        crew_id: CrewId,
        month: YearMonth,
    ) -> Result<MonthSnapshot, ClientError> {
        let calendar = self.my_calendar(crew_id, month).await?;
        Ok(MonthSnapshot {
            reservations: active_reservations(&calendar.my_reservations),
            usage_count: calendar.usage_count,
        })
    }

    async fn create_reservations(
        &self,
        crew_id: CrewId,
        dates: &[CalendarDate],
        guest: Option<&GuestInfo>,
    ) -> Result<CreateReport, ClientError> {
        let response = ApiClient::create_reservations(self, crew_id, dates, guest).await?;
        Ok(response.to_report())
    }

    async fn cancel_reservation(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<(), ClientError> {
        self.cancel_reservations(crew_id, &[date]).await
    }

    async fn set_teaching(
        &self,
        crew_id: CrewId,
        reservation_id: ReservationId,
        apply: bool,
    ) -> Result<(), ClientError> {
        if apply {
            self.apply_teaching(crew_id, reservation_id).await
        } else {
            self.withdraw_teaching(crew_id, reservation_id).await
        }
    }

    async fn day_summary(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<CrewReservationSummary, ClientError> {
        let settings = self.crew_settings(crew_id).await?;
        let detail = self.reservation_detail(crew_id, date).await?;
        Ok(CrewReservationSummary {
            date,
            booked: detail.booked,
            capacity: settings.capacity.for_day(detail.capacity),
        })
    }
}

#[async_trait]
impl<B: ReservationBackend + ?Sized> ReservationBackend for Arc<B> {
    async fn crew_settings(&self, crew_id: CrewId) -> Result<CrewSettings, ClientError> {
        (**self).crew_settings(crew_id).await
    }

    async fn month_reservations(
        &self,
        crew_id: CrewId,
        month: YearMonth,
    ) -> Result<MonthSnapshot, ClientError> {
        (**self).month_reservations(crew_id, month).await
    }

    async fn create_reservations(
        &self,
        crew_id: CrewId,
        dates: &[CalendarDate],
        guest: Option<&GuestInfo>,
    ) -> Result<CreateReport, ClientError> {
        (**self).create_reservations(crew_id, dates, guest).await
    }

    async fn cancel_reservation(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<(), ClientError> {
        (**self).cancel_reservation(crew_id, date).await
    }

    async fn set_teaching(
        &self,
        crew_id: CrewId,
        reservation_id: ReservationId,
        apply: bool,
    ) -> Result<(), ClientError> {
        (**self).set_teaching(crew_id, reservation_id, apply).await
    }

    async fn day_summary(
        &self,
        crew_id: CrewId,
        date: CalendarDate,
    ) -> Result<CrewReservationSummary, ClientError> {
        (**self).day_summary(crew_id, date).await
    }
}
