//! Wire shapes of the season-room backend. Every response is wrapped in an
//! [`Envelope`]; field names follow the server, which mixes snake_case and
//! camelCase.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use seasonroom_core::{
    Capacity, CrewId, CrewSettings, OccupancyTier, OpeningRule, Reservation, ReservationId,
    ReservationStatus,
};
use seasonroom_core::flow::{CreateReport, RejectedDate};

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Error bodies are envelopes too, but nothing in them is guaranteed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrewRef {
    pub crew_id: CrewId,
    pub crew_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub crew: Option<CrewRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrewDetail {
    pub crew_id: CrewId,
    pub name: String,
    #[serde(default)]
    pub reservation_day: Option<String>,
    #[serde(default)]
    pub reservation_time: Option<String>,
    #[serde(default, rename = "dailyCapacity")]
    pub daily_capacity: Option<u32>,
    /// Absent on older servers, which always enforce `dailyCapacity`.
    #[serde(default = "default_capacity_limited", rename = "isCapacityLimited")]
    pub is_capacity_limited: bool,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub president_name: Option<String>,
}

fn default_capacity_limited() -> bool {
    true
}

impl CrewDetail {
    pub fn to_settings(&self) -> CrewSettings {
        CrewSettings {
            crew_id: self.crew_id,
            name: self.name.clone(),
            opening_rule: OpeningRule::from_settings(
                self.reservation_day.as_deref(),
                self.reservation_time.as_deref(),
            ),
            capacity: Capacity::from_settings(self.daily_capacity, self.is_capacity_limited),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MyReservation {
    pub date: NaiveDate,
    pub status: String,
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
    #[serde(default)]
    pub crew_id: Option<CrewId>,
    #[serde(default)]
    pub teaching: bool,
    #[serde(default)]
    pub waiting_order: Option<u32>,
}

impl MyReservation {
    /// `None` for cancelled rows.
    pub fn to_reservation(&self) -> Option<Reservation> {
        let Some(status) = ReservationStatus::from_wire(&self.status) else {
            debug!(date = %self.date, status = %self.status, "dropping cancelled reservation");
            return None;
        };
        Some(Reservation {
            reservation_id: self.reservation_id,
            crew_id: self.crew_id,
            date: self.date,
            status,
            teaching: self.teaching,
            waiting_order: self.waiting_order,
        })
    }
}

pub fn active_reservations(rows: &[MyReservation]) -> Vec<Reservation> {
    rows.iter().filter_map(MyReservation::to_reservation).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MyCalendar {
    #[serde(default)]
    pub my_reservations: Vec<MyReservation>,
    #[serde(default)]
    pub usage_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestInfo {
    pub name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReservationRequest {
    pub dates: Vec<String>,
    #[serde(rename = "guestInfo", skip_serializing_if = "Option::is_none")]
    pub guest_info: Option<GuestInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelReservationRequest {
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateResult {
    pub date: NaiveDate,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl DateResult {
    /// `created`, `waiting` and `confirmed` mean the server recorded the
    /// date; `duplicated`, `sold_out`, `closed` and `invalid` do not.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "created" | "waiting" | "confirmed"
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BatchSummary {
    #[serde(default)]
    pub requested: u32,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
}

/// Batch create answer. Older servers send a single
/// `{reservationId, status}` instead of per-date results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReservationResponse {
    #[serde(default)]
    pub results: Vec<DateResult>,
    #[serde(default)]
    pub summary: Option<BatchSummary>,
    #[serde(default, alias = "reservationId")]
    pub reservation_id: Option<ReservationId>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CreateReservationResponse {
    pub fn to_report(&self) -> CreateReport {
        let rejected = self
            .results
            .iter()
            .filter(|r| !r.is_accepted())
            .map(|r| RejectedDate {
                date: r.date,
                reason: r.reason.clone().unwrap_or_else(|| r.status.clone()),
            })
            .collect();
        CreateReport { rejected }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub teaching: bool,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "phoneNumber")]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub registered_by_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationDetail {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub booked: u32,
    #[serde(default, rename = "waitingCount")]
    pub waiting_count: u32,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub member_list: Vec<Member>,
    #[serde(default)]
    pub waiting_member_list: Vec<Member>,
    #[serde(default)]
    pub my_reservation: Option<MyReservation>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct CrewCalendarDay {
    pub date: NaiveDate,
    pub occupancy_status: OccupancyTier,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewCalendar {
    #[serde(default)]
    pub calendar: Vec<CrewCalendarDay>,
    #[serde(default)]
    pub my_reservations: Vec<MyReservation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use seasonroom_core::{Capacity, ReservationStatus};

    use super::{CreateReservationResponse, CrewDetail, Envelope, MyCalendar, ReservationDetail, active_reservations};

    #[test]
    fn crew_detail_maps_to_settings() {
        let json = r#"{"crew_id":3,"name":"Powder","reservation_day":"FRIDAY","reservation_time":"18:00","dailyCapacity":20,"isCapacityLimited":true}"#;
        let crew: CrewDetail = serde_json::from_str(json).expect("crew");
        let settings = crew.to_settings();
        assert_eq!(settings.capacity, Capacity::Limited(20));
        assert!(settings.opening_rule.is_some());

        let bare = r#"{"crew_id":3,"name":"Powder","dailyCapacity":12}"#;
        let crew: CrewDetail = serde_json::from_str(bare).expect("crew");
        let settings = crew.to_settings();
        assert_eq!(settings.capacity, Capacity::Limited(12));
        assert!(settings.opening_rule.is_none());
    }

    #[test]
    fn calendar_drops_cancelled_rows() {
        let json = r#"{"code":200,"message":"ok","data":{"my_reservations":[
            {"date":"2025-12-13","status":"confirmed","reservation_id":1,"teaching":true},
            {"date":"2025-12-20","status":"waiting","reservation_id":2,"waiting_order":3},
            {"date":"2025-12-21","status":"CANCELLED","reservation_id":4}
        ],"usage_count":5}}"#;
        let envelope: Envelope<MyCalendar> = serde_json::from_str(json).expect("envelope");
        let calendar = envelope.data.expect("data");
        assert_eq!(calendar.usage_count, 5);
        let active = active_reservations(&calendar.my_reservations);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].status, ReservationStatus::Confirmed);
        assert!(active[0].teaching);
        assert_eq!(active[1].waiting_order, Some(3));
    }

    #[test]
    fn batch_results_become_rejections() {
        let json = r#"{"club_id":3,"results":[
            {"date":"2025-12-13","status":"created","reservation_id":10},
            {"date":"2025-12-20","status":"waiting","reservation_id":11},
            {"date":"2025-12-21","status":"duplicated","reason":"already reserved"},
            {"date":"2025-12-22","status":"closed"}
        ],"summary":{"requested":4,"succeeded":2,"failed":2}}"#;
        let response: CreateReservationResponse = serde_json::from_str(json).expect("response");
        let report = response.to_report();
        let rejected: Vec<_> = report.rejected.iter().map(|r| (r.date.to_string(), r.reason.as_str())).collect();
        assert_eq!(
            rejected,
            vec![
                ("2025-12-21".to_string(), "already reserved"),
                ("2025-12-22".to_string(), "closed"),
            ]
        );
        assert_eq!(response.summary.map(|s| s.failed), Some(2));

        let legacy: CreateReservationResponse =
            serde_json::from_str(r#"{"reservationId":9,"status":"created"}"#).expect("legacy");
        assert!(legacy.to_report().rejected.is_empty());
        assert_eq!(legacy.reservation_id, Some(9));
    }

    #[test]
    fn reservation_detail_defaults() {
        let json = r#"{"date":"2025-12-13","booked":9,"capacity":20,"member_list":[{"name":"Kim","teaching":true}]}"#;
        let detail: ReservationDetail = serde_json::from_str(json).expect("detail");
        assert_eq!(detail.date, NaiveDate::from_ymd_opt(2025, 12, 13));
        assert_eq!(detail.waiting_count, 0);
        assert!(detail.member_list[0].teaching);
    }
}
