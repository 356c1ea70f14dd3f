pub mod aggregator;
pub mod availability;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod flow;
pub mod occupancy;
pub mod reservation;

pub use aggregator::{
  DayClassification,
  DayStatus,
  MonthClassification,
  classify,
  classify_month
};
pub use availability::{
  Availability,
  AvailabilityWindow,
  is_day_available
};
pub use calendar::{
  CalendarDate,
  MonthBounds,
  YearMonth
};
pub use clock::{
  Clock,
  FixedClock,
  SystemClock
};
pub use flow::{
  FlowError,
  FlowEvent,
  ReservationBoard
};
pub use occupancy::{
  OccupancyTier,
  bucket
};
pub use reservation::{
  Capacity,
  CrewId,
  CrewReservationSummary,
  CrewSettings,
  OpeningRule,
  Reservation,
  ReservationId,
  ReservationStatus
};
