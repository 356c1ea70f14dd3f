use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reservation::{Capacity, CrewReservationSummary};

/// Below this ratio (in tenths) a day is LOW.
const MEDIUM_FROM_TENTHS: u64 = 4;
/// At or above this ratio (in tenths) a day is HIGH.
const HIGH_FROM_TENTHS: u64 = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OccupancyTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for OccupancyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Congestion tier for `booked` people against `capacity`.
///
/// Ratios are compared in integer tenths so the 0.4 and 0.8 boundaries are
/// exact. Unlimited or zero capacity is always LOW.
pub fn bucket(booked: u32, capacity: Capacity) -> OccupancyTier {
    let cap = match capacity {
        Capacity::Limited(cap) if cap > 0 => u64::from(cap),
        _ => return OccupancyTier::Low,
    };
    let scaled = u64::from(booked) * 10;
    if scaled < cap * MEDIUM_FROM_TENTHS {
        OccupancyTier::Low
    } else if scaled < cap * HIGH_FROM_TENTHS {
        OccupancyTier::Medium
    } else {
        OccupancyTier::High
    }
}

pub fn bucket_summary(summary: &CrewReservationSummary) -> OccupancyTier {
    bucket(summary.booked, summary.capacity)
}

/// Booked fraction of capacity; 0 when there is no usable limit.
pub fn ratio(booked: u32, capacity: Capacity) -> f64 {
    match capacity {
        Capacity::Limited(cap) if cap > 0 => f64::from(booked) / f64::from(cap),
        _ => 0.0,
    }
}
