//! Typed static-schedule records as delivered by the host pipeline.
//!
//! Field semantics follow GTFS: times are seconds since local midnight (and may
//! exceed 86400 for service running past midnight), dates are calendar dates and
//! timezones are IANA identifiers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One record of the inbound schedule stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleRecord {
    Agency(Agency),
    FeedInfo(FeedInfo),
    Route(Route),
    Stop(Stop),
    Calendar(Calendar),
    CalendarDate(CalendarDate),
    Frequency(Frequency),
    Trip(Trip),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub agency_id: String,
    pub agency_timezone: String,
}

/// Feed-declared validity dates (from feed_info.txt).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_start_date: Option<NaiveDate>,
    pub feed_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    /// 0 = stop or platform, 1 = station, 2 = entrance, 3 = generic node, 4 = boarding area
    #[serde(default)]
    pub location_type: i32,
}

/// A weekly service pattern (from calendar.txt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub days: [bool; 7], // mon, tue, wed, thu, fri, sat, sun
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
}

/// A headway-based repetition of a trip (from frequencies.txt).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub trip_id: String,
    pub start_time: i32,
    pub end_time: i32,
    pub headway_secs: i32,
}

impl Frequency {
    /// Number of whole headways fitting in `[start_time, end_time)`.
    pub fn repeat_count(&self) -> i64 {
        if self.headway_secs <= 0 || self.end_time <= self.start_time {
            return 0;
        }
        i64::from(self.end_time - self.start_time) / i64::from(self.headway_secs)
    }

    /// Synthesized departures `s` with `start_time <= s < end_time`.
    pub fn starts(&self) -> impl Iterator<Item = i32> + '_ {
        let range = if self.headway_secs > 0 {
            self.start_time..self.end_time
        } else {
            0..0
        };
        range.step_by(self.headway_secs.max(1) as usize)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: String,
    pub stop_sequence: u32,
    pub arrival_time: Option<i32>,
    pub departure_time: Option<i32>,
}

/// A trip with its stop times, ordered by stop_sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    pub direction_id: Option<u32>,
    #[serde(default)]
    pub stop_times: Vec<StopTime>,
}

impl Trip {
    /// First departure of the trip, falling back to the first arrival.
    pub fn first_departure(&self) -> Option<i32> {
        self.stop_times
            .first()
            .and_then(|st| st.departure_time.or(st.arrival_time))
    }

    /// Last arrival of the trip, falling back to the last departure.
    pub fn last_arrival(&self) -> Option<i32> {
        self.stop_times
            .last()
            .and_then(|st| st.arrival_time.or(st.departure_time))
    }
}
