//! Which scheduled trips should be operating at a given instant.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::schedule::{ScheduleConsumer, ScheduleRecord, ServiceCalendar, ServicePeriod};

const SECONDS_PER_DAY: i32 = 86_400;

/// Activation window of one trip, in seconds since local midnight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripActivation {
    pub service_id: String,
    /// First departure; zero if the trip has no stop times.
    pub start_time: i32,
    /// Last arrival; zero if the trip has no stop times.
    pub end_time: i32,
    /// Departures synthesized from frequencies.txt headways.
    pub frequency_starts: Vec<i32>,
}

impl TripActivation {
    pub fn duration(&self) -> i32 {
        self.end_time - self.start_time
    }

    /// Whether the trip is running `seconds` after midnight of a day its
    /// service is active.
    ///
    /// Matches the trip's own `[start_time, end_time]` window, or any
    /// synthesized frequency start extended by the template trip's duration.
    pub fn is_running_at(&self, seconds: i32) -> bool {
        if self.start_time <= seconds && seconds <= self.end_time {
            return true;
        }
        let duration = self.duration();
        duration > 0
            && self
                .frequency_starts
                .iter()
                .any(|&s| s <= seconds && seconds <= s + duration)
    }
}

/// Answers "which trips are running now?" from trips, frequencies and service
/// calendars.
///
/// Build it by streaming records, then query; queries take `&self` and may run
/// concurrently once ingestion is done.
#[derive(Debug)]
pub struct ActiveTripScheduler {
    trips: BTreeMap<String, TripActivation>,
    services: HashMap<String, ServiceCalendar>,
    timezone: Tz,
}

impl Default for ActiveTripScheduler {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl ScheduleConsumer for ActiveTripScheduler {
    fn consume(&mut self, record: &ScheduleRecord) {
        match record {
            ScheduleRecord::Agency(agency) => {
                if let Ok(tz) = agency.agency_timezone.parse::<Tz>() {
                    self.timezone = tz;
                }
            }
            ScheduleRecord::Calendar(calendar) => {
                self.services
                    .entry(calendar.service_id.clone())
                    .or_insert_with(|| ServiceCalendar::empty(&calendar.service_id))
                    .set_calendar(calendar);
            }
            ScheduleRecord::CalendarDate(exception) => {
                self.services
                    .entry(exception.service_id.clone())
                    .or_insert_with(|| ServiceCalendar::empty(&exception.service_id))
                    .add_exception(exception);
            }
            ScheduleRecord::Frequency(freq) => {
                self.trips
                    .entry(freq.trip_id.clone())
                    .or_default()
                    .frequency_starts
                    .extend(freq.starts());
            }
            ScheduleRecord::Trip(trip) => {
                let activation = self.trips.entry(trip.trip_id.clone()).or_default();
                activation.service_id = trip.service_id.clone();
                activation.start_time = trip.first_departure().unwrap_or(0);
                activation.end_time = trip.last_arrival().unwrap_or(0);
            }
            ScheduleRecord::FeedInfo(_) | ScheduleRecord::Route(_) | ScheduleRecord::Stop(_) => {}
        }
    }
}

impl ActiveTripScheduler {
    /// Creates an empty scheduler using `timezone` until an agency declares a
    /// valid one.
    pub fn new(timezone: Tz) -> Self {
        Self {
            trips: BTreeMap::new(),
            services: HashMap::new(),
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TripActivation> {
        self.trips.get(trip_id)
    }

    /// Trip ids operating at the local wall-clock time `now`.
    ///
    /// Each trip is checked twice: against yesterday's service with the time
    /// pushed past 24:00, and against today's. A trip matching both is returned
    /// twice; deduplicate if uniqueness matters. Trips whose service id is
    /// unknown are skipped.
    pub fn active_trips(&self, now: NaiveDateTime) -> Vec<String> {
        let today = now.date();
        let time = now.time();
        let seconds = (time.hour() * 3600 + time.minute() * 60 + time.second()) as i32;

        let mut offsets: Vec<(NaiveDate, i32)> = Vec::with_capacity(2);
        if let Some(yesterday) = today.pred_opt() {
            offsets.push((yesterday, seconds + SECONDS_PER_DAY));
        }
        offsets.push((today, seconds));

        let mut service_days: HashMap<(&str, NaiveDate), bool> = HashMap::new();
        let mut active = Vec::new();

        for (day, day_seconds) in offsets {
            for (trip_id, trip) in &self.trips {
                let Some(service) = self.services.get(&trip.service_id) else {
                    trace!(%trip_id, service_id = %trip.service_id, "Unknown service, trip skipped");
                    continue;
                };
                let running_today = *service_days
                    .entry((trip.service_id.as_str(), day))
                    .or_insert_with(|| service.is_active(day));
                if running_today && trip.is_running_at(day_seconds) {
                    active.push(trip_id.clone());
                }
            }
        }

        debug!(now = %now, count = active.len(), "Active trips computed");
        active
    }

    /// Like [`active_trips`](Self::active_trips) for an absolute instant,
    /// converted to the schedule's timezone.
    pub fn active_trips_at(&self, now: DateTime<Utc>) -> Vec<String> {
        self.active_trips(now.with_timezone(&self.timezone).naive_local())
    }
}
