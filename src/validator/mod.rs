//! Realtime message validation against the static schedule.
//!
//! Validation is exhaustive: every applicable rule is evaluated and each failure
//! becomes a [`Violation`]. A non-conforming message yields a non-empty list,
//! never an error. Two entry points share the same rules:
//!
//! - [`Validator`] takes an explicit [`ScheduleSnapshot`] and previous header.
//! - [`StreamingValidator`] owns its snapshot, fills it while the schedule
//!   streams in, and remembers the last header it validated.

pub mod rules;
pub mod snapshot;

pub use rules::{Rule, Violation};
pub use snapshot::{ScheduleSnapshot, TripInfo};

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::gtfs_rt::feed_header::Incrementality;
use crate::gtfs_rt::trip_descriptor::ScheduleRelationship as TripRelationship;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship as StopRelationship;
use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate};
use crate::schedule::{ScheduleConsumer, ScheduleRecord};

/// Parses a `HH:MM:SS` wall-clock time (hours may exceed 23) into seconds.
pub fn parse_wall_clock(value: &str) -> Option<u32> {
    let mut parts = value.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let two_digits = |p: &str| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit());
    if !(two_digits(h) && two_digits(m) && two_digits(s)) {
        return None;
    }
    let (h, m, s): (u32, u32, u32) = (h.parse().ok()?, m.parse().ok()?, s.parse().ok()?);
    if m > 59 || s > 59 {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}

/// Parses a `YYYYMMDD` service date.
pub fn parse_service_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}

fn header_present(header: &FeedHeader) -> bool {
    *header != FeedHeader::default()
}

/// Stateless rule evaluator.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validates a whole message. `previous` is the header of the message
    /// validated before this one, if any.
    pub fn validate_feed(
        &self,
        snapshot: &ScheduleSnapshot,
        feed: &FeedMessage,
        previous: Option<&FeedHeader>,
        now: DateTime<Utc>,
    ) -> Vec<Violation> {
        let mut violations = self.validate_header(&feed.header, previous, now);
        let incrementality = feed.header.incrementality();
        for entity in &feed.entity {
            violations.extend(self.validate_entity(snapshot, entity, incrementality));
        }
        debug!(
            entities = feed.entity.len(),
            violations = violations.len(),
            "Feed validated"
        );
        violations
    }

    pub fn validate_header(
        &self,
        header: &FeedHeader,
        previous: Option<&FeedHeader>,
        now: DateTime<Utc>,
    ) -> Vec<Violation> {
        let mut out = Vec::new();
        if !header_present(header) {
            out.push(Violation::new(Rule::HeaderRequired).with_field("header"));
            return out;
        }

        if let (Some(current), Some(prev)) = (header.timestamp, previous.and_then(|p| p.timestamp)) {
            if current < prev {
                out.push(
                    Violation::new(Rule::TimestampDecreased)
                        .with_field("header.timestamp")
                        .with_value(format!("{current} < {prev}")),
                );
            }
        }

        let version = header.gtfs_realtime_version.as_str();
        if !self.config.supported_versions.iter().any(|v| v == version) {
            out.push(
                Violation::new(Rule::InvalidVersion)
                    .with_field("header.gtfs_realtime_version")
                    .with_value(version),
            );
        }

        match header.timestamp {
            None | Some(0) => {
                out.push(Violation::new(Rule::TimestampMissing).with_field("header.timestamp"));
            }
            Some(ts) => {
                let max_allowed = now.timestamp().saturating_add(self.config.max_future_seconds);
                if ts < self.config.min_timestamp || ts > self.config.max_timestamp {
                    out.push(
                        Violation::new(Rule::TimestampOutOfRange)
                            .with_field("header.timestamp")
                            .with_value(ts),
                    );
                } else if i64::try_from(ts).is_ok_and(|ts| ts > max_allowed) {
                    out.push(
                        Violation::new(Rule::TimestampInFuture)
                            .with_field("header.timestamp")
                            .with_value(ts),
                    );
                }
            }
        }

        if header.incrementality.is_none() {
            out.push(Violation::new(Rule::IncrementalityMissing).with_field("header.incrementality"));
        } else if header.incrementality() == Incrementality::Differential {
            out.push(
                Violation::new(Rule::DifferentialUnsupported)
                    .with_field("header.incrementality")
                    .with_value("DIFFERENTIAL"),
            );
        }

        out
    }

    /// Validates one entity; every violation carries a JSON snapshot of it.
    pub fn validate_entity(
        &self,
        snapshot: &ScheduleSnapshot,
        entity: &FeedEntity,
        incrementality: Incrementality,
    ) -> Vec<Violation> {
        let mut out = Vec::new();

        if entity.id.is_empty() {
            out.push(Violation::new(Rule::EntityIdRequired).with_field("entity.id"));
        }
        if entity.is_deleted.is_some() && incrementality != Incrementality::Differential {
            out.push(
                Violation::new(Rule::DeletedOutsideDifferential)
                    .with_field("entity.is_deleted")
                    .with_value(entity.is_deleted()),
            );
        }
        if entity.trip_update.is_none() && entity.vehicle.is_none() && entity.alert.is_none() {
            out.push(Violation::new(Rule::EntityWithoutPayload).with_field("entity"));
        }

        if let Some(trip_update) = &entity.trip_update {
            out.extend(self.validate_trip_update(snapshot, trip_update));
        }
        if let Some(trip) = entity.vehicle.as_ref().and_then(|v| v.trip.as_ref()) {
            check_trip_descriptor(snapshot, trip, &mut out);
        }

        if !out.is_empty() {
            let fragment = serde_json::to_string(entity).ok();
            for v in out.iter_mut().filter(|v| v.entity.is_none()) {
                v.entity = fragment.clone();
            }
        }
        out
    }

    pub fn validate_trip_update(
        &self,
        snapshot: &ScheduleSnapshot,
        trip_update: &TripUpdate,
    ) -> Vec<Violation> {
        let mut out = Vec::new();
        check_trip_descriptor(snapshot, &trip_update.trip, &mut out);
        check_stop_time_updates(snapshot, trip_update, &mut out);
        out
    }
}

fn check_trip_descriptor(
    snapshot: &ScheduleSnapshot,
    trip: &TripDescriptor,
    out: &mut Vec<Violation>,
) {
    match trip.trip_id.as_deref().filter(|id| !id.is_empty()) {
        Some(trip_id) => match snapshot.trip(trip_id) {
            None => out.push(
                Violation::new(Rule::TripNotFound)
                    .with_field("trip.trip_id")
                    .with_value(trip_id),
            ),
            Some(info) => {
                if let (Some(rt_direction), Some(direction)) = (trip.direction_id, info.direction_id) {
                    if rt_direction != direction {
                        out.push(
                            Violation::new(Rule::DirectionMismatch)
                                .with_field("trip.direction_id")
                                .with_value(rt_direction),
                        );
                    }
                }
                if let Some(route_id) = trip.route_id.as_deref() {
                    if route_id != info.route_id {
                        out.push(
                            Violation::new(Rule::TripRouteMismatch)
                                .with_field("trip.route_id")
                                .with_value(route_id),
                        );
                    }
                }
                if info.uses_frequencies && (trip.start_time.is_none() || trip.start_date.is_none()) {
                    out.push(Violation::new(Rule::FrequencyTripWithoutStart).with_field("trip"));
                }
            }
        },
        None => {
            if trip.route_id.is_none()
                || trip.direction_id.is_none()
                || trip.start_date.is_none()
                || trip.start_time.is_none()
            {
                out.push(Violation::new(Rule::TripWithoutIdIncomplete).with_field("trip"));
            }
            if trip.schedule_relationship() != TripRelationship::Scheduled {
                out.push(
                    Violation::new(Rule::TripWithoutIdNotScheduled)
                        .with_field("trip.schedule_relationship")
                        .with_value(trip.schedule_relationship().as_str_name()),
                );
            }
        }
    }

    if let Some(route_id) = trip.route_id.as_deref() {
        if !snapshot.has_route(route_id) {
            out.push(
                Violation::new(Rule::RouteNotFound)
                    .with_field("trip.route_id")
                    .with_value(route_id),
            );
        }
    }
    if let Some(start_time) = trip.start_time.as_deref() {
        if parse_wall_clock(start_time).is_none() {
            out.push(
                Violation::new(Rule::InvalidStartTime)
                    .with_field("trip.start_time")
                    .with_value(start_time),
            );
        }
    }
    if let Some(start_date) = trip.start_date.as_deref() {
        if parse_service_date(start_date).is_none() {
            out.push(
                Violation::new(Rule::InvalidStartDate)
                    .with_field("trip.start_date")
                    .with_value(start_date),
            );
        }
    }
}

fn check_stop_time_updates(
    snapshot: &ScheduleSnapshot,
    trip_update: &TripUpdate,
    out: &mut Vec<Violation>,
) {
    let updates = &trip_update.stop_time_update;
    if trip_update.trip.schedule_relationship() != TripRelationship::Canceled && updates.is_empty() {
        out.push(Violation::new(Rule::NoStopTimeUpdates).with_field("trip_update.stop_time_update"));
    }

    let mut max_sequence: Option<u32> = None;
    let mut stop_visits: HashMap<&str, usize> = HashMap::new();
    let mut previous_stop: Option<&str> = None;
    let mut previous_time: Option<i64> = None;

    for update in updates {
        if let Some(sequence) = update.stop_sequence {
            match max_sequence {
                Some(max) if sequence == max => out.push(
                    Violation::new(Rule::RepeatedStopSequence)
                        .with_field("stop_time_update.stop_sequence")
                        .with_value(sequence)
                        .with_entity(update),
                ),
                Some(max) if sequence < max => out.push(
                    Violation::new(Rule::StopSequenceNotSorted)
                        .with_field("stop_time_update.stop_sequence")
                        .with_value(sequence)
                        .with_entity(update),
                ),
                _ => {}
            }
            max_sequence = Some(max_sequence.map_or(sequence, |max| max.max(sequence)));
        }

        let stop_id = update.stop_id.as_deref();
        if let Some(stop_id) = stop_id {
            let visits = stop_visits.entry(stop_id).or_default();
            *visits += 1;
            if *visits > 1 && update.stop_sequence.is_none() {
                out.push(
                    Violation::new(Rule::StopRepeatedWithoutSequence)
                        .with_field("stop_time_update.stop_id")
                        .with_value(stop_id)
                        .with_entity(update),
                );
            }
            if previous_stop == Some(stop_id) {
                out.push(
                    Violation::new(Rule::RepeatedStopId)
                        .with_field("stop_time_update.stop_id")
                        .with_value(stop_id)
                        .with_entity(update),
                );
            }
        }
        previous_stop = stop_id;

        for time in [&update.arrival, &update.departure]
            .into_iter()
            .flatten()
            .filter_map(|event| event.time)
        {
            if previous_time.is_some_and(|prev| time < prev) {
                out.push(
                    Violation::new(Rule::TimesNotIncreasing)
                        .with_field("stop_time_update.time")
                        .with_value(time)
                        .with_entity(update),
                );
            }
            previous_time = Some(time);
        }

        check_stop_time_update(snapshot, update, out);
    }
}

fn check_stop_time_update(
    snapshot: &ScheduleSnapshot,
    update: &StopTimeUpdate,
    out: &mut Vec<Violation>,
) {
    let mut push = |rule: Rule, field: &str| {
        out.push(Violation::new(rule).with_field(field).with_entity(update));
    };

    if update.stop_id.is_none() && update.stop_sequence.is_none() {
        push(Rule::StopTimeUpdateWithoutStop, "stop_time_update");
    }
    if let Some(stop_id) = update.stop_id.as_deref() {
        match snapshot.stop_location_type(stop_id) {
            None => push(Rule::StopNotFound, "stop_time_update.stop_id"),
            Some(0) => {}
            Some(_) => push(Rule::StopLocationType, "stop_time_update.stop_id"),
        }
    }

    let events = [("arrival", &update.arrival), ("departure", &update.departure)];
    match update.schedule_relationship() {
        StopRelationship::Scheduled => {
            if update.arrival.is_none() && update.departure.is_none() {
                push(Rule::ScheduledWithoutTimes, "stop_time_update");
            }
            for (name, event) in events {
                if event.as_ref().is_some_and(|e: &StopTimeEvent| e.delay.is_none() && e.time.is_none()) {
                    push(Rule::EventWithoutDelayOrTime, name);
                }
            }
        }
        StopRelationship::NoData => {
            if update.arrival.is_some() || update.departure.is_some() {
                push(Rule::NoDataWithTimes, "stop_time_update");
            }
        }
        StopRelationship::Skipped | StopRelationship::Unscheduled => {}
    }

    let arrival = update.arrival.as_ref().and_then(|e| e.time);
    let departure = update.departure.as_ref().and_then(|e| e.time);
    if let (Some(arrival), Some(departure)) = (arrival, departure) {
        if arrival > departure {
            push(Rule::DepartureBeforeArrival, "stop_time_update.departure");
        }
    }
}

/// Validator whose snapshot is filled as schedule records stream in.
///
/// Produces the same violations as [`Validator::validate_feed`] over an
/// equivalent snapshot, comparing each message's header with the one
/// validated before it.
#[derive(Debug, Default)]
pub struct StreamingValidator {
    validator: Validator,
    snapshot: ScheduleSnapshot,
    previous_header: Option<FeedHeader>,
}

impl ScheduleConsumer for StreamingValidator {
    fn consume(&mut self, record: &ScheduleRecord) {
        self.snapshot.consume(record);
    }
}

impl StreamingValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            validator: Validator::new(config),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> &ScheduleSnapshot {
        &self.snapshot
    }

    pub fn validate(&mut self, feed: &FeedMessage, now: DateTime<Utc>) -> Vec<Violation> {
        let violations =
            self.validator
                .validate_feed(&self.snapshot, feed, self.previous_header.as_ref(), now);
        if header_present(&feed.header) {
            self.previous_header = Some(feed.header.clone());
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{Alert, VehiclePosition};
    use crate::schedule::{Frequency, Route, Stop, Trip};
    use chrono::TimeZone;

    const NOW: i64 = 1_700_000_000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).unwrap()
    }

    fn schedule() -> Vec<ScheduleRecord> {
        let mut records = vec![
            ScheduleRecord::Route(Route {
                route_id: "L1".into(),
                agency_id: "CT".into(),
            }),
            ScheduleRecord::Stop(Stop {
                stop_id: "A".into(),
                location_type: 0,
            }),
            ScheduleRecord::Stop(Stop {
                stop_id: "B".into(),
                location_type: 0,
            }),
            ScheduleRecord::Stop(Stop {
                stop_id: "STATION".into(),
                location_type: 1,
            }),
            ScheduleRecord::Frequency(Frequency {
                trip_id: "F1".into(),
                start_time: 21600,
                end_time: 25200,
                headway_secs: 600,
            }),
        ];
        for trip_id in ["125", "F1"] {
            records.push(ScheduleRecord::Trip(Trip {
                trip_id: trip_id.into(),
                route_id: "L1".into(),
                service_id: "wk".into(),
                direction_id: Some(0),
                stop_times: vec![],
            }));
        }
        records
    }

    fn snapshot() -> ScheduleSnapshot {
        let mut s = ScheduleSnapshot::new();
        s.consume_all(&schedule());
        s
    }

    fn header(timestamp: u64) -> FeedHeader {
        FeedHeader {
            gtfs_realtime_version: "2.0".into(),
            incrementality: Some(Incrementality::FullDataset as i32),
            timestamp: Some(timestamp),
            feed_version: None,
        }
    }

    fn event(time: i64) -> Option<StopTimeEvent> {
        Some(StopTimeEvent {
            time: Some(time),
            ..Default::default()
        })
    }

    fn update(sequence: Option<u32>, stop_id: Option<&str>, time: i64) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_sequence: sequence,
            stop_id: stop_id.map(str::to_string),
            arrival: event(time),
            ..Default::default()
        }
    }

    fn trip(trip_id: &str) -> TripDescriptor {
        TripDescriptor {
            trip_id: Some(trip_id.into()),
            ..Default::default()
        }
    }

    fn trip_update(trip: TripDescriptor, updates: Vec<StopTimeUpdate>) -> TripUpdate {
        TripUpdate {
            trip,
            stop_time_update: updates,
            ..Default::default()
        }
    }

    fn entity(id: &str, tu: TripUpdate) -> FeedEntity {
        FeedEntity {
            id: id.into(),
            trip_update: Some(tu),
            ..Default::default()
        }
    }

    fn codes(violations: &[Violation]) -> Vec<&'static str> {
        violations.iter().map(Violation::code).collect()
    }

    fn validate_tu(tu: TripUpdate) -> Vec<&'static str> {
        codes(&Validator::default().validate_trip_update(&snapshot(), &tu))
    }

    #[test]
    fn test_wall_clock_and_date_parsing() {
        assert_eq!(parse_wall_clock("08:30:15"), Some(30615));
        assert_eq!(parse_wall_clock("25:00:00"), Some(90000));
        assert_eq!(parse_wall_clock("8:30:15"), None);
        assert_eq!(parse_wall_clock("08:61:00"), None);
        assert_eq!(parse_wall_clock("08:30"), None);
        assert_eq!(parse_service_date("20240131"), NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(parse_service_date("20240231"), None);
        assert_eq!(parse_service_date("2024-01-31"), None);
    }

    #[test]
    fn test_valid_header() {
        let v = Validator::default().validate_header(&header(NOW as u64), None, now());
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn test_missing_header_short_circuits() {
        let v = Validator::default().validate_header(&FeedHeader::default(), None, now());
        assert_eq!(codes(&v), vec!["E100"]);
    }

    #[test]
    fn test_timestamp_decreased_once() {
        let first = header(NOW as u64);
        let second = header(NOW as u64 - 30);
        let v = Validator::default().validate_header(&second, Some(&first), now());
        assert_eq!(codes(&v).iter().filter(|c| **c == "E018").count(), 1);

        let same = Validator::default().validate_header(&first, Some(&first), now());
        assert!(same.is_empty());
    }

    #[test]
    fn test_header_field_rules() {
        let validator = Validator::default();

        let mut h = header(NOW as u64);
        h.gtfs_realtime_version = "2.1".into();
        assert_eq!(codes(&validator.validate_header(&h, None, now())), vec!["E038"]);

        let mut h = header(0);
        h.timestamp = None;
        assert_eq!(codes(&validator.validate_header(&h, None, now())), vec!["E048"]);
        assert_eq!(codes(&validator.validate_header(&header(0), None, now())), vec!["E048"]);
        assert_eq!(codes(&validator.validate_header(&header(1_000), None, now())), vec!["E001"]);
        assert_eq!(
            codes(&validator.validate_header(&header(1u64 << 31), None, now())),
            vec!["E001"]
        );
        assert!(validator.validate_header(&header(NOW as u64 + 60), None, now()).is_empty());
        assert_eq!(
            codes(&validator.validate_header(&header(NOW as u64 + 61), None, now())),
            vec!["E050"]
        );

        let mut h = header(NOW as u64);
        h.incrementality = None;
        assert_eq!(codes(&validator.validate_header(&h, None, now())), vec!["E049"]);
        h.incrementality = Some(Incrementality::Differential as i32);
        assert_eq!(codes(&validator.validate_header(&h, None, now())), vec!["E101"]);
    }

    #[test]
    fn test_entity_rules() {
        let validator = Validator::default();
        let snapshot = snapshot();

        let bare = FeedEntity::default();
        let v = validator.validate_entity(&snapshot, &bare, Incrementality::FullDataset);
        assert_eq!(codes(&v), vec!["E102", "E103"]);
        assert!(v[0].entity.is_some());

        let deleted = FeedEntity {
            id: "x".into(),
            is_deleted: Some(true),
            alert: Some(Alert::default()),
            ..Default::default()
        };
        let v = validator.validate_entity(&snapshot, &deleted, Incrementality::FullDataset);
        assert_eq!(codes(&v), vec!["E039"]);
        let v = validator.validate_entity(&snapshot, &deleted, Incrementality::Differential);
        assert!(v.is_empty());
    }

    #[test]
    fn test_vehicle_trip_descriptor_is_checked() {
        let vehicle = FeedEntity {
            id: "v".into(),
            vehicle: Some(VehiclePosition {
                trip: Some(trip("999")),
                ..Default::default()
            }),
            ..Default::default()
        };
        let v = Validator::default().validate_entity(&snapshot(), &vehicle, Incrementality::FullDataset);
        assert_eq!(codes(&v), vec!["E003"]);
    }

    #[test]
    fn test_trip_descriptor_rules() {
        let updates = || vec![update(Some(1), Some("A"), NOW)];

        assert!(validate_tu(trip_update(trip("125"), updates())).is_empty());
        assert_eq!(validate_tu(trip_update(trip("999"), updates())), vec!["E003"]);

        let mut t = trip("125");
        t.direction_id = Some(1);
        t.route_id = Some("L9".into());
        assert_eq!(
            validate_tu(trip_update(t, updates())),
            vec!["E024", "E035", "E004"]
        );

        let mut t = trip("125");
        t.start_time = Some("8:00".into());
        t.start_date = Some("2024-01-01".into());
        assert_eq!(validate_tu(trip_update(t, updates())), vec!["E020", "E021"]);
    }

    #[test]
    fn test_trip_without_id() {
        let t = TripDescriptor {
            route_id: Some("L1".into()),
            ..Default::default()
        };
        assert_eq!(validate_tu(trip_update(t, vec![update(Some(1), Some("A"), NOW)])), vec!["E104"]);

        let t = TripDescriptor {
            route_id: Some("L1".into()),
            direction_id: Some(0),
            start_date: Some("20240101".into()),
            start_time: Some("08:00:00".into()),
            schedule_relationship: Some(TripRelationship::Added as i32),
            ..Default::default()
        };
        assert_eq!(validate_tu(trip_update(t, vec![update(Some(1), Some("A"), NOW)])), vec!["E105"]);
    }

    #[test]
    fn test_frequency_trip_requires_start() {
        let updates = vec![update(Some(1), Some("A"), NOW)];
        assert_eq!(validate_tu(trip_update(trip("F1"), updates.clone())), vec!["E106"]);

        let mut t = trip("F1");
        t.start_time = Some("06:10:00".into());
        t.start_date = Some("20240101".into());
        assert!(validate_tu(trip_update(t, updates)).is_empty());
    }

    #[test]
    fn test_stop_time_updates_required_unless_canceled() {
        assert_eq!(validate_tu(trip_update(trip("125"), vec![])), vec!["E041"]);

        let mut t = trip("125");
        t.schedule_relationship = Some(TripRelationship::Canceled as i32);
        assert!(validate_tu(trip_update(t, vec![])).is_empty());
    }

    #[test]
    fn test_sequence_ordering() {
        let unsorted = vec![update(Some(2), None, NOW), update(Some(1), None, NOW + 60)];
        assert_eq!(validate_tu(trip_update(trip("125"), unsorted)), vec!["E002"]);

        let repeated = vec![update(Some(1), None, NOW), update(Some(1), None, NOW + 60)];
        assert_eq!(validate_tu(trip_update(trip("125"), repeated)), vec!["E036"]);
    }

    #[test]
    fn test_same_stop_twice_in_a_row() {
        let updates = vec![update(None, Some("A"), NOW), update(None, Some("A"), NOW + 60)];
        let got = validate_tu(trip_update(trip("125"), updates));
        assert_eq!(got, vec!["E009", "E037"]);

        // With sequences only the consecutive repeat is flagged
        let updates = vec![update(Some(1), Some("A"), NOW), update(Some(2), Some("A"), NOW + 60)];
        assert_eq!(validate_tu(trip_update(trip("125"), updates)), vec!["E037"]);
    }

    #[test]
    fn test_times_must_increase_across_updates() {
        let mut first = update(Some(1), Some("A"), NOW);
        first.departure = event(NOW + 120);
        let second = update(Some(2), Some("B"), NOW + 60);
        assert_eq!(validate_tu(trip_update(trip("125"), vec![first, second])), vec!["E022"]);
    }

    #[test]
    fn test_per_update_rules() {
        let mut reversed = update(Some(1), Some("A"), NOW + 60);
        reversed.departure = event(NOW);
        assert_eq!(validate_tu(trip_update(trip("125"), vec![reversed])), vec!["E022", "E025"]);

        let nowhere = StopTimeUpdate {
            arrival: event(NOW),
            ..Default::default()
        };
        assert_eq!(validate_tu(trip_update(trip("125"), vec![nowhere])), vec!["E040"]);

        let unknown = update(Some(1), Some("Z"), NOW);
        assert_eq!(validate_tu(trip_update(trip("125"), vec![unknown])), vec!["E011"]);

        let station = update(Some(1), Some("STATION"), NOW);
        assert_eq!(validate_tu(trip_update(trip("125"), vec![station])), vec!["E015"]);

        let empty = StopTimeUpdate {
            stop_sequence: Some(1),
            ..Default::default()
        };
        assert_eq!(validate_tu(trip_update(trip("125"), vec![empty.clone()])), vec!["E043"]);

        let mut skipped = empty.clone();
        skipped.schedule_relationship = Some(StopRelationship::Skipped as i32);
        assert!(validate_tu(trip_update(trip("125"), vec![skipped])).is_empty());

        let mut no_data = update(Some(1), None, NOW);
        no_data.schedule_relationship = Some(StopRelationship::NoData as i32);
        assert_eq!(validate_tu(trip_update(trip("125"), vec![no_data])), vec!["E042"]);

        let mut bare_event = empty;
        bare_event.arrival = Some(StopTimeEvent::default());
        assert_eq!(validate_tu(trip_update(trip("125"), vec![bare_event])), vec!["E044"]);
    }

    #[test]
    fn test_streaming_matches_stateless() {
        let feed = FeedMessage {
            header: header(NOW as u64),
            entity: vec![
                entity("e1", trip_update(trip("999"), vec![update(Some(2), None, NOW), update(Some(1), None, NOW)])),
                entity("e2", trip_update(trip("125"), vec![update(Some(1), Some("A"), NOW)])),
            ],
        };

        let mut streaming = StreamingValidator::default();
        streaming.consume_all(&schedule());
        let streamed = streaming.validate(&feed, now());

        let stateless = Validator::default().validate_feed(&snapshot(), &feed, None, now());
        assert_eq!(streamed, stateless);
        assert_eq!(codes(&streamed), vec!["E003", "E002"]);
    }

    #[test]
    fn test_streaming_tracks_previous_header() {
        let mut streaming = StreamingValidator::default();
        let first = FeedMessage {
            header: header(NOW as u64),
            entity: vec![],
        };
        let second = FeedMessage {
            header: header(NOW as u64 - 10),
            entity: vec![],
        };
        assert!(streaming.validate(&first, now()).is_empty());
        assert_eq!(codes(&streaming.validate(&second, now())), vec!["E018"]);
    }
}
