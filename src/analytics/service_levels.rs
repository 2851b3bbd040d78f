use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, trace};

use crate::schedule::{ScheduleConsumer, ScheduleRecord, ServiceCalendar, ServicePeriod};

/// Julian day number of 0000-12-31 (chrono's day zero).
const JULIAN_DAY_OFFSET: i64 = 1_721_425;

/// Scheduled seconds of service per weekday, Monday first.
pub type WeekSignature = [i64; 7];

/// A maximal run of consecutive weeks sharing one [`WeekSignature`].
///
/// `start_date` is a Monday and `end_date` the Sunday closing the last week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceLevel {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monday: i64,
    pub tuesday: i64,
    pub wednesday: i64,
    pub thursday: i64,
    pub friday: i64,
    pub saturday: i64,
    pub sunday: i64,
}

impl ServiceLevel {
    fn new(start_week: i64, end_week: i64, signature: &WeekSignature) -> Option<Self> {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = *signature;
        Some(Self {
            start_date: from_julian_day(start_week)?,
            end_date: from_julian_day(end_week + 6)?,
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        })
    }

    pub fn signature(&self) -> WeekSignature {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }

    /// Total scheduled seconds over the whole week.
    pub fn total(&self) -> i64 {
        self.signature().iter().sum()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

pub(crate) fn julian_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + JULIAN_DAY_OFFSET
}

fn from_julian_day(jd: i64) -> Option<NaiveDate> {
    i32::try_from(jd - JULIAN_DAY_OFFSET)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Julian day of the Monday starting `date`'s ISO week.
pub(crate) fn julian_week(date: NaiveDate) -> i64 {
    julian_day(date) - i64::from(date.weekday().num_days_from_monday())
}

/// Sums scheduled service seconds per weekday and folds weeks with the same
/// pattern into date ranges.
///
/// Frequencies or trips referencing an undeclared service are dropped without
/// error.
#[derive(Debug, Default)]
pub struct ServiceLevelAggregator {
    services: HashMap<String, ServiceCalendar>,
    frequency_repeats: HashMap<String, i64>,
    trip_durations: Vec<TripDuration>,
}

#[derive(Debug)]
struct TripDuration {
    service_id: String,
    trip_id: String,
    seconds: i64,
}

impl ScheduleConsumer for ServiceLevelAggregator {
    fn consume(&mut self, record: &ScheduleRecord) {
        match record {
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
                let repeats = freq.repeat_count();
                if repeats == 0 {
                    trace!(trip_id = %freq.trip_id, "Frequency without whole headways skipped");
                }
                *self.frequency_repeats.entry(freq.trip_id.clone()).or_default() += repeats;
            }
            ScheduleRecord::Trip(trip) => {
                if trip.stop_times.len() < 2 {
                    return;
                }
                let (Some(start), Some(end)) = (trip.first_departure(), trip.last_arrival()) else {
                    trace!(trip_id = %trip.trip_id, "Trip without endpoint times skipped");
                    return;
                };
                if end < start {
                    trace!(trip_id = %trip.trip_id, start, end, "Trip ending before it starts skipped");
                    return;
                }
                self.trip_durations.push(TripDuration {
                    service_id: trip.service_id.clone(),
                    trip_id: trip.trip_id.clone(),
                    seconds: i64::from(end - start),
                });
            }
            ScheduleRecord::Agency(_)
            | ScheduleRecord::FeedInfo(_)
            | ScheduleRecord::Route(_)
            | ScheduleRecord::Stop(_) => {}
        }
    }
}

impl ServiceLevelAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduled seconds contributed by each service on one of its active days.
    fn service_totals(&self) -> HashMap<&str, i64> {
        let mut totals: HashMap<&str, i64> = HashMap::new();
        for td in &self.trip_durations {
            if !self.services.contains_key(&td.service_id) {
                trace!(service_id = %td.service_id, trip_id = %td.trip_id, "Unknown service skipped");
                continue;
            }
            let repeats = self.frequency_repeats.get(&td.trip_id).copied().unwrap_or(1);
            *totals.entry(td.service_id.as_str()).or_default() += td.seconds * repeats;
        }
        totals
    }

    /// Per-week signatures keyed by the Julian day of the week's Monday.
    fn week_signatures(&self) -> HashMap<i64, WeekSignature> {
        let totals = self.service_totals();
        let mut weeks: HashMap<i64, WeekSignature> = HashMap::new();

        for (service_id, service) in &self.services {
            let Some((first, last)) = service.service_period() else {
                trace!(%service_id, "Service never active");
                continue;
            };
            let total = totals.get(service_id.as_str()).copied().unwrap_or(0);
            for day in first.iter_days().take_while(|d| *d <= last) {
                if !service.is_active(day) {
                    continue;
                }
                let slot = day.weekday().num_days_from_monday() as usize;
                weeks.entry(julian_week(day)).or_default()[slot] += total;
            }
        }
        weeks
    }

    /// Finalizes the aggregation into maximal date ranges per week signature,
    /// sorted by start date.
    pub fn service_levels(&self) -> Vec<ServiceLevel> {
        let mut groups: HashMap<WeekSignature, Vec<i64>> = HashMap::new();
        for (week, signature) in self.week_signatures() {
            groups.entry(signature).or_default().push(week);
        }

        let mut levels = Vec::new();
        for (signature, mut weeks) in groups {
            weeks.sort_unstable();
            let mut run_start = weeks[0];
            let mut run_end = weeks[0];
            for &week in &weeks[1..] {
                if week == run_end + 7 {
                    run_end = week;
                    continue;
                }
                levels.extend(ServiceLevel::new(run_start, run_end, &signature));
                run_start = week;
                run_end = week;
            }
            levels.extend(ServiceLevel::new(run_start, run_end, &signature));
        }

        levels.sort_by_key(|l| l.start_date);
        debug!(
            services = self.services.len(),
            trips = self.trip_durations.len(),
            ranges = levels.len(),
            "Service levels computed"
        );
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Calendar, CalendarDate, ExceptionType, Frequency, StopTime, Trip};
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar(service_id: &str, days: [bool; 7], start: NaiveDate, end: NaiveDate) -> ScheduleRecord {
        ScheduleRecord::Calendar(Calendar {
            service_id: service_id.into(),
            days,
            start_date: start,
            end_date: end,
        })
    }

    fn trip(trip_id: &str, service_id: &str, start: i32, end: i32) -> ScheduleRecord {
        ScheduleRecord::Trip(Trip {
            trip_id: trip_id.into(),
            route_id: "r".into(),
            service_id: service_id.into(),
            direction_id: None,
            stop_times: vec![
                StopTime {
                    stop_id: "A".into(),
                    stop_sequence: 1,
                    arrival_time: Some(start),
                    departure_time: Some(start),
                },
                StopTime {
                    stop_id: "B".into(),
                    stop_sequence: 2,
                    arrival_time: Some(end),
                    departure_time: Some(end),
                },
            ],
        })
    }

    const WEEKDAYS: [bool; 7] = [true, true, true, true, true, false, false];
    const WEEKENDS: [bool; 7] = [false, false, false, false, false, true, true];

    fn sample_records() -> Vec<ScheduleRecord> {
        // Four weeks starting Monday 2024-01-01, with one removed weekday in week three
        vec![
            calendar("wk", WEEKDAYS, date(2024, 1, 1), date(2024, 1, 28)),
            calendar("we", WEEKENDS, date(2024, 1, 1), date(2024, 1, 28)),
            ScheduleRecord::CalendarDate(CalendarDate {
                service_id: "wk".into(),
                date: date(2024, 1, 17),
                exception_type: ExceptionType::Removed,
            }),
            trip("t1", "wk", 3600, 7200),
            trip("t2", "we", 3600, 5400),
            trip("t3", "wk", 0, 600),
        ]
    }

    fn aggregate(records: &[ScheduleRecord]) -> Vec<ServiceLevel> {
        let mut agg = ServiceLevelAggregator::new();
        agg.consume_all(records);
        agg.service_levels()
    }

    #[test]
    fn test_julian_week_is_monday() {
        // 2024-01-01 is a Monday with JDN 2460311
        assert_eq!(julian_day(date(2024, 1, 1)), 2_460_311);
        assert_eq!(julian_week(date(2024, 1, 7)), 2_460_311);
        assert_eq!(julian_week(date(2024, 1, 8)), 2_460_318);
        assert_eq!(from_julian_day(2_460_311), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_contiguous_weeks_merge() {
        let levels = aggregate(&sample_records());

        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].start_date, date(2024, 1, 1));
        assert_eq!(levels[0].end_date, date(2024, 1, 14));
        assert_eq!(levels[0].signature(), [4200, 4200, 4200, 4200, 4200, 1800, 1800]);

        assert_eq!(levels[1].start_date, date(2024, 1, 15));
        assert_eq!(levels[1].end_date, date(2024, 1, 21));
        assert_eq!(levels[1].wednesday, 0);

        // Week four repeats weeks one and two but is not adjacent to them
        assert_eq!(levels[2].start_date, date(2024, 1, 22));
        assert_eq!(levels[2].signature(), levels[0].signature());
    }

    #[test]
    fn test_frequency_multiplies_duration() {
        let mut records = vec![
            calendar("wk", WEEKDAYS, date(2024, 1, 1), date(2024, 1, 7)),
            trip("f1", "wk", 21600, 23400),
        ];
        records.push(ScheduleRecord::Frequency(Frequency {
            trip_id: "f1".into(),
            start_time: 21600,
            end_time: 25200,
            headway_secs: 1800,
        }));

        let levels = aggregate(&records);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].monday, 3600);
        assert_eq!(levels[0].sunday, 0);
    }

    #[test]
    fn test_unknown_service_and_short_trips_are_skipped() {
        let mut single_stop = Trip {
            trip_id: "single".into(),
            service_id: "wk".into(),
            ..Default::default()
        };
        single_stop.stop_times.push(StopTime {
            stop_id: "A".into(),
            stop_sequence: 1,
            arrival_time: Some(0),
            departure_time: Some(0),
        });
        let records = vec![
            calendar("wk", WEEKDAYS, date(2024, 1, 1), date(2024, 1, 7)),
            trip("ghost", "missing", 0, 3600),
            ScheduleRecord::Trip(single_stop),
        ];

        let levels = aggregate(&records);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].total(), 0);
    }

    #[test]
    fn test_trip_ending_before_start_is_skipped() {
        let monday = [true, false, false, false, false, false, false];
        let records = vec![
            calendar("mon", monday, date(2024, 1, 1), date(2024, 1, 7)),
            trip("backwards", "mon", 7200, 3600),
            trip("t", "mon", 0, 600),
        ];

        let levels = aggregate(&records);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].signature(), [600, 0, 0, 0, 0, 0, 0]);
        assert!(levels[0].signature().iter().all(|&s| s >= 0));
    }

    #[test]
    fn test_exception_only_service_is_counted() {
        let records = vec![
            ScheduleRecord::CalendarDate(CalendarDate {
                service_id: "xmas".into(),
                date: date(2024, 12, 25),
                exception_type: ExceptionType::Added,
            }),
            trip("t", "xmas", 0, 1000),
        ];
        let levels = aggregate(&records);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].start_date, date(2024, 12, 23));
        assert_eq!(levels[0].wednesday, 1000);
        assert_eq!(levels[0].total(), 1000);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let as_set = |levels: Vec<ServiceLevel>| -> HashSet<_> {
            levels
                .into_iter()
                .map(|l| (l.start_date, l.end_date, l.signature()))
                .collect()
        };
        let mut reversed = sample_records();
        reversed.reverse();

        assert_eq!(as_set(aggregate(&sample_records())), as_set(aggregate(&sample_records())));
        assert_eq!(as_set(aggregate(&sample_records())), as_set(aggregate(&reversed)));
    }

    #[test]
    fn test_ranges_cover_every_active_day() {
        let records = sample_records();
        let levels = aggregate(&records);

        let mut services: HashMap<String, ServiceCalendar> = HashMap::new();
        for record in &records {
            match record {
                ScheduleRecord::Calendar(c) => {
                    services.insert(c.service_id.clone(), ServiceCalendar::from_calendar(c));
                }
                ScheduleRecord::CalendarDate(cd) => {
                    services.get_mut(&cd.service_id).unwrap().add_exception(cd);
                }
                _ => {}
            }
        }

        for service in services.values() {
            let (first, last) = service.service_period().unwrap();
            for day in first.iter_days().take_while(|d| *d <= last) {
                if service.is_active(day) {
                    assert_eq!(levels.iter().filter(|l| l.contains(day)).count(), 1);
                }
            }
        }
    }
}
