//! Scheduled versus realtime trip reconciliation, per route.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::gtfs_rt::trip_descriptor::ScheduleRelationship;
use crate::gtfs_rt::{FeedMessage, TripDescriptor};
use crate::schedule::{ScheduleConsumer, ScheduleRecord};

/// Bucket key for trip counts. The default (empty) key collects trips that
/// could not be resolved to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TripMatchKey {
    pub agency_id: String,
    pub route_id: String,
}

/// A trip referenced by a realtime message, resolved against the schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TripRef {
    pub agency_id: String,
    pub route_id: String,
    pub trip_id: String,
    /// The trip id exists in the schedule.
    pub found: bool,
    /// The realtime message marks the trip as ADDED.
    pub added: bool,
}

impl TripRef {
    pub fn key(&self) -> TripMatchKey {
        TripMatchKey {
            agency_id: self.agency_id.clone(),
            route_id: self.route_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteStat {
    pub agency_id: String,
    pub route_id: String,
    pub trip_scheduled_count: usize,
    pub trip_scheduled_matched: usize,
    pub trip_scheduled_not_matched: usize,
    pub trip_rt_count: usize,
    pub trip_rt_matched: usize,
    pub trip_rt_not_matched: usize,
    pub trip_rt_added: usize,
    pub trip_rt_not_found: usize,
}

impl RouteStat {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of scheduled trips seen in realtime.
    pub fn scheduled_matched_pct(&self) -> f64 {
        Self::pct(self.trip_scheduled_matched, self.trip_scheduled_count)
    }
}

#[derive(Debug, Default)]
struct TripBuckets {
    scheduled: HashSet<String>,
    matched: HashSet<String>,
    added: HashSet<String>,
    not_found: HashSet<String>,
}

impl TripBuckets {
    fn stat(&self, key: TripMatchKey) -> RouteStat {
        let matched = self.scheduled.intersection(&self.matched).count();
        RouteStat {
            agency_id: key.agency_id,
            route_id: key.route_id,
            trip_scheduled_count: self.scheduled.len(),
            trip_scheduled_matched: matched,
            trip_scheduled_not_matched: self.scheduled.difference(&self.matched).count(),
            trip_rt_count: self.matched.len(),
            trip_rt_matched: matched,
            trip_rt_not_matched: self.matched.difference(&self.scheduled).count(),
            trip_rt_added: self.added.len(),
            trip_rt_not_found: self.not_found.len(),
        }
    }
}

/// Trip → route → agency lookups used to bucket trips by [`TripMatchKey`].
#[derive(Debug, Default)]
pub struct TripIndex {
    trip_routes: HashMap<String, String>,
    route_agencies: HashMap<String, String>,
    default_agency: Option<String>,
}

impl ScheduleConsumer for TripIndex {
    fn consume(&mut self, record: &ScheduleRecord) {
        match record {
            ScheduleRecord::Agency(agency) => {
                if self.default_agency.is_none() {
                    self.default_agency = Some(agency.agency_id.clone());
                }
            }
            ScheduleRecord::Route(route) => {
                self.route_agencies
                    .insert(route.route_id.clone(), route.agency_id.clone());
            }
            ScheduleRecord::Trip(trip) => {
                self.trip_routes
                    .insert(trip.trip_id.clone(), trip.route_id.clone());
            }
            ScheduleRecord::FeedInfo(_)
            | ScheduleRecord::Stop(_)
            | ScheduleRecord::Calendar(_)
            | ScheduleRecord::CalendarDate(_)
            | ScheduleRecord::Frequency(_) => {}
        }
    }
}

impl TripIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_key(&self, route_id: &str) -> Option<TripMatchKey> {
        let agency_id = self.route_agencies.get(route_id)?;
        let agency_id = match (agency_id.is_empty(), &self.default_agency) {
            (true, Some(default)) => default.clone(),
            _ => agency_id.clone(),
        };
        Some(TripMatchKey {
            agency_id,
            route_id: route_id.to_string(),
        })
    }

    fn trip_key(&self, trip_id: &str) -> TripMatchKey {
        self.trip_routes
            .get(trip_id)
            .and_then(|route_id| self.route_key(route_id))
            .unwrap_or_default()
    }

    /// Resolves one trip descriptor; descriptors without a trip id are ignored.
    pub fn resolve(&self, trip: &TripDescriptor) -> Option<TripRef> {
        let trip_id = trip.trip_id.as_deref().filter(|id| !id.is_empty())?;
        let scheduled_route = self.trip_routes.get(trip_id);
        let key = scheduled_route
            .map(String::as_str)
            .or(trip.route_id.as_deref())
            .and_then(|route_id| self.route_key(route_id))
            .unwrap_or_default();

        Some(TripRef {
            agency_id: key.agency_id,
            route_id: key.route_id,
            trip_id: trip_id.to_string(),
            found: scheduled_route.is_some(),
            added: trip.schedule_relationship() == ScheduleRelationship::Added,
        })
    }

    /// Every trip referenced by the trip updates and vehicle positions of `feed`.
    pub fn trip_refs(&self, feed: &FeedMessage) -> Vec<TripRef> {
        feed.entity
            .iter()
            .flat_map(|e| {
                let from_update = e.trip_update.as_ref().map(|tu| &tu.trip);
                let from_vehicle = e.vehicle.as_ref().and_then(|v| v.trip.as_ref());
                from_update.into_iter().chain(from_vehicle)
            })
            .filter_map(|trip| self.resolve(trip))
            .collect()
    }

    /// Reconciles the scheduled trip ids (duplicates allowed) with realtime
    /// references, one [`RouteStat`] per known route plus any other bucket
    /// observed, sorted by agency id then route id.
    pub fn compare(&self, scheduled: &[String], realtime: &[TripRef]) -> Vec<RouteStat> {
        let mut buckets: BTreeMap<TripMatchKey, TripBuckets> = self
            .route_agencies
            .keys()
            .filter_map(|route_id| self.route_key(route_id))
            .map(|key| (key, TripBuckets::default()))
            .collect();

        for trip_id in scheduled {
            buckets
                .entry(self.trip_key(trip_id))
                .or_default()
                .scheduled
                .insert(trip_id.clone());
        }

        for trip in realtime {
            let bucket = buckets.entry(trip.key()).or_default();
            if trip.found {
                bucket.matched.insert(trip.trip_id.clone());
            }
            if trip.added {
                bucket.added.insert(trip.trip_id.clone());
            }
            if !trip.found && !trip.added {
                bucket.not_found.insert(trip.trip_id.clone());
            }
        }

        let mut stats: Vec<RouteStat> = buckets
            .into_iter()
            .map(|(key, bucket)| bucket.stat(key))
            .collect();
        stats.sort_by_cached_key(|s| format!("{}{}", s.agency_id, s.route_id));

        debug!(
            routes = stats.len(),
            scheduled = scheduled.len(),
            realtime = realtime.len(),
            "Trip consistency computed"
        );
        stats
    }
}
