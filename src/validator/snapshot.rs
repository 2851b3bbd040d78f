use std::collections::{HashMap, HashSet};

use crate::schedule::{ScheduleConsumer, ScheduleRecord};

/// Schedule attributes of one trip, as far as realtime rules care.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripInfo {
    pub route_id: String,
    pub direction_id: Option<u32>,
    pub uses_frequencies: bool,
}

/// Identifier lookups the realtime rules check against.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSnapshot {
    stops: HashMap<String, i32>,
    routes: HashSet<String>,
    trips: HashMap<String, TripInfo>,
}

impl ScheduleConsumer for ScheduleSnapshot {
    fn consume(&mut self, record: &ScheduleRecord) {
        match record {
            ScheduleRecord::Stop(stop) => {
                self.stops.insert(stop.stop_id.clone(), stop.location_type);
            }
            ScheduleRecord::Route(route) => {
                self.routes.insert(route.route_id.clone());
            }
            ScheduleRecord::Trip(trip) => {
                let info = self.trips.entry(trip.trip_id.clone()).or_default();
                info.route_id = trip.route_id.clone();
                info.direction_id = trip.direction_id;
            }
            // Frequencies may stream in before their trip
            ScheduleRecord::Frequency(freq) => {
                self.trips.entry(freq.trip_id.clone()).or_default().uses_frequencies = true;
            }
            ScheduleRecord::Agency(_)
            | ScheduleRecord::FeedInfo(_)
            | ScheduleRecord::Calendar(_)
            | ScheduleRecord::CalendarDate(_) => {}
        }
    }
}

impl ScheduleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_location_type(&self, stop_id: &str) -> Option<i32> {
        self.stops.get(stop_id).copied()
    }

    pub fn has_route(&self, route_id: &str) -> bool {
        self.routes.contains(route_id)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TripInfo> {
        self.trips.get(trip_id)
    }
}
