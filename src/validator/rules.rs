//! Catalog of realtime rules and the violations they produce.
//!
//! Codes follow the MobilityData GTFS-Realtime validator numbering where a
//! matching rule exists there; E1xx codes are local.

use serde::{Serialize, Serializer};
use thiserror::Error;

macro_rules! rules {
    ($($variant:ident => $code:literal, $message:literal;)+) => {
        /// A realtime conformance rule with a stable code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Rule {
            $($variant,)+
        }

        impl Rule {
            pub const ALL: &'static [Rule] = &[$(Rule::$variant,)+];

            pub fn code(self) -> &'static str {
                match self {
                    $(Rule::$variant => $code,)+
                }
            }

            pub fn message(self) -> &'static str {
                match self {
                    $(Rule::$variant => $message,)+
                }
            }
        }
    };
}

rules! {
    TimestampOutOfRange => "E001", "Timestamp is not in POSIX time";
    StopSequenceNotSorted => "E002", "stop_time_updates are not sorted by stop_sequence";
    TripNotFound => "E003", "trip_id does not appear in the schedule";
    RouteNotFound => "E004", "route_id does not appear in the schedule";
    StopRepeatedWithoutSequence => "E009", "stop_sequence is required for a trip visiting the same stop_id more than once";
    StopNotFound => "E011", "stop_id does not appear in the schedule";
    StopLocationType => "E015", "stop_id must reference a stop with location_type 0";
    TimestampDecreased => "E018", "Header timestamp decreased";
    InvalidStartTime => "E020", "Invalid start_time format";
    InvalidStartDate => "E021", "Invalid start_date format";
    TimesNotIncreasing => "E022", "Sequential stop_time_update times are not increasing";
    DirectionMismatch => "E024", "Trip direction_id does not match the schedule";
    DepartureBeforeArrival => "E025", "stop_time_update departure time is before arrival time";
    TripRouteMismatch => "E035", "trip_id does not belong to route_id in the schedule";
    RepeatedStopSequence => "E036", "Sequential stop_time_updates have the same stop_sequence";
    RepeatedStopId => "E037", "Sequential stop_time_updates have the same stop_id";
    InvalidVersion => "E038", "Invalid header gtfs_realtime_version";
    DeletedOutsideDifferential => "E039", "is_deleted is only allowed in DIFFERENTIAL feeds";
    StopTimeUpdateWithoutStop => "E040", "stop_time_update must have stop_id or stop_sequence";
    NoStopTimeUpdates => "E041", "Trip has no stop_time_updates";
    NoDataWithTimes => "E042", "NO_DATA stop_time_update must not have arrival or departure";
    ScheduledWithoutTimes => "E043", "SCHEDULED stop_time_update must have arrival or departure";
    EventWithoutDelayOrTime => "E044", "arrival or departure must have delay or time";
    TimestampMissing => "E048", "Header timestamp is not populated";
    IncrementalityMissing => "E049", "Header incrementality is not populated";
    TimestampInFuture => "E050", "Timestamp is in the future";
    HeaderRequired => "E100", "Feed header is required";
    DifferentialUnsupported => "E101", "DIFFERENTIAL incrementality is not supported";
    EntityIdRequired => "E102", "Entity id is required";
    EntityWithoutPayload => "E103", "Entity must have a trip_update, vehicle or alert";
    TripWithoutIdIncomplete => "E104", "Trip without trip_id must have route_id, direction_id, start_date and start_time";
    TripWithoutIdNotScheduled => "E105", "Trip without trip_id must be SCHEDULED";
    FrequencyTripWithoutStart => "E106", "Frequency-based trip must have start_date and start_time";
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// One failed rule, with optional context about where it failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}: {}", .rule.code(), .rule.message())]
pub struct Violation {
    #[serde(rename = "code")]
    pub rule: Rule,
    pub message: &'static str,
    pub field: Option<String>,
    pub value: Option<String>,
    /// JSON of the offending entity or message fragment.
    pub entity: Option<String>,
}

impl Violation {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: rule.message(),
            field: None,
            value: None,
            entity: None,
        }
    }

    pub fn code(&self) -> &'static str {
        self.rule.code()
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Attaches a JSON snapshot of `fragment`; unserializable fragments are left out.
    pub fn with_entity<T: Serialize>(mut self, fragment: &T) -> Self {
        self.entity = serde_json::to_string(fragment).ok();
        self
    }
}
