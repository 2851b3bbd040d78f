use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::trace;

use super::fallback::fallback_week;
use super::service_levels::ServiceLevel;
use crate::schedule::{ScheduleConsumer, ScheduleRecord, ServiceCalendar, ServicePeriod};

/// Nominal timezone and validity dates of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceWindow {
    pub default_timezone: Option<Tz>,
    pub feed_start_date: Option<NaiveDate>,
    pub feed_end_date: Option<NaiveDate>,
    pub earliest_calendar_date: Option<NaiveDate>,
    pub latest_calendar_date: Option<NaiveDate>,
}

impl ServiceWindow {
    /// Window used to pick a fallback week: the feed-info dates when both are
    /// declared, otherwise the span of calendar dates.
    pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match (self.feed_start_date, self.feed_end_date) {
            (Some(start), Some(end)) => (Some(start), Some(end)),
            _ => (self.earliest_calendar_date, self.latest_calendar_date),
        }
    }

    pub fn fallback_week(&self, levels: &[ServiceLevel]) -> Option<NaiveDate> {
        let (start, end) = self.bounds();
        fallback_week(start, end, levels)
    }
}

/// Streams agency, feed-info and calendar records into a [`ServiceWindow`].
#[derive(Debug, Default)]
pub struct ServiceWindowBuilder {
    window: ServiceWindow,
}

impl ScheduleConsumer for ServiceWindowBuilder {
    fn consume(&mut self, record: &ScheduleRecord) {
        match record {
            ScheduleRecord::Agency(agency) => match agency.agency_timezone.parse::<Tz>() {
                Ok(tz) => self.window.default_timezone = Some(tz),
                Err(_) => {
                    trace!(timezone = %agency.agency_timezone, "Unrecognized agency timezone");
                }
            },
            ScheduleRecord::FeedInfo(info) => {
                self.window.feed_start_date = info.feed_start_date;
                self.window.feed_end_date = info.feed_end_date;
            }
            ScheduleRecord::Calendar(calendar) => {
                let Some((first, last)) = ServiceCalendar::from_calendar(calendar).service_period()
                else {
                    return;
                };
                let w = &mut self.window;
                if w.earliest_calendar_date.is_none_or(|d| first < d) {
                    w.earliest_calendar_date = Some(first);
                }
                if w.latest_calendar_date.is_none_or(|d| last > d) {
                    w.latest_calendar_date = Some(last);
                }
            }
            ScheduleRecord::CalendarDate(_)
            | ScheduleRecord::Frequency(_)
            | ScheduleRecord::Route(_)
            | ScheduleRecord::Stop(_)
            | ScheduleRecord::Trip(_) => {}
        }
    }
}

impl ServiceWindowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ServiceWindow {
        self.window.clone()
    }
}
