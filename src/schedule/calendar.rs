//! Service period primitive: which dates a service id runs on.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use super::records::{Calendar, CalendarDate, ExceptionType};

/// The two questions every schedule component asks about a service id.
pub trait ServicePeriod {
    /// Returns `true` if the service runs on `date`.
    fn is_active(&self, date: NaiveDate) -> bool;

    /// First and last dates on which the service actually runs, or `None` if
    /// it never does.
    fn service_period(&self) -> Option<(NaiveDate, NaiveDate)>;
}

/// A calendar pattern plus its added/removed exception dates.
///
/// A service that only appears in calendar_dates.txt starts out as
/// [`ServiceCalendar::empty`]: no weekdays and no date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceCalendar {
    pub service_id: String,
    days: [bool; 7],
    range: Option<(NaiveDate, NaiveDate)>,
    added: BTreeSet<NaiveDate>,
    removed: BTreeSet<NaiveDate>,
}

impl ServiceCalendar {
    pub fn empty(service_id: &str) -> Self {
        Self {
            service_id: service_id.to_string(),
            ..Default::default()
        }
    }

    pub fn from_calendar(calendar: &Calendar) -> Self {
        let mut s = Self::empty(&calendar.service_id);
        s.set_calendar(calendar);
        s
    }

    /// Replaces the weekly pattern, keeping any exceptions already seen.
    pub fn set_calendar(&mut self, calendar: &Calendar) {
        self.days = calendar.days;
        self.range = Some((calendar.start_date, calendar.end_date));
    }

    pub fn add_exception(&mut self, exception: &CalendarDate) {
        match exception.exception_type {
            ExceptionType::Added => {
                self.removed.remove(&exception.date);
                self.added.insert(exception.date);
            }
            ExceptionType::Removed => {
                self.added.remove(&exception.date);
                self.removed.insert(exception.date);
            }
        }
    }

    fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first_added = self.added.first().copied();
        let last_added = self.added.last().copied();
        match (self.range, first_added, last_added) {
            (Some((start, end)), Some(fa), Some(la)) => Some((start.min(fa), end.max(la))),
            (Some(range), _, _) => Some(range),
            (None, Some(fa), Some(la)) => Some((fa, la)),
            _ => None,
        }
    }
}

impl ServicePeriod for ServiceCalendar {
    fn is_active(&self, date: NaiveDate) -> bool {
        if self.removed.contains(&date) {
            return false;
        }
        if self.added.contains(&date) {
            return true;
        }
        match self.range {
            Some((start, end)) if start <= date && date <= end => {
                self.days[date.weekday().num_days_from_monday() as usize]
            }
            _ => false,
        }
    }

    fn service_period(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (start, end) = self.bounds()?;
        if end < start {
            return None;
        }
        let first = start
            .iter_days()
            .take_while(|d| *d <= end)
            .find(|d| self.is_active(*d))?;
        let mut last = end;
        while !self.is_active(last) {
            last = last.pred_opt()?;
        }
        Some((first, last))
    }
}
