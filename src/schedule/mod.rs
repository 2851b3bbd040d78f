//! Static schedule record stream and the calendar primitive.
//!
//! Every streaming component implements [`ScheduleConsumer`] and picks out the
//! record kinds it needs; the rest are ignored.

pub mod calendar;
pub mod records;

pub use calendar::{ServiceCalendar, ServicePeriod};
pub use records::*;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::FeedError;

/// A component fed one schedule record at a time by a single producer.
pub trait ScheduleConsumer {
    fn consume(&mut self, record: &ScheduleRecord);

    fn consume_all<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a ScheduleRecord>,
        Self: Sized,
    {
        for record in records {
            self.consume(record);
        }
    }
}

/// Reads a newline-delimited JSON record stream, one [`ScheduleRecord`] per line.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not a valid record.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<ScheduleRecord>, FeedError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| FeedError::Record {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    debug!(path = %path.as_ref().display(), count = records.len(), "Schedule records loaded");
    Ok(records)
}
