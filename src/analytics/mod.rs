//! Schedule analytics: how much service a feed provides, week by week.
//!
//! [`ServiceLevelAggregator`] folds the schedule into date ranges sharing one
//! weekly pattern, [`fallback_week`] picks the most representative of them and
//! [`ServiceWindowBuilder`] collects the feed's timezone and validity dates.

pub mod fallback;
pub mod service_levels;
pub mod window;

pub use fallback::fallback_week;
pub use service_levels::{ServiceLevel, ServiceLevelAggregator, WeekSignature};
pub use window::{ServiceWindow, ServiceWindowBuilder};
