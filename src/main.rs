//! CLI entry point for the schedule analytics and realtime consistency engine.
//!
//! Schedules are read as newline-delimited JSON record streams; realtime feeds
//! as protobuf `FeedMessage` files.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use gtfs_rt_consistency::analytics::{
    ServiceLevelAggregator, ServiceWindowBuilder, fallback_week,
};
use gtfs_rt_consistency::config::Config;
use gtfs_rt_consistency::output::{append_records, print_json, print_pretty};
use gtfs_rt_consistency::parser::read_feed;
use gtfs_rt_consistency::schedule::{ScheduleConsumer, ScheduleRecord, read_records};
use gtfs_rt_consistency::scheduler::ActiveTripScheduler;
use gtfs_rt_consistency::stats::TripIndex;
use gtfs_rt_consistency::validator::StreamingValidator;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_consistency")]
#[command(about = "Schedule analytics and GTFS-RT consistency checks", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize weekly service levels and pick a fallback week
    ServiceLevels {
        /// Schedule records (newline-delimited JSON)
        #[arg(value_name = "RECORDS")]
        records: String,

        /// First day of the fallback window (YYYY-MM-DD)
        #[arg(long)]
        window_start: Option<NaiveDate>,

        /// Last day of the fallback window (YYYY-MM-DD)
        #[arg(long)]
        window_end: Option<NaiveDate>,

        /// CSV file to append date ranges to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List the trips scheduled to be running at an instant
    ActiveTrips {
        #[arg(value_name = "RECORDS")]
        records: String,

        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Validate realtime feeds against the schedule, in order
    Validate {
        #[arg(value_name = "RECORDS")]
        records: String,

        /// Protobuf feed files; headers are compared with the previous feed
        #[arg(value_name = "FEED", required = true)]
        feeds: Vec<String>,

        /// CSV file to append violations to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compare scheduled and realtime trips per route
    Compare {
        #[arg(value_name = "RECORDS")]
        records: String,

        #[arg(value_name = "FEED")]
        feed: String,

        /// Instant to evaluate (RFC 3339), defaults to the feed header timestamp
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// CSV file to append route statistics to
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Colored stderr plus a JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_rt_consistency.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_consistency.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    print_pretty(&config);

    match cli.command {
        Commands::ServiceLevels {
            records,
            window_start,
            window_end,
            output,
        } => {
            service_levels(&records, window_start, window_end, output.as_deref()).await?;
        }
        Commands::ActiveTrips { records, at } => {
            let records = load_records(&records)?;
            let scheduler = build_scheduler(&records, &config)?;
            let now = at.unwrap_or_else(Utc::now);

            let mut trips = scheduler.active_trips_at(now);
            trips.sort();
            trips.dedup();

            info!(at = %now, timezone = %scheduler.timezone(), count = trips.len(), "Active trips");
            print_json(&trips)?;
        }
        Commands::Validate {
            records,
            feeds,
            output,
        } => {
            let records = load_records(&records)?;
            let mut validator = StreamingValidator::new(config.validator.clone());
            validator.consume_all(records.iter());

            for path in &feeds {
                let feed = read_feed(path).with_context(|| format!("Failed to decode '{path}'"))?;
                let violations = validator.validate(&feed, Utc::now());

                for v in &violations {
                    warn!(code = v.code(), field = ?v.field, value = ?v.value, "{}", v.message);
                }
                info!(feed = %path, violations = violations.len(), "Feed validated");

                match output.as_deref() {
                    Some(out) => append_records(out, &violations)?,
                    None => print_json(&violations)?,
                }
            }
        }
        Commands::Compare {
            records,
            feed,
            at,
            output,
        } => {
            let records = load_records(&records)?;
            let scheduler = build_scheduler(&records, &config)?;
            let mut index = TripIndex::new();
            index.consume_all(records.iter());

            let feed = read_feed(&feed).with_context(|| format!("Failed to decode '{feed}'"))?;
            let now = at
                .or_else(|| {
                    let ts = i64::try_from(feed.header.timestamp?).ok()?;
                    Utc.timestamp_opt(ts, 0).single()
                })
                .unwrap_or_else(Utc::now);

            let scheduled = scheduler.active_trips_at(now);
            let realtime = index.trip_refs(&feed);
            let stats = index.compare(&scheduled, &realtime);

            for s in &stats {
                info!(
                    agency_id = %s.agency_id,
                    route_id = %s.route_id,
                    scheduled = s.trip_scheduled_count,
                    matched = s.trip_scheduled_matched,
                    matched_pct = format_args!("{:.1}", s.scheduled_matched_pct()),
                    realtime = s.trip_rt_count,
                    rt_not_matched = s.trip_rt_not_matched,
                    added = s.trip_rt_added,
                    not_found = s.trip_rt_not_found,
                    "Route"
                );
            }

            match output.as_deref() {
                Some(out) => append_records(out, &stats)?,
                None => print_json(&stats)?,
            }
        }
    }

    Ok(())
}

fn load_records(path: &str) -> Result<Vec<ScheduleRecord>> {
    read_records(path).with_context(|| format!("Failed to load schedule records from '{path}'"))
}

fn build_scheduler(records: &[ScheduleRecord], config: &Config) -> Result<ActiveTripScheduler> {
    let mut scheduler = ActiveTripScheduler::new(config.timezone()?);
    scheduler.consume_all(records);
    Ok(scheduler)
}

/// Runs the aggregator and the window builder side by side over one record
/// list; each owns its state, so they only share the records read-only.
#[tracing::instrument(skip(output))]
async fn service_levels(
    records_path: &str,
    window_start: Option<NaiveDate>,
    window_end: Option<NaiveDate>,
    output: Option<&str>,
) -> Result<()> {
    let records = Arc::new(load_records(records_path)?);

    let levels_task = {
        let records = Arc::clone(&records);
        tokio::task::spawn_blocking(move || {
            let mut aggregator = ServiceLevelAggregator::new();
            aggregator.consume_all(records.iter());
            aggregator.service_levels()
        })
    };
    let window_task = {
        let records = Arc::clone(&records);
        tokio::task::spawn_blocking(move || {
            let mut builder = ServiceWindowBuilder::new();
            builder.consume_all(records.iter());
            builder.snapshot()
        })
    };
    let (levels, window) = tokio::try_join!(levels_task, window_task)?;

    let fallback = if window_start.is_none() && window_end.is_none() {
        window.fallback_week(&levels)
    } else {
        fallback_week(window_start, window_end, &levels)
    };

    info!(
        ranges = levels.len(),
        timezone = ?window.default_timezone,
        fallback_week = ?fallback,
        "Service levels computed"
    );
    print_json(&window)?;

    match output {
        Some(out) => append_records(out, &levels)?,
        None => print_json(&levels)?,
    }
    Ok(())
}
