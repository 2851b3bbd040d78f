pub mod analytics;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod validator;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
