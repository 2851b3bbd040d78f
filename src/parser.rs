//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;

use crate::error::FeedError;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`FeedError::Decode`] if the bytes are not valid protobuf for a
/// `FeedMessage`. This happens before any rule is evaluated.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, FeedError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Reads and decodes a feed stored on disk.
pub fn read_feed(path: impl AsRef<std::path::Path>) -> Result<FeedMessage, FeedError> {
    let bytes = std::fs::read(path)?;
    parse_feed(&bytes)
}
