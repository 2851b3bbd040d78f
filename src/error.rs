use thiserror::Error;

/// Hard failures: the input could not be turned into records or a message at all.
///
/// Rule violations found in a decoded message are not errors; see
/// [`crate::validator::Violation`].
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid schedule record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
