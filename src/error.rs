//! Error types shared by the discovery stages

use std::path::PathBuf;
use thiserror::Error;

use crate::data::Timestamp;
use crate::graph::EdgeLabel;

/// Errors raised by the library. Recoverable conditions (orphan outliers,
/// unreachable vertex pairs, failed distance lookups) never surface here;
/// they are absorbed by skipping the affected unit of work.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("edge label {0} is defined more than once")]
    DuplicateLabel(EdgeLabel),

    #[error("malformed hop-distance cache {path}:{line}: {reason}")]
    CacheParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("outlier events are not in ascending time order ({previous} followed by {current})")]
    UnsortedEvents {
        previous: Timestamp,
        current: Timestamp,
    },

    #[error("outlier events span more than the {expected} announced timepoints")]
    TimepointOverflow { expected: usize },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;
