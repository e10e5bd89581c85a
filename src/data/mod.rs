//! Outlier event model and input loading

pub mod parquet;
pub mod preprocessing;

use serde::{Deserialize, Serialize};

use crate::graph::EdgeLabel;

/// Event time, as stored in the input (typically epoch milliseconds)
pub type Timestamp = i64;

/// A segment flagged as anomalous at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutlierEvent {
    pub segment: EdgeLabel,
    pub timestamp: Timestamp,
}

impl OutlierEvent {
    pub fn new(segment: EdgeLabel, timestamp: Timestamp) -> Self {
        Self { segment, timestamp }
    }
}
