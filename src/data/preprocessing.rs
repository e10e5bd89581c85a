//! Outlier event preprocessing

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::data::{OutlierEvent, Timestamp};
use crate::graph::{EdgeLabel, StreetGraph};

/// Sort events ascending by timestamp (then segment) and drop exact duplicates
pub fn sort_events(events: &mut Vec<OutlierEvent>) {
    events.sort_unstable_by_key(|e| (e.timestamp, e.segment));
    events.dedup();
}

/// Group events into timepoints: timestamp -> anomalous segments
pub fn group_by_timepoint(events: &[OutlierEvent]) -> BTreeMap<Timestamp, BTreeSet<EdgeLabel>> {
    let mut timepoints: BTreeMap<Timestamp, BTreeSet<EdgeLabel>> = BTreeMap::new();
    for event in events {
        timepoints
            .entry(event.timestamp)
            .or_default()
            .insert(event.segment);
    }
    timepoints
}

/// Number of distinct timestamps
pub fn count_timepoints(events: &[OutlierEvent]) -> usize {
    events.iter().map(|e| e.timestamp).unique().count()
}

/// Events whose segment is not part of the street graph
pub fn count_orphans(events: &[OutlierEvent], graph: &StreetGraph) -> usize {
    events
        .iter()
        .filter(|e| !graph.contains_segment(e.segment))
        .count()
}

/// Whether events are in ascending time order
pub fn is_time_ordered(events: &[OutlierEvent]) -> bool {
    events
        .iter()
        .tuple_windows::<(&OutlierEvent, &OutlierEvent)>()
        .all(|(a, b)| a.timestamp <= b.timestamp)
}
