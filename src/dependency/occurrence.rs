//! Subgraph-by-timepoint activation matrix and co-occurrence candidates

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use ndarray::{Array2, ArrayView1, Axis};

use crate::cluster::Subgraph;
use crate::data::{OutlierEvent, Timestamp};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::graph::EdgeLabel;

/// Boolean matrix: rows are final subgraphs (list order), columns are
/// distinct timepoints (ascending)
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceMatrix {
    cells: Array2<u8>,
}

impl OccurrenceMatrix {
    pub fn zeros(subgraphs: usize, timepoints: usize) -> Self {
        Self {
            cells: Array2::zeros((subgraphs, timepoints)),
        }
    }

    pub fn mark(&mut self, row: usize, column: usize) {
        self.cells[[row, column]] = 1;
    }

    pub fn is_active(&self, row: usize, column: usize) -> bool {
        self.cells.get((row, column)).is_some_and(|&cell| cell != 0)
    }

    /// Activation sequence of one subgraph
    pub fn row(&self, row: usize) -> ArrayView1<'_, u8> {
        self.cells.row(row)
    }

    /// Number of timepoints at which each subgraph was active
    pub fn activation_counts(&self) -> Vec<usize> {
        self.cells
            .axis_iter(Axis(0))
            .map(|row| row.iter().filter(|&&c| c != 0).count())
            .collect()
    }

    pub fn subgraph_count(&self) -> usize {
        self.cells.nrows()
    }

    pub fn timepoint_count(&self) -> usize {
        self.cells.ncols()
    }
}

/// Result of replaying the outlier events against the final subgraphs
#[derive(Debug, Clone)]
pub struct CoOccurrence {
    pub matrix: OccurrenceMatrix,
    /// Row index pairs `(i, j)` with `i < j` that were active together at
    /// least once
    pub candidates: BTreeSet<(usize, usize)>,
    /// Events whose segment belongs to no final subgraph
    pub orphan_events: usize,
}

impl CoOccurrence {
    /// Replay time-ordered events, marking matrix cells and collecting every
    /// pair of subgraphs affected at the same timepoint.
    pub fn replay(
        subgraphs: &[Subgraph],
        events: &[OutlierEvent],
        number_of_timepoints: usize,
    ) -> DiscoveryResult<Self> {
        let index = index_segments(subgraphs);
        let mut matrix = OccurrenceMatrix::zeros(subgraphs.len(), number_of_timepoints);
        let mut candidates = BTreeSet::new();
        let mut affected: BTreeSet<usize> = BTreeSet::new();
        let mut orphan_events = 0;

        let mut current: Option<Timestamp> = None;
        let mut column = 0usize;

        for event in events {
            match current {
                Some(t) if event.timestamp == t => {}
                Some(t) if event.timestamp < t => {
                    return Err(DiscoveryError::UnsortedEvents {
                        previous: t,
                        current: event.timestamp,
                    });
                }
                Some(_) => {
                    flush(&mut candidates, &mut affected);
                    column += 1;
                    current = Some(event.timestamp);
                }
                None => current = Some(event.timestamp),
            }

            if column >= number_of_timepoints {
                return Err(DiscoveryError::TimepointOverflow {
                    expected: number_of_timepoints,
                });
            }

            let Some(rows) = index.get(&event.segment) else {
                orphan_events += 1;
                continue;
            };

            for &row in rows {
                matrix.mark(row, column);
                affected.insert(row);
            }
        }
        flush(&mut candidates, &mut affected);

        log::info!(
            "Replayed {} events over {} timepoints: {} candidate pairs, {} orphan events",
            events.len(),
            number_of_timepoints,
            candidates.len(),
            orphan_events
        );

        Ok(Self {
            matrix,
            candidates,
            orphan_events,
        })
    }
}

/// Segment label -> rows of the subgraphs containing it
fn index_segments(subgraphs: &[Subgraph]) -> HashMap<EdgeLabel, Vec<usize>> {
    let mut index: HashMap<EdgeLabel, Vec<usize>> = HashMap::new();
    for (row, subgraph) in subgraphs.iter().enumerate() {
        for &label in subgraph.edges() {
            index.entry(label).or_default().push(row);
        }
    }
    index
}

/// Move all pairs of the completed timepoint into the candidate set
fn flush(candidates: &mut BTreeSet<(usize, usize)>, affected: &mut BTreeSet<usize>) {
    candidates.extend(affected.iter().copied().tuple_combinations::<(usize, usize)>());
    affected.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subgraphs() -> Vec<Subgraph> {
        vec![
            Subgraph::new(5, [1, 2]),
            Subgraph::new(8, [3, 4]),
            Subgraph::new(9, [4, 6]),
        ]
    }

    fn events(pairs: &[(EdgeLabel, Timestamp)]) -> Vec<OutlierEvent> {
        pairs.iter().map(|&(s, t)| OutlierEvent::new(s, t)).collect()
    }

    #[test]
    fn marks_cells_and_pairs() {
        let events = events(&[(1, 10), (3, 10), (2, 20), (6, 30), (99, 40)]);
        let co = CoOccurrence::replay(&subgraphs(), &events, 4).unwrap();

        assert!(co.matrix.is_active(0, 0));
        assert!(co.matrix.is_active(1, 0));
        assert!(co.matrix.is_active(0, 1));
        assert!(co.matrix.is_active(2, 2));
        assert!(!co.matrix.is_active(2, 0));
        assert!(!co.matrix.is_active(0, 3));

        assert_eq!(co.candidates, BTreeSet::from([(0, 1)]));
        assert_eq!(co.orphan_events, 1);
        assert_eq!(co.matrix.activation_counts(), vec![2, 1, 1]);
    }

    #[test]
    fn shared_segment_activates_every_owner() {
        let events = events(&[(4, 10)]);
        let co = CoOccurrence::replay(&subgraphs(), &events, 1).unwrap();

        assert!(co.matrix.is_active(1, 0));
        assert!(co.matrix.is_active(2, 0));
        assert_eq!(co.candidates, BTreeSet::from([(1, 2)]));
    }

    #[test]
    fn pairs_are_collected_once() {
        let events = events(&[(1, 10), (3, 10), (3, 20), (2, 20), (1, 30), (6, 30), (4, 30)]);
        let co = CoOccurrence::replay(&subgraphs(), &events, 3).unwrap();

        assert_eq!(co.candidates, BTreeSet::from([(0, 1), (0, 2), (1, 2)]));
    }

    #[test]
    fn rows_match_timepoints() {
        let events = events(&[(1, 10), (3, 20), (2, 30)]);
        let co = CoOccurrence::replay(&subgraphs(), &events, 3).unwrap();

        assert_eq!(co.matrix.row(0).to_vec(), vec![1, 0, 1]);
        assert_eq!(co.matrix.row(1).to_vec(), vec![0, 1, 0]);
        assert!(co.candidates.is_empty());
    }

    #[test]
    fn unsorted_events_are_rejected() {
        let events = events(&[(1, 20), (3, 10)]);
        let err = CoOccurrence::replay(&subgraphs(), &events, 2).unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::UnsortedEvents {
                previous: 20,
                current: 10
            }
        ));
    }

    #[test]
    fn too_many_timepoints_are_rejected() {
        let events = events(&[(1, 10), (3, 20)]);
        let err = CoOccurrence::replay(&subgraphs(), &events, 1).unwrap_err();
        assert!(matches!(err, DiscoveryError::TimepointOverflow { expected: 1 }));
    }

    #[test]
    fn flush_pairs_every_affected_row_and_clears() {
        let mut candidates = BTreeSet::from([(0, 9)]);
        let mut affected = BTreeSet::from([4, 1, 7]);
        flush(&mut candidates, &mut affected);

        assert_eq!(candidates, BTreeSet::from([(0, 9), (1, 4), (1, 7), (4, 7)]));
        assert!(affected.is_empty());

        let mut single = BTreeSet::from([3]);
        flush(&mut candidates, &mut single);
        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn no_events_no_candidates() {
        let co = CoOccurrence::replay(&subgraphs(), &[], 0).unwrap();
        assert!(co.candidates.is_empty());
        assert_eq!(co.matrix.timepoint_count(), 0);
        assert_eq!(co.matrix.subgraph_count(), 3);
    }
}
