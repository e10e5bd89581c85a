//! Spatial merging: fixed-point coalescing of similar subgraphs across time

use std::collections::{BTreeMap, BTreeSet, HashSet};

use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::cluster::similarity::similarity;
use crate::cluster::{Subgraph, SubgraphId};
use crate::graph::EdgeLabel;
use crate::progress::stage_bar;

/// Segment label -> ids of the live subgraphs containing it
#[derive(Debug, Default)]
pub struct EdgeIndex {
    entries: DashMap<EdgeLabel, HashSet<SubgraphId>>,
}

impl EdgeIndex {
    pub fn build<'a, I>(subgraphs: I) -> Self
    where
        I: IntoIterator<Item = &'a Subgraph>,
    {
        let index = Self::default();
        for subgraph in subgraphs {
            for &label in subgraph.edges() {
                index.insert(label, subgraph.id());
            }
        }
        index
    }

    pub fn insert(&self, label: EdgeLabel, id: SubgraphId) {
        self.entries.entry(label).or_default().insert(id);
    }

    /// Ids of subgraphs containing `label`, ascending
    pub fn subgraphs_containing(&self, label: EdgeLabel) -> Vec<SubgraphId> {
        let mut ids: Vec<SubgraphId> = self
            .entries
            .get(&label)
            .map(|entry| entry.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Move `label` from subgraph `from` to subgraph `to`
    pub fn repoint(&self, label: EdgeLabel, from: SubgraphId, to: SubgraphId) {
        let mut entry = self.entries.entry(label).or_default();
        entry.remove(&from);
        entry.insert(to);
    }

    /// Number of indexed segments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect all other subgraphs that share at least one segment with `subgraph`
    fn neighbours(&self, subgraph: &Subgraph) -> HashSet<SubgraphId> {
        let mut neighbours = HashSet::new();
        for label in subgraph.edges() {
            if let Some(entry) = self.entries.get(label) {
                neighbours.extend(entry.iter().copied());
            }
        }
        neighbours.remove(&subgraph.id());
        neighbours
    }
}

/// Counters describing one merge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub iterations: usize,
    pub initial_count: usize,
    pub final_count: usize,
    pub merges: usize,
}

/// Result of [`SpatialMerger::merge`]
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Surviving subgraphs in ascending id order
    pub subgraphs: Vec<Subgraph>,
    pub stats: MergeStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredPair {
    left: SubgraphId,
    right: SubgraphId,
    score: f64,
}

/// Iteratively merges subgraphs whose similarity reaches a threshold until
/// no pair qualifies.
///
/// Each subgraph takes part in at most one merge per iteration; a pair
/// blocked that way is reconsidered in the next iteration. The greedy order
/// makes the final partition a heuristic, not a global optimum.
#[derive(Debug, Clone, Copy)]
pub struct SpatialMerger {
    threshold: f64,
    progress: bool,
}

impl SpatialMerger {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            progress: false,
        }
    }

    /// Draw progress bars for the candidate scan and similarity scoring
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Flatten the per-timepoint subgraphs and merge them to a fixed point
    pub fn merge<I>(&self, per_timepoint: I) -> MergeOutcome
    where
        I: IntoIterator<Item = Vec<Subgraph>>,
    {
        let mut state = MergeState::new(per_timepoint.into_iter().flatten());
        state.progress = self.progress;
        let mut stats = MergeStats {
            initial_count: state.arena.len(),
            ..MergeStats::default()
        };

        log::info!(
            "Merging {} subgraphs (similarity threshold {})",
            stats.initial_count,
            self.threshold
        );

        loop {
            stats.iterations += 1;

            let candidates = state.candidates();
            let scored = state.score(&candidates, self.threshold);
            let merged = state.apply(scored);

            log::info!(
                "Merge iteration {}: {} candidates, {} merges, {} subgraphs left",
                stats.iterations,
                candidates.len(),
                merged,
                state.arena.len()
            );

            stats.merges += merged;
            if merged == 0 {
                break;
            }
        }

        stats.final_count = state.arena.len();
        MergeOutcome {
            subgraphs: state.arena.into_values().collect(),
            stats,
        }
    }
}

/// Arena of live subgraphs plus the index over their segments
struct MergeState {
    arena: BTreeMap<SubgraphId, Subgraph>,
    index: EdgeIndex,
    retired: HashSet<SubgraphId>,
    progress: bool,
}

impl MergeState {
    fn new<I>(subgraphs: I) -> Self
    where
        I: IntoIterator<Item = Subgraph>,
    {
        let mut arena = BTreeMap::new();
        for subgraph in subgraphs {
            let id = subgraph.id();
            if arena.insert(id, subgraph).is_some() {
                log::warn!("Subgraph id {} supplied twice; keeping the last one", id);
            }
        }

        let index = EdgeIndex::build(arena.values());
        Self {
            arena,
            index,
            retired: HashSet::new(),
            progress: false,
        }
    }

    /// Unordered pairs of subgraphs sharing at least one segment, as
    /// `(lower id, higher id)`
    fn candidates(&self) -> BTreeSet<(SubgraphId, SubgraphId)> {
        let bar = stage_bar(self.progress, self.arena.len(), "candidate search");
        let partials: Vec<Vec<(SubgraphId, SubgraphId)>> = self
            .arena
            .par_iter()
            .map(|(&id, subgraph)| {
                let pairs: Vec<(SubgraphId, SubgraphId)> = self
                    .index
                    .neighbours(subgraph)
                    .into_iter()
                    .map(|other| (id.min(other), id.max(other)))
                    .collect();
                bar.inc(1);
                pairs
            })
            .collect();
        bar.finish_and_clear();

        partials.into_iter().flatten().collect()
    }

    /// Similarity of every candidate pair, keeping those at or above `threshold`
    fn score(
        &self,
        candidates: &BTreeSet<(SubgraphId, SubgraphId)>,
        threshold: f64,
    ) -> Vec<ScoredPair> {
        let bar = stage_bar(self.progress, candidates.len(), "similarity");
        let scored: Vec<ScoredPair> = candidates
            .par_iter()
            .filter_map(|&(left, right)| {
                bar.inc(1);
                let score = similarity(self.arena.get(&left)?, self.arena.get(&right)?);
                (score >= threshold).then_some(ScoredPair { left, right, score })
            })
            .collect();
        bar.finish_and_clear();
        scored
    }

    /// Apply merges greedily by descending score; every subgraph merges at
    /// most once. Returns the number of merges.
    fn apply(&mut self, mut scored: Vec<ScoredPair>) -> usize {
        scored.sort_unstable_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| (a.left, a.right).cmp(&(b.left, b.right)))
        });

        let mut visited: HashSet<SubgraphId> = HashSet::new();
        let mut merges = 0;

        for pair in scored {
            if visited.contains(&pair.left) || visited.contains(&pair.right) {
                continue;
            }
            debug_assert!(
                !self.retired.contains(&pair.left) && !self.retired.contains(&pair.right)
            );

            if self.absorb(pair.left, pair.right) {
                visited.insert(pair.left);
                visited.insert(pair.right);
                merges += 1;
            }
        }

        merges
    }

    /// `left` takes over the segments of `right`; `right` is retired
    fn absorb(&mut self, left: SubgraphId, right: SubgraphId) -> bool {
        if !self.arena.contains_key(&left) {
            return false;
        }
        let Some(donor) = self.arena.remove(&right) else {
            return false;
        };

        for &label in donor.edges() {
            self.index.repoint(label, right, left);
        }
        if let Some(survivor) = self.arena.get_mut(&left) {
            survivor.absorb(donor);
        }
        self.retired.insert(right);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(subgraph: &Subgraph) -> Vec<EdgeLabel> {
        subgraph.edges().iter().copied().collect()
    }

    #[test]
    fn overlapping_regions_merge_across_time() {
        let merger = SpatialMerger::new(0.3);
        let outcome = merger.merge(vec![
            vec![Subgraph::new(0, [10, 11])],
            vec![Subgraph::new(1, [11, 12])],
        ]);

        assert_eq!(outcome.subgraphs.len(), 1);
        assert_eq!(outcome.subgraphs[0].id(), 0);
        assert_eq!(edges(&outcome.subgraphs[0]), vec![10, 11, 12]);
        assert_eq!(outcome.stats.merges, 1);
        assert_eq!(outcome.stats.iterations, 2);
    }

    #[test]
    fn below_threshold_pairs_stay_apart() {
        let merger = SpatialMerger::new(0.5);
        let outcome = merger.merge(vec![vec![
            Subgraph::new(0, [10, 11]),
            Subgraph::new(1, [11, 12]),
        ]]);

        assert_eq!(outcome.subgraphs.len(), 2);
        assert_eq!(outcome.stats.merges, 0);
        assert_eq!(outcome.stats.iterations, 1);
    }

    #[test]
    fn subsumed_subgraph_always_merges() {
        let merger = SpatialMerger::new(0.99);
        let outcome = merger.merge(vec![vec![
            Subgraph::new(0, [1, 2, 3, 4, 5, 6]),
            Subgraph::new(1, [5, 6]),
        ]]);

        assert_eq!(outcome.subgraphs.len(), 1);
        assert_eq!(edges(&outcome.subgraphs[0]), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn each_subgraph_merges_once_per_iteration() {
        // 1 overlaps both 0 and 2, which are disjoint from each other
        let merger = SpatialMerger::new(0.25);
        let outcome = merger.merge(vec![vec![
            Subgraph::new(0, [1, 2]),
            Subgraph::new(1, [2, 3]),
            Subgraph::new(2, [3, 4]),
        ]]);

        // iteration 1 merges (0, 1), iteration 2 merges (0, 2), iteration 3 stops
        assert_eq!(outcome.stats.iterations, 3);
        assert_eq!(outcome.stats.merges, 2);
        assert_eq!(outcome.subgraphs.len(), 1);
        assert_eq!(edges(&outcome.subgraphs[0]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn highest_score_merges_first() {
        let merger = SpatialMerger::new(0.1);
        let mut state = MergeState::new(vec![
            Subgraph::new(0, [1, 2, 3, 4]),
            Subgraph::new(1, [4, 5, 6, 7, 8, 9]),
            Subgraph::new(2, [1, 2, 3, 10]),
        ]);

        let candidates = state.candidates();
        assert_eq!(candidates, BTreeSet::from([(0, 1), (0, 2)]));

        let scored = state.score(&candidates, merger.threshold());
        assert_eq!(state.apply(scored), 1);
        // (0, 2) scores 3/5, (0, 1) only 1/9
        assert!(state.arena.contains_key(&0));
        assert!(state.arena.contains_key(&1));
        assert!(!state.arena.contains_key(&2));
    }

    #[test]
    fn merge_repoints_edge_index() {
        let mut state = MergeState::new(vec![
            Subgraph::new(4, [1, 2]),
            Subgraph::new(7, [2, 3]),
        ]);

        assert!(state.absorb(4, 7));
        assert_eq!(state.index.subgraphs_containing(3), vec![4]);
        assert_eq!(state.index.subgraphs_containing(2), vec![4]);
        assert!(state.retired.contains(&7));
        // retired ids never come back
        assert!(!state.absorb(4, 7));
    }

    #[test]
    fn subgraph_count_never_grows() {
        let merger = SpatialMerger::new(0.2);
        let input: Vec<Vec<Subgraph>> = (0..20)
            .map(|i| {
                let label = i64::from(i);
                vec![Subgraph::new(i, [label, label + 1, i64::from(i % 5) + 100])]
            })
            .collect();

        let outcome = merger.merge(input);
        assert!(outcome.stats.final_count <= outcome.stats.initial_count);
        assert_eq!(
            outcome.stats.initial_count - outcome.stats.final_count,
            outcome.stats.merges
        );
        assert!(outcome.stats.iterations <= outcome.stats.merges + 1);
    }

    #[test]
    fn converged_output_has_no_mergeable_pairs() {
        let merger = SpatialMerger::new(0.2);
        let input: Vec<Vec<Subgraph>> = (0..12)
            .map(|i| {
                let first = i64::from(i) * 2;
                vec![Subgraph::new(i, [first, first + 1, first + 2])]
            })
            .collect();

        let outcome = merger.merge(input);
        assert!(outcome.stats.merges > 0);
        for (i, a) in outcome.subgraphs.iter().enumerate() {
            for b in &outcome.subgraphs[i + 1..] {
                assert!(similarity(a, b) < merger.threshold());
            }
        }
    }

    #[test]
    fn progress_bars_do_not_change_the_partition() {
        let input = || {
            vec![
                vec![Subgraph::new(0, [1, 2]), Subgraph::new(1, [2, 3])],
                vec![Subgraph::new(2, [3, 4]), Subgraph::new(3, [1, 2, 9])],
            ]
        };

        let quiet = SpatialMerger::new(0.25).merge(input());
        let drawn = SpatialMerger::new(0.25).with_progress(true).merge(input());

        assert_eq!(quiet.subgraphs, drawn.subgraphs);
        assert_eq!(quiet.stats, drawn.stats);
    }

    #[test]
    fn empty_input_converges_immediately() {
        let outcome = SpatialMerger::new(0.5).merge(Vec::<Vec<Subgraph>>::new());
        assert!(outcome.subgraphs.is_empty());
        assert_eq!(outcome.stats.iterations, 1);
    }
}
