//! Pairwise dependency scoring of co-occurring subgraphs

use rayon::prelude::*;
use serde::Serialize;

use crate::cluster::Subgraph;
use crate::data::OutlierEvent;
use crate::dependency::information::mutual_information;
use crate::dependency::occurrence::{CoOccurrence, OccurrenceMatrix};
use crate::dependency::DependencyRecord;
use crate::error::DiscoveryResult;
use crate::geo::GeometryDistance;
use crate::graph::StreetGraph;
use crate::progress::stage_bar;

/// Counters describing one scoring run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoringStats {
    pub candidates: usize,
    pub records: usize,
    /// Pairs closer than the minimum distance
    pub below_min_distance: usize,
    /// Pairs whose distance could not be computed
    pub distance_failures: usize,
    pub orphan_events: usize,
}

/// Records plus bookkeeping from [`DependencyScorer::score`]
#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Records in no particular order
    pub records: Vec<DependencyRecord>,
    pub matrix: OccurrenceMatrix,
    pub stats: ScoringStats,
}

enum PairOutcome {
    Scored(DependencyRecord),
    TooClose,
    NoDistance,
}

/// Scores co-occurring subgraphs by mutual information over geographic
/// distance
pub struct DependencyScorer<'a, D: GeometryDistance + ?Sized> {
    graph: &'a StreetGraph,
    distance: &'a D,
    min_distance: f64,
    progress: bool,
}

impl<'a, D: GeometryDistance + ?Sized> DependencyScorer<'a, D> {
    pub fn new(graph: &'a StreetGraph, distance: &'a D, min_distance: f64) -> Self {
        Self {
            graph,
            distance,
            min_distance,
            progress: false,
        }
    }

    /// Draw a progress bar while scoring
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Build the occurrence matrix from `events` (ascending by time) and score
    /// every pair of subgraphs that was active at a common timepoint.
    ///
    /// A pair is reported only if its distance is defined and at least the
    /// minimum distance. Distance failures never abort the scan.
    pub fn score(
        &self,
        subgraphs: &[Subgraph],
        events: &[OutlierEvent],
        number_of_timepoints: usize,
    ) -> DiscoveryResult<ScoringOutcome> {
        let co = CoOccurrence::replay(subgraphs, events, number_of_timepoints)?;

        log::info!(
            "Scoring {} candidate pairs (minimum distance {})",
            co.candidates.len(),
            self.min_distance
        );

        let bar = stage_bar(self.progress, co.candidates.len(), "dependency scoring");
        let outcomes: Vec<PairOutcome> = co
            .candidates
            .par_iter()
            .map(|&(left, right)| {
                let outcome = self.score_pair(&co.matrix, subgraphs, left, right);
                bar.inc(1);
                outcome
            })
            .collect();
        bar.finish_and_clear();

        let mut stats = ScoringStats {
            candidates: co.candidates.len(),
            orphan_events: co.orphan_events,
            ..ScoringStats::default()
        };
        let mut records = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Scored(record) => records.push(record),
                PairOutcome::TooClose => stats.below_min_distance += 1,
                PairOutcome::NoDistance => stats.distance_failures += 1,
            }
        }
        stats.records = records.len();

        log::info!(
            "Emitted {} dependency records ({} below minimum distance, {} without distance)",
            stats.records,
            stats.below_min_distance,
            stats.distance_failures
        );

        Ok(ScoringOutcome {
            records,
            matrix: co.matrix,
            stats,
        })
    }

    fn score_pair(
        &self,
        matrix: &OccurrenceMatrix,
        subgraphs: &[Subgraph],
        left: usize,
        right: usize,
    ) -> PairOutcome {
        let (lhs, rhs) = (&subgraphs[left], &subgraphs[right]);
        let lhs_geometries = self.graph.geometries(lhs.edges());
        let rhs_geometries = self.graph.geometries(rhs.edges());

        let distance = match self.distance.min_distance(&lhs_geometries, &rhs_geometries) {
            Some(d) if d.is_finite() && d >= 0.0 => d,
            other => {
                log::debug!(
                    "No distance between subgraphs {} and {} ({:?})",
                    lhs.id(),
                    rhs.id(),
                    other
                );
                return PairOutcome::NoDistance;
            }
        };

        if distance < self.min_distance {
            return PairOutcome::TooClose;
        }

        let mi = mutual_information(matrix.row(left), matrix.row(right));
        PairOutcome::Scored(DependencyRecord {
            subgraph_1: lhs.id(),
            subgraph_2: rhs.id(),
            distance,
            mutual_information: mi,
            score: dependency_score(mi, distance),
        })
    }
}

/// `mi / distance`. Touching subgraphs (distance 0) score infinity when they
/// share information and 0 when they do not.
pub fn dependency_score(mutual_information: f64, distance: f64) -> f64 {
    if mutual_information == 0.0 {
        0.0
    } else {
        mutual_information / distance
    }
}
