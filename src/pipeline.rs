//! End-to-end discovery run: hop distances, region growing, spatial merging
//! and dependency scoring

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cluster::growing::RegionGrower;
use crate::cluster::merging::{MergeStats, SpatialMerger};
use crate::cluster::{IdAllocator, Subgraph};
use crate::config::Config;
use crate::data::preprocessing::{
    count_orphans, count_timepoints, group_by_timepoint, is_time_ordered,
};
use crate::data::{OutlierEvent, Timestamp};
use crate::dependency::{DependencyRecord, DependencyScorer, ScoringStats};
use crate::geo::GeometryDistance;
use crate::graph::{HopDistanceMatrix, StreetGraph};

/// Counters of one run, written to `summary.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub timepoints: usize,
    pub events: usize,
    /// Events whose segment is not in the street graph
    pub orphan_events: usize,
    pub reachable_pairs: usize,
    /// Subgraphs produced by region growing, before merging
    pub region_count: usize,
    pub merge: MergeStats,
    pub scoring: ScoringStats,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Per-timepoint regions before merging
    pub regions: BTreeMap<Timestamp, Vec<Subgraph>>,
    /// Final subgraphs in ascending id order
    pub subgraphs: Vec<Subgraph>,
    /// Dependency records sorted by subgraph pair
    pub records: Vec<DependencyRecord>,
    pub stats: PipelineStats,
}

/// Run the whole discovery on `events` (ascending by time)
pub fn run<D>(
    config: &Config,
    graph: &StreetGraph,
    events: &[OutlierEvent],
    distance: &D,
) -> Result<PipelineOutput>
where
    D: GeometryDistance + ?Sized,
{
    config.validate()?;
    if !is_time_ordered(events) {
        anyhow::bail!("outlier events must be sorted ascending by time");
    }

    let timepoints = group_by_timepoint(events);
    let number_of_timepoints = count_timepoints(events);
    let orphan_events = count_orphans(events, graph);
    log::info!(
        "Running discovery on {} events over {} timepoints ({} outside the street graph)",
        events.len(),
        number_of_timepoints,
        orphan_events
    );

    // 1. Hop distances
    let distances = HopDistanceMatrix::load_or_compute(
        graph,
        config.distance_cache.as_deref(),
        config.show_progress,
    )
    .context("preparing hop distances")?;

    // 2. Region growing
    let ids = IdAllocator::new();
    let grower = RegionGrower::new(graph, &distances, &ids)
        .with_tolerance(config.hop_tolerance)
        .with_min_cluster_size(config.min_cluster_size)
        .with_strategy(config.growth_strategy)
        .with_progress(config.show_progress);
    let regions = grower.grow_all(&timepoints);
    let region_count = regions.values().map(Vec::len).sum();

    // 3. Spatial merging
    let merger =
        SpatialMerger::new(config.similarity_threshold).with_progress(config.show_progress);
    let merged = merger.merge(regions.values().cloned());
    log::info!(
        "Merged {} regions into {} subgraphs in {} iterations",
        merged.stats.initial_count,
        merged.stats.final_count,
        merged.stats.iterations
    );

    // 4. Dependency scoring
    let scorer = DependencyScorer::new(graph, distance, config.min_distance)
        .with_progress(config.show_progress);
    let scored = scorer
        .score(&merged.subgraphs, events, number_of_timepoints)
        .context("scoring dependencies")?;

    let mut records = scored.records;
    records.sort_unstable_by_key(|r| (r.subgraph_1, r.subgraph_2));

    let stats = PipelineStats {
        timepoints: number_of_timepoints,
        events: events.len(),
        orphan_events,
        reachable_pairs: distances.len(),
        region_count,
        merge: merged.stats,
        scoring: scored.stats,
    };

    Ok(PipelineOutput {
        regions,
        subgraphs: merged.subgraphs,
        records,
        stats,
    })
}
