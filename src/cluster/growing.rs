//! Region growing: per-timepoint clustering of anomalous segments

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::{IdAllocator, Subgraph};
use crate::data::Timestamp;
use crate::graph::{EdgeLabel, HopDistanceMatrix, Segment, StreetGraph};
use crate::progress::stage_bar;

/// How anomalous segments of one timepoint are linked into clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthStrategy {
    /// Connected components of the "close" relation; independent of the
    /// order in which segments are visited
    #[default]
    UnionFind,
    /// Greedy single linkage in ascending label order. A new segment only
    /// joins clusters it reaches, so the result depends on visiting order.
    Sequential,
}

/// Union-Find structure over the anomalous segments of one timepoint
struct DisjointSets {
    /// Parent pointers (parent[i] = parent of element i)
    parent: Vec<u32>,

    /// Size of each set (for union by size)
    size: Vec<u32>,
}

impl DisjointSets {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            size: vec![1; size],
        }
    }

    /// Find the root of the set containing x with path compression
    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }

        root
    }

    /// Union the sets containing x and y
    fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        // attach smaller tree under root of larger tree
        if self.size[root_x as usize] >= self.size[root_y as usize] {
            self.parent[root_y as usize] = root_x;
            self.size[root_x as usize] += self.size[root_y as usize];
        } else {
            self.parent[root_x as usize] = root_y;
            self.size[root_y as usize] += self.size[root_x as usize];
        }
    }
}

/// Clusters anomalous segments using a precomputed hop-distance matrix.
///
/// Segment `a` is close to segment `b` when `b.source` is reachable from
/// `a.sink` within `tolerance` hops.
pub struct RegionGrower<'a> {
    graph: &'a StreetGraph,
    distances: &'a HopDistanceMatrix,
    ids: &'a IdAllocator,
    tolerance: u16,
    min_cluster_size: usize,
    strategy: GrowthStrategy,
    progress: bool,
}

impl<'a> RegionGrower<'a> {
    pub fn new(
        graph: &'a StreetGraph,
        distances: &'a HopDistanceMatrix,
        ids: &'a IdAllocator,
    ) -> Self {
        Self {
            graph,
            distances,
            ids,
            tolerance: 2,
            min_cluster_size: 2,
            strategy: GrowthStrategy::default(),
            progress: false,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u16) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.min_cluster_size = min_cluster_size;
        self
    }

    pub fn with_strategy(mut self, strategy: GrowthStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Draw a progress bar over the timepoints in [`grow_all`](Self::grow_all)
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Cluster the anomalous segments of a single timepoint.
    ///
    /// Segments unknown to the graph are skipped. Clusters smaller than the
    /// minimum size are discarded; survivors get fresh ids.
    pub fn grow<'s, I>(&self, segments: I) -> Vec<Subgraph>
    where
        I: IntoIterator<Item = &'s EdgeLabel>,
    {
        self.cluster_labels(segments)
            .into_iter()
            .map(|labels| Subgraph::new(self.ids.allocate(), labels))
            .collect()
    }

    /// Cluster every timepoint in parallel.
    ///
    /// Ids are assigned after the parallel phase, in timepoint order, so the
    /// result does not depend on thread scheduling.
    pub fn grow_all(
        &self,
        timepoints: &BTreeMap<Timestamp, BTreeSet<EdgeLabel>>,
    ) -> BTreeMap<Timestamp, Vec<Subgraph>> {
        log::info!(
            "Growing regions for {} timepoints (tolerance {}, min size {}, {:?})",
            timepoints.len(),
            self.tolerance,
            self.min_cluster_size,
            self.strategy
        );

        let bar = stage_bar(self.progress, timepoints.len(), "region growing");
        let clustered: Vec<(Timestamp, Vec<Vec<EdgeLabel>>)> = timepoints
            .par_iter()
            .map(|(&t, segments)| {
                let clusters = self.cluster_labels(segments);
                bar.inc(1);
                (t, clusters)
            })
            .collect();
        bar.finish_and_clear();

        let regions: BTreeMap<Timestamp, Vec<Subgraph>> = clustered
            .into_iter()
            .map(|(t, clusters)| {
                let subgraphs = clusters
                    .into_iter()
                    .map(|labels| Subgraph::new(self.ids.allocate(), labels))
                    .collect();
                (t, subgraphs)
            })
            .collect();

        let total: usize = regions.values().map(Vec::len).sum();
        log::info!("Region growing produced {} subgraphs", total);

        regions
    }

    /// Cluster one timepoint into label groups, ordered by smallest label
    fn cluster_labels<'s, I>(&self, segments: I) -> Vec<Vec<EdgeLabel>>
    where
        I: IntoIterator<Item = &'s EdgeLabel>,
    {
        let requested: BTreeSet<EdgeLabel> = segments.into_iter().copied().collect();
        let known: Vec<&Segment> = requested
            .iter()
            .filter_map(|&label| {
                let segment = self.graph.segment(label);
                if segment.is_none() {
                    log::debug!("Skipping outlier segment {} outside the street graph", label);
                }
                segment
            })
            .collect();

        let mut clusters = match self.strategy {
            GrowthStrategy::UnionFind => self.union_find(&known),
            GrowthStrategy::Sequential => self.sequential(&known),
        };

        clusters.retain(|c| c.len() >= self.min_cluster_size);
        for cluster in &mut clusters {
            cluster.sort_unstable();
        }
        clusters.sort_unstable_by_key(|c| c.first().copied());
        clusters
    }

    fn is_close(&self, from: &Segment, to: &Segment) -> bool {
        self.distances.within(from.sink, to.source, self.tolerance)
    }

    fn union_find(&self, known: &[&Segment]) -> Vec<Vec<EdgeLabel>> {
        let mut sets = DisjointSets::new(known.len());

        for (i, a) in known.iter().enumerate() {
            for (j, b) in known.iter().enumerate() {
                if i != j && self.is_close(a, b) {
                    sets.union(i as u32, j as u32);
                }
            }
        }

        let mut components: HashMap<u32, Vec<EdgeLabel>> = HashMap::new();
        for (i, segment) in known.iter().enumerate() {
            let root = sets.find(i as u32);
            components.entry(root).or_default().push(segment.label);
        }

        components.into_values().collect()
    }

    fn sequential(&self, known: &[&Segment]) -> Vec<Vec<EdgeLabel>> {
        let mut clusters: Vec<Vec<&Segment>> = Vec::new();

        for &segment in known {
            let (close, mut rest): (Vec<_>, Vec<_>) = clusters
                .into_iter()
                .partition(|cluster| cluster.iter().any(|member| self.is_close(segment, member)));

            let mut grown = vec![segment];
            grown.extend(close.into_iter().flatten());
            rest.push(grown);
            clusters = rest;
        }

        clusters
            .into_iter()
            .map(|cluster| cluster.into_iter().map(|s| s.label).collect())
            .collect()
    }
}
