//! All-pairs directed hop distances over the street graph

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rayon::prelude::*;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::graph::{EdgeLabel, StreetGraph, VertexId};
use crate::progress::stage_bar;

/// Hop count marking "no directed path"
pub const UNREACHABLE: u16 = u16::MAX;

/// Sparse `(source, target) -> hops` matrix. Pairs without an entry are
/// unreachable. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopDistanceMatrix {
    rows: HashMap<VertexId, HashMap<VertexId, u16>>,
}

impl HopDistanceMatrix {
    /// Compute the matrix with one BFS per source vertex on the rayon pool
    pub fn compute(graph: &StreetGraph) -> Self {
        Self::compute_with_progress(graph, false)
    }

    /// [`compute`](Self::compute), drawing a progress bar over the sources
    /// when `progress` is set
    pub fn compute_with_progress(graph: &StreetGraph, progress: bool) -> Self {
        let g = graph.inner();
        log::info!(
            "Computing hop distances for {} vertices and {} segments",
            g.node_count(),
            g.edge_count()
        );

        let sources: Vec<NodeIndex> = g.node_indices().collect();
        let bar = stage_bar(progress, sources.len(), "hop distances");
        let rows: HashMap<VertexId, HashMap<VertexId, u16>> = sources
            .into_par_iter()
            .map(|start| {
                let row = bfs_row(g, start);
                bar.inc(1);
                (g[start], row)
            })
            .collect();
        bar.finish_and_clear();

        let matrix = Self { rows };
        log::info!("Computed {} reachable vertex pairs", matrix.len());
        matrix
    }

    /// Use a cache file when it exists and is non-empty, otherwise compute
    /// the matrix and store it at `cache` (if given).
    ///
    /// A cache is trusted verbatim; it is not checked against `graph`.
    pub fn load_or_compute(
        graph: &StreetGraph,
        cache: Option<&Path>,
        progress: bool,
    ) -> DiscoveryResult<Self> {
        if let Some(path) = cache {
            let usable = path
                .metadata()
                .map(|meta| meta.is_file() && meta.len() > 0)
                .unwrap_or(false);

            if usable {
                log::info!("Loading hop distances from cache {}", path.display());
                return Self::read_cache(path);
            }
        }

        let matrix = Self::compute_with_progress(graph, progress);
        if let Some(path) = cache {
            matrix.write_cache(path)?;
            log::info!("Stored hop distances in {}", path.display());
        }
        Ok(matrix)
    }

    /// Hop count from `source` to `target`, or [`UNREACHABLE`]
    pub fn distance(&self, source: VertexId, target: VertexId) -> u16 {
        self.rows
            .get(&source)
            .and_then(|row| row.get(&target))
            .copied()
            .unwrap_or(UNREACHABLE)
    }

    /// Whether `target` is reachable from `source` within `tolerance` hops
    pub fn within(&self, source: VertexId, target: VertexId, tolerance: u16) -> bool {
        let hops = self.distance(source, target);
        hops != UNREACHABLE && hops <= tolerance
    }

    /// Number of reachable (stored) pairs
    pub fn len(&self) -> usize {
        self.rows.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a distance; unreachable entries are not stored
    pub fn insert(&mut self, source: VertexId, target: VertexId, hops: u16) {
        if hops == UNREACHABLE {
            return;
        }
        self.rows.entry(source).or_default().insert(target, hops);
    }

    /// Read a flat `source,target,hops` cache
    pub fn read_cache(path: &Path) -> DiscoveryResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut matrix = Self::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parse_error = |reason: String| DiscoveryError::CacheParse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            };

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [source, target, hops] = fields.as_slice() else {
                return Err(parse_error(format!(
                    "expected 3 fields, found {}",
                    fields.len()
                )));
            };

            let source: VertexId = source
                .parse()
                .map_err(|e| parse_error(format!("source '{source}': {e}")))?;
            let target: VertexId = target
                .parse()
                .map_err(|e| parse_error(format!("target '{target}': {e}")))?;
            let hops: u16 = hops
                .parse()
                .map_err(|e| parse_error(format!("hop count '{hops}': {e}")))?;

            matrix.insert(source, target, hops);
        }

        Ok(matrix)
    }

    /// Write the matrix as `source,target,hops` lines, sorted by pair
    pub fn write_cache(&self, path: &Path) -> DiscoveryResult<()> {
        let mut entries: Vec<(VertexId, VertexId, u16)> = self
            .rows
            .iter()
            .flat_map(|(&source, row)| {
                row.iter()
                    .map(move |(&target, &hops)| (source, target, hops))
            })
            .collect();
        entries.par_sort_unstable();

        let mut writer = BufWriter::new(File::create(path)?);
        for (source, target, hops) in entries {
            writeln!(writer, "{source},{target},{hops}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Unweighted single-source shortest paths following edge direction
fn bfs_row(g: &DiGraph<VertexId, EdgeLabel>, start: NodeIndex) -> HashMap<VertexId, u16> {
    let mut row = HashMap::new();
    let mut seen = vec![false; g.node_count()];
    let mut queue = VecDeque::new();

    seen[start.index()] = true;
    queue.push_back((start, 0u16));

    while let Some((node, hops)) = queue.pop_front() {
        row.insert(g[node], hops);
        let next = hops.saturating_add(1).min(UNREACHABLE - 1);
        for neighbour in g.neighbors_directed(node, Direction::Outgoing) {
            if !seen[neighbour.index()] {
                seen[neighbour.index()] = true;
                queue.push_back((neighbour, next));
            }
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn chain() -> StreetGraph {
        let mut builder = GraphBuilder::default();
        builder.add_segment(10, 1, 2, None).unwrap();
        builder.add_segment(11, 2, 3, None).unwrap();
        builder.add_segment(12, 3, 4, None).unwrap();
        builder.build()
    }

    #[test]
    fn chain_distances_follow_direction() {
        let matrix = HopDistanceMatrix::compute(&chain());

        assert_eq!(matrix.distance(1, 1), 0);
        assert_eq!(matrix.distance(1, 2), 1);
        assert_eq!(matrix.distance(1, 4), 3);
        assert_eq!(matrix.distance(4, 1), UNREACHABLE);
        assert_eq!(matrix.distance(2, 1), UNREACHABLE);
        // 4 + 3 + 2 + 1 reachable pairs including self distances
        assert_eq!(matrix.len(), 10);
    }

    #[test]
    fn shortcut_wins() {
        let mut builder = GraphBuilder::default();
        builder.add_segment(1, 1, 2, None).unwrap();
        builder.add_segment(2, 2, 3, None).unwrap();
        builder.add_segment(3, 3, 4, None).unwrap();
        builder.add_segment(4, 1, 4, None).unwrap();
        let matrix = HopDistanceMatrix::compute(&builder.build());

        assert_eq!(matrix.distance(1, 4), 1);
        assert_eq!(matrix.distance(2, 4), 2);
    }

    #[test]
    fn unknown_vertices_are_unreachable() {
        let matrix = HopDistanceMatrix::compute(&chain());
        assert_eq!(matrix.distance(1, 99), UNREACHABLE);
        assert_eq!(matrix.distance(99, 1), UNREACHABLE);
        assert!(!matrix.within(99, 1, u16::MAX));
    }

    #[test]
    fn within_respects_tolerance() {
        let matrix = HopDistanceMatrix::compute(&chain());
        assert!(matrix.within(1, 3, 2));
        assert!(!matrix.within(1, 4, 2));
        assert!(!matrix.within(4, 1, 2));
    }

    #[test]
    fn progress_bar_does_not_change_distances() {
        let graph = chain();
        assert_eq!(
            HopDistanceMatrix::compute_with_progress(&graph, true),
            HopDistanceMatrix::compute(&graph)
        );
    }

    #[test]
    fn cache_is_written_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hops.csv");
        let graph = chain();

        let computed = HopDistanceMatrix::load_or_compute(&graph, Some(&path), false).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), computed.len());
        assert!(contents.lines().any(|l| l == "1,4,3"));

        let loaded = HopDistanceMatrix::load_or_compute(&graph, Some(&path), false).unwrap();
        assert_eq!(loaded, computed);
    }

    #[test]
    fn cache_is_trusted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.csv");
        std::fs::write(&path, "1,2,7\n").unwrap();

        let matrix = HopDistanceMatrix::load_or_compute(&chain(), Some(&path), false).unwrap();
        assert_eq!(matrix.distance(1, 2), 7);
        assert_eq!(matrix.distance(2, 3), UNREACHABLE);
    }

    #[test]
    fn empty_cache_triggers_computation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        let matrix = HopDistanceMatrix::load_or_compute(&chain(), Some(&path), false).unwrap();
        assert_eq!(matrix.distance(1, 4), 3);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn malformed_cache_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "1,2,1\n2,x,1\n").unwrap();

        match HopDistanceMatrix::read_cache(&path) {
            Err(DiscoveryError::CacheParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
