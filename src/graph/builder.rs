//! Street graph construction

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::geo::Geometry;
use crate::graph::{EdgeLabel, Segment, StreetGraph, VertexId};

/// Builder for incrementally constructing a StreetGraph
pub struct GraphBuilder {
    /// Directed graph, node weight = vertex id, edge weight = segment label
    graph: DiGraph<VertexId, EdgeLabel>,

    /// Mapping from vertex ids to node indices
    id_to_index: HashMap<VertexId, NodeIndex>,

    /// Segments by label
    segments: HashMap<EdgeLabel, Segment>,

    /// Segments skipped because their vertex pair was already connected
    skipped: usize,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(vertices: usize, segments: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(vertices, segments),
            id_to_index: HashMap::with_capacity(vertices),
            segments: HashMap::with_capacity(segments),
            skipped: 0,
        }
    }

    /// Get or create the node for the given vertex id
    pub fn get_or_create_node(&mut self, id: VertexId) -> NodeIndex {
        if let Some(&idx) = self.id_to_index.get(&id) {
            return idx;
        }

        let idx = self.graph.add_node(id);
        self.id_to_index.insert(id, idx);
        idx
    }

    /// Add a directed segment.
    ///
    /// The graph holds at most one segment per ordered vertex pair; a second
    /// segment between the same vertices is skipped and `Ok(false)` returned.
    pub fn add_segment(
        &mut self,
        label: EdgeLabel,
        source: VertexId,
        sink: VertexId,
        geometry: Option<Geometry>,
    ) -> DiscoveryResult<bool> {
        if self.segments.contains_key(&label) {
            return Err(DiscoveryError::DuplicateLabel(label));
        }

        let src_idx = self.get_or_create_node(source);
        let dst_idx = self.get_or_create_node(sink);

        if let Some(existing) = self.graph.find_edge(src_idx, dst_idx) {
            log::debug!(
                "Skipping segment {}: {} -> {} already connected by segment {}",
                label,
                source,
                sink,
                self.graph[existing]
            );
            self.skipped += 1;
            return Ok(false);
        }

        self.graph.add_edge(src_idx, dst_idx, label);
        self.segments.insert(
            label,
            Segment {
                label,
                source,
                sink,
                geometry,
                anomalous: false,
            },
        );

        Ok(true)
    }

    /// Flag the given segments as anomalous, returning how many were known
    pub fn mark_anomalous<I>(&mut self, labels: I) -> usize
    where
        I: IntoIterator<Item = EdgeLabel>,
    {
        let mut marked = 0;
        for label in labels {
            if let Some(segment) = self.segments.get_mut(&label) {
                if !segment.anomalous {
                    segment.anomalous = true;
                    marked += 1;
                }
            }
        }
        marked
    }

    /// Build the street graph
    pub fn build(self) -> StreetGraph {
        if self.skipped > 0 {
            log::info!(
                "Skipped {} parallel segments while building the street graph",
                self.skipped
            );
        }

        StreetGraph {
            graph: self.graph,
            vertex_index: self.id_to_index,
            segments: self.segments,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}
