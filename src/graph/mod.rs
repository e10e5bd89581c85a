//! Street network representation and hop-distance computation

pub mod builder;
pub mod distances;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::geo::Geometry;

pub use builder::GraphBuilder;
pub use distances::{HopDistanceMatrix, UNREACHABLE};

/// Street network node identifier
pub type VertexId = i64;

/// Stable, globally unique street segment identifier
pub type EdgeLabel = i64;

/// A directed street segment. Two segments are equal iff their labels are.
#[derive(Debug, Clone)]
pub struct Segment {
    pub label: EdgeLabel,
    pub source: VertexId,
    pub sink: VertexId,
    pub geometry: Option<Geometry>,
    /// Whether the segment is anomalous at one or more timepoints
    pub anomalous: bool,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
    }
}

/// Immutable directed street graph with segments addressable by label
#[derive(Debug, Clone, Default)]
pub struct StreetGraph {
    graph: DiGraph<VertexId, EdgeLabel>,
    vertex_index: HashMap<VertexId, NodeIndex>,
    segments: HashMap<EdgeLabel, Segment>,
}

impl StreetGraph {
    /// Look up a segment by label
    pub fn segment(&self, label: EdgeLabel) -> Option<&Segment> {
        self.segments.get(&label)
    }

    pub fn contains_segment(&self, label: EdgeLabel) -> bool {
        self.segments.contains_key(&label)
    }

    pub fn contains_vertex(&self, vertex: VertexId) -> bool {
        self.vertex_index.contains_key(&vertex)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn anomalous_count(&self) -> usize {
        self.segments.values().filter(|s| s.anomalous).count()
    }

    /// Geometries of the given segments; unknown labels and segments without
    /// geometry are left out
    pub fn geometries<'l, I>(&self, labels: I) -> Vec<&Geometry>
    where
        I: IntoIterator<Item = &'l EdgeLabel>,
    {
        labels
            .into_iter()
            .filter_map(|label| self.segments.get(label))
            .filter_map(|segment| segment.geometry.as_ref())
            .collect()
    }

    pub(crate) fn inner(&self) -> &DiGraph<VertexId, EdgeLabel> {
        &self.graph
    }
}
