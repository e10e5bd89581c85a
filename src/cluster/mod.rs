//! Subgraph clustering: region growing and spatial merging

pub mod growing;
pub mod merging;
pub mod similarity;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::graph::EdgeLabel;

/// Stable subgraph identity, never reused
pub type SubgraphId = u32;

/// Hands out subgraph ids. Owned by the pipeline run rather than the process,
/// so independent runs (and tests) never share a counter.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `first`
    pub fn starting_at(first: SubgraphId) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn allocate(&self) -> SubgraphId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of ids handed out so far (for an allocator starting at 0)
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

/// A set of street segments with a stable identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    id: SubgraphId,
    edges: BTreeSet<EdgeLabel>,
}

impl Subgraph {
    pub fn new<I>(id: SubgraphId, edges: I) -> Self
    where
        I: IntoIterator<Item = EdgeLabel>,
    {
        Self {
            id,
            edges: edges.into_iter().collect(),
        }
    }

    pub fn id(&self) -> SubgraphId {
        self.id
    }

    /// Member segment labels, ascending
    pub fn edges(&self) -> &BTreeSet<EdgeLabel> {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, label: EdgeLabel) -> bool {
        self.edges.contains(&label)
    }

    pub fn is_subset_of(&self, other: &Subgraph) -> bool {
        self.edges.is_subset(&other.edges)
    }

    pub fn intersection_len(&self, other: &Subgraph) -> usize {
        // iterate the smaller set
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.edges.iter().filter(|e| large.edges.contains(e)).count()
    }

    pub fn union_len(&self, other: &Subgraph) -> usize {
        self.len() + other.len() - self.intersection_len(other)
    }

    /// Take over all edges of `donor`. The donor is consumed, so its identity
    /// cannot be observed after the merge.
    pub fn absorb(&mut self, donor: Subgraph) {
        self.edges.extend(donor.edges);
    }
}
