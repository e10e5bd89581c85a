//! Structural dependencies between merged subgraphs

pub mod information;
pub mod occurrence;
pub mod scorer;

use serde::{Deserialize, Serialize};

use crate::cluster::SubgraphId;

pub use occurrence::{CoOccurrence, OccurrenceMatrix};
pub use scorer::{DependencyScorer, ScoringOutcome, ScoringStats};

/// Scored relationship between two final subgraphs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub subgraph_1: SubgraphId,
    pub subgraph_2: SubgraphId,
    /// Minimum geographic distance between the two subgraphs
    pub distance: f64,
    /// Mutual information of the activation sequences, in bits
    pub mutual_information: f64,
    /// `mutual_information / distance`; infinite for touching subgraphs that
    /// share information
    pub score: f64,
}
