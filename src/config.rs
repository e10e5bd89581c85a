//! Configuration management for the discovery pipeline

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cluster::growing::GrowthStrategy;
use crate::error::{DiscoveryError, DiscoveryResult};

/// Parameters of one discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum hop count between two segments for them to be close
    pub hop_tolerance: u16,

    /// Minimum number of segments for a grown region to be kept
    pub min_cluster_size: usize,

    /// Similarity at or above which two subgraphs are merged
    pub similarity_threshold: f64,

    /// Subgraph pairs closer than this (metres) are not scored
    pub min_distance: f64,

    /// Hop-distance cache file, read if present and written otherwise
    pub distance_cache: Option<PathBuf>,

    pub growth_strategy: GrowthStrategy,

    /// Write `subgraphs.tsv` next to the dependency records
    pub write_subgraphs: bool,

    /// Write the per-timepoint regions before merging
    pub write_regions: bool,

    /// Draw terminal progress bars for the long-running stages. Set by the
    /// CLI; never read from or written to config files.
    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hop_tolerance: 2,
            min_cluster_size: 2,
            similarity_threshold: 0.5,
            min_distance: 0.0,
            distance_cache: None,
            growth_strategy: GrowthStrategy::UnionFind,
            write_subgraphs: false,
            write_regions: false,
            show_progress: false,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values
    pub fn new(
        hop_tolerance: u16,
        min_cluster_size: usize,
        similarity_threshold: f64,
        min_distance: f64,
    ) -> Self {
        Self {
            hop_tolerance,
            min_cluster_size,
            similarity_threshold,
            min_distance,
            ..Self::default()
        }
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> DiscoveryResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DiscoveryError::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(DiscoveryError::InvalidConfig(format!(
                "min_distance must be a non-negative number, got {}",
                self.min_distance
            )));
        }
        if self.min_cluster_size == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "min_cluster_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
