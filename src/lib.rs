//! Core library for spatio-temporal dependency discovery on street networks

pub mod config;
pub mod error;
pub mod data;
pub mod geo;
pub mod graph;
pub mod cluster;
pub mod dependency;
pub mod pipeline;
pub mod progress;
pub mod storage;

pub use anyhow::{Result, anyhow};
pub use error::{DiscoveryError, DiscoveryResult};
