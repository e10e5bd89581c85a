//! Parquet file handling for street graph and outlier data

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::data::preprocessing::sort_events;
use crate::data::OutlierEvent;
use crate::geo::parse_wkt;
use crate::graph::GraphBuilder;

/// Load street segments (`id`, `source`, `target`, optional WKT `geometry`).
///
/// Returns the builder so callers can flag anomalous segments before the
/// graph is frozen.
pub fn load_street_graph(path: &str) -> Result<GraphBuilder> {
    log::info!("Reading street graph: {}", path);

    if !std::path::Path::new(path).exists() {
        return Err(anyhow::anyhow!("File not found: {}", path));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?
        .collect()
        .with_context(|| format!("reading {path}"))?;

    log::debug!("Graph file schema: {:?}", df.schema());

    let id_col = df.column("id")?.cast(&DataType::Int64)?;
    let source_col = df.column("source")?.cast(&DataType::Int64)?;
    let target_col = df.column("target")?.cast(&DataType::Int64)?;
    let ids = id_col.i64()?;
    let sources = source_col.i64()?;
    let targets = target_col.i64()?;
    let geometries = match df.column("geometry") {
        Ok(column) => Some(column.str()?.clone()),
        Err(_) => {
            log::info!("No geometry column; distance scoring will drop every pair");
            None
        }
    };

    let row_count = df.height();
    log::info!("Processing {} street segments", row_count);

    let mut builder = GraphBuilder::with_capacity(row_count, row_count);
    let mut incomplete = 0usize;

    for i in 0..row_count {
        let (Some(label), Some(source), Some(target)) = (ids.get(i), sources.get(i), targets.get(i))
        else {
            incomplete += 1;
            continue;
        };

        let geometry = match geometries.as_ref().and_then(|g| g.get(i)) {
            Some(wkt) => {
                Some(parse_wkt(wkt).with_context(|| format!("segment {label} in {path}"))?)
            }
            None => None,
        };

        builder.add_segment(label, source, target, geometry)?;
    }

    if incomplete > 0 {
        log::warn!("Ignored {} segments with missing id/source/target", incomplete);
    }

    Ok(builder)
}

/// Load outlier events (`id`, `time`), sorted ascending by time.
///
/// `time` may be a temporal column or an integer; temporal values are taken
/// in their physical representation.
pub fn load_outlier_events(path: &str) -> Result<Vec<OutlierEvent>> {
    log::info!("Reading outlier events: {}", path);

    if !std::path::Path::new(path).exists() {
        return Err(anyhow::anyhow!("File not found: {}", path));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?
        .select([
            col("id").cast(DataType::Int64),
            col("time").cast(DataType::Int64),
        ])
        .collect()
        .with_context(|| format!("reading {path}"))?;

    let ids = df.column("id")?.i64()?;
    let times = df.column("time")?.i64()?;

    let mut events = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Some(segment), Some(timestamp)) = (ids.get(i), times.get(i)) {
            events.push(OutlierEvent::new(segment, timestamp));
        }
    }

    sort_events(&mut events);
    log::info!("Loaded {} outlier events", events.len());

    Ok(events)
}
