//! Results persistence module

use anyhow::{Context, Result};
use serde_json::{json, to_string_pretty};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cluster::Subgraph;
use crate::config::Config;
use crate::dependency::DependencyRecord;
use crate::graph::StreetGraph;
use crate::pipeline::PipelineOutput;

pub const SUBGRAPHS_FILE: &str = "subgraphs.tsv";
pub const DEPENDENCIES_FILE: &str = "dependencies.csv";
pub const REGIONS_FILE: &str = "regions.json";
pub const SUMMARY_FILE: &str = "summary.json";

/// Save the results of a run to the specified directory
pub fn save_results(
    output: &PipelineOutput,
    graph: &StreetGraph,
    config: &Config,
    output_dir: &str,
) -> Result<()> {
    log::info!(
        "Saving {} subgraphs and {} dependency records to {}",
        output.subgraphs.len(),
        output.records.len(),
        output_dir
    );

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;
    let dir = Path::new(output_dir);

    write_dependency_records(&output.records, &dir.join(DEPENDENCIES_FILE))?;

    if config.write_subgraphs {
        write_subgraphs(&output.subgraphs, &dir.join(SUBGRAPHS_FILE))?;
    }

    if config.write_regions {
        write_regions(output, &dir.join(REGIONS_FILE))?;
    }

    save_summary(output, graph, config, &dir.join(SUMMARY_FILE))?;

    Ok(())
}

/// One line per subgraph: `<id>\t<label>,<label>,...`
pub fn write_subgraphs(subgraphs: &[Subgraph], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for subgraph in subgraphs {
        let labels: Vec<String> = subgraph.edges().iter().map(|l| l.to_string()).collect();
        writeln!(writer, "{}\t{}", subgraph.id(), labels.join(","))?;
    }

    writer.flush()?;
    log::info!("Wrote {} subgraphs to {}", subgraphs.len(), path.display());
    Ok(())
}

/// CSV of records; an infinite score is written as `inf`
pub fn write_dependency_records(records: &[DependencyRecord], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "subgraph_1,subgraph_2,distance,mutual_information,score")?;
    for r in records {
        writeln!(
            writer,
            "{},{},{},{},{}",
            r.subgraph_1, r.subgraph_2, r.distance, r.mutual_information, r.score
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Per-timepoint regions before merging, keyed by timestamp
pub fn write_regions(output: &PipelineOutput, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    let regions: Vec<_> = output
        .regions
        .iter()
        .map(|(timestamp, subgraphs)| {
            json!({
                "timestamp": timestamp,
                "subgraphs": subgraphs,
            })
        })
        .collect();

    file.write_all(to_string_pretty(&json!({ "regions": regions }))?.as_bytes())?;
    Ok(())
}

/// Run statistics and the configuration that produced them
fn save_summary(
    output: &PipelineOutput,
    graph: &StreetGraph,
    config: &Config,
    path: &Path,
) -> Result<()> {
    log::info!("Saving run summary");

    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    let sizes: Vec<usize> = output.subgraphs.iter().map(Subgraph::len).collect();
    let avg_size = if sizes.is_empty() {
        0.0
    } else {
        sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
    };

    let summary = json!({
        "config": config,
        "graph": {
            "vertex_count": graph.vertex_count(),
            "edge_count": graph.edge_count(),
            "anomalous_count": graph.anomalous_count(),
        },
        "stats": output.stats,
        "subgraphs": {
            "count": sizes.len(),
            "max_size": sizes.iter().max().copied().unwrap_or(0),
            "avg_size": avg_size,
        },
    });

    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStats;
    use std::collections::BTreeMap;

    fn output() -> PipelineOutput {
        PipelineOutput {
            regions: BTreeMap::from([(100, vec![Subgraph::new(0, [10, 11])])]),
            subgraphs: vec![Subgraph::new(0, [10, 11, 12]), Subgraph::new(3, [40])],
            records: vec![DependencyRecord {
                subgraph_1: 0,
                subgraph_2: 3,
                distance: 200.0,
                mutual_information: 0.5,
                score: 0.0025,
            }],
            stats: PipelineStats::default(),
        }
    }

    #[test]
    fn subgraphs_are_tab_separated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUBGRAPHS_FILE);
        write_subgraphs(&output().subgraphs, &path).unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, "0\t10,11,12\n3\t40\n");
    }

    #[test]
    fn records_have_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEPENDENCIES_FILE);
        write_dependency_records(&output().records, &path).unwrap();

        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "subgraph_1,subgraph_2,distance,mutual_information,score");
        assert_eq!(lines[1], "0,3,200,0.5,0.0025");
    }

    #[test]
    fn touching_subgraphs_write_infinite_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEPENDENCIES_FILE);
        let touching = DependencyRecord {
            subgraph_1: 1,
            subgraph_2: 2,
            distance: 0.0,
            mutual_information: 0.5,
            score: f64::INFINITY,
        };
        write_dependency_records(&[touching], &path).unwrap();

        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(1), Some("1,2,0,0.5,inf"));
    }

    #[test]
    fn optional_outputs_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let out_str = out.to_str().unwrap();
        let graph = crate::graph::GraphBuilder::default().build();

        save_results(&output(), &graph, &Config::default(), out_str).unwrap();
        assert!(out.join(DEPENDENCIES_FILE).exists());
        assert!(out.join(SUMMARY_FILE).exists());
        assert!(!out.join(SUBGRAPHS_FILE).exists());
        assert!(!out.join(REGIONS_FILE).exists());

        let config = Config {
            write_subgraphs: true,
            write_regions: true,
            ..Config::default()
        };
        save_results(&output(), &graph, &config, out_str).unwrap();
        assert!(out.join(SUBGRAPHS_FILE).exists());

        let regions: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(REGIONS_FILE)).unwrap()).unwrap();
        assert_eq!(regions["regions"][0]["timestamp"], 100);
        assert_eq!(regions["regions"][0]["subgraphs"][0]["edges"], json!([10, 11]));
    }

    #[test]
    fn summary_reports_subgraph_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let graph = crate::graph::GraphBuilder::default().build();

        save_summary(&output(), &graph, &Config::default(), &path).unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(summary["subgraphs"]["count"], 2);
        assert_eq!(summary["subgraphs"]["max_size"], 3);
        assert_eq!(summary["config"]["hop_tolerance"], 2);
        assert_eq!(summary["config"]["growth_strategy"], "union-find");
    }
}
