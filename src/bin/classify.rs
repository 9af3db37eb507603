//! Classifier entry point (`spec.md` §6.4): assigns a single new loop to
//! the nearest cluster of a previously written report, without reclustering.

use acaca::classify::{classify, ClassifyOutcome, NO_MATCH_DISTANCE};
use acaca::control::parse_residue_spec;
use acaca::features::{extract, FeatureConfig};
use acaca::report::read_report;
use acaca::structure_io::read_structure;
use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "classify", about = "Classify a new loop against a clustering report")]
struct Args {
    /// Report file previously written by `acaca`. Must have been run with
    /// the DATA section enabled (`TABLE`/`DATA` directive) so feature
    /// vectors are available for matching.
    report: PathBuf,

    /// Structure file containing the loop to classify.
    structure: PathBuf,

    /// First residue of the loop, e.g. `L27` or `H101A`.
    first: String,

    /// Last residue of the loop.
    last: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let report_text = fs::read_to_string(&args.report)
        .with_context(|| format!("reading report {}", args.report.display()))?;
    let report = read_report(&report_text)?;

    let Some((loop_ids, data)) = report.feature_matrix() else {
        bail!(
            "report {} was written without a DATA section; rerun acaca with the DATA directive enabled",
            args.report.display()
        );
    };
    let (assignment_ids, clusters) = report.assignment_vectors();
    if assignment_ids != loop_ids {
        bail!("report DATA and ASSIGNMENTS sections disagree on loop order");
    }

    let structure = read_structure(&args.structure)?;
    let synthetic = Path::new("<classify-args>");
    let first = parse_residue_spec(synthetic, 0, &args.first)
        .with_context(|| format!("parsing first residue {:?}", args.first))?;
    let last = parse_residue_spec(synthetic, 0, &args.last)
        .with_context(|| format!("parsing last residue {:?}", args.last))?;

    let feature_cfg = FeatureConfig {
        torsion_mode: report.header.torsion_mode,
        include_angles: report.header.include_angles,
        include_distances: report.header.include_distances,
        scheme: report.header.scheme.clone(),
    };
    let query = extract(&structure, first, last, &feature_cfg)?;

    match classify(&data, &clusters, &loop_ids, &query)? {
        ClassifyOutcome::Matched {
            cluster_id,
            representative,
            distance,
            singleton,
        } => {
            let kind = if singleton { "SINGLETON" } else { "CLUSTER" };
            println!(
                "Cluster: {cluster_id} Representative: {representative} {kind} Distance: {distance:.3}"
            );
        }
        ClassifyOutcome::NoMatch => {
            println!("Best: 0 Representative: (none) NOMATCH Distance: {NO_MATCH_DISTANCE:.3}");
        }
    }

    Ok(())
}
