//! Clustering tool entry point (`spec.md` §6.1/§6.4): reads a control file,
//! runs the full pipeline, and writes the structured report to the
//! configured output (or stdout).

use acaca::accessibility::SubprocessAccessibility;
use acaca::control::parse_control_file;
use acaca::report::{write_report, ReportData};
use acaca::RunConfig;
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acaca", about = "Cluster protein loop geometries and derive SDRs")]
struct Args {
    /// Path to the control file (ACACA's `.clan`-style directive grammar).
    control_file: PathBuf,

    /// Path to the ambient run configuration (TOML). Defaults to figment's
    /// layered `acaca.toml` / `acaca.local.toml` / `ACACA_*` lookup.
    #[arg(long)]
    config: Option<String>,

    /// Directory to cache solvent-accessibility sidecars in, enabling the
    /// buried-hydrophobic SDR rule. Without it that rule is bypassed.
    #[arg(long)]
    accessibility_temp_dir: Option<PathBuf>,

    /// External solvent-accessibility tool invoked as `<tool> <in> <out>`.
    #[arg(long, default_value = "naccess")]
    accessibility_tool: String,

    /// Keep the accessibility sidecar file instead of deleting it on exit.
    #[arg(long)]
    keep_sa_file: bool,
}

fn init_logging(run_cfg: &RunConfig) {
    let filter = EnvFilter::try_new(&run_cfg.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if run_cfg.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let run_cfg = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::load()?,
    };
    init_logging(&run_cfg);

    let text = fs::read_to_string(&args.control_file)?;
    let cluster_cfg = parse_control_file(&args.control_file, &text)?;
    info!(target: "acaca", loops = cluster_cfg.loops.len(), method = ?cluster_cfg.method, "starting clustering run");

    let accessibility = args.accessibility_temp_dir.as_ref().map(|dir| {
        SubprocessAccessibility::new(dir.clone(), args.accessibility_tool.clone(), args.keep_sa_file)
    });
    let provider = accessibility
        .as_ref()
        .map(|p| p as &dyn acaca::accessibility::AccessibilityProvider);

    let outcome = acaca::pipeline::run(&cluster_cfg, provider)?;

    let report = ReportData {
        header: outcome.header,
        loop_ids: &outcome.loop_ids,
        data: cluster_cfg.sections.data.then_some(outcome.data.as_slice()),
        loop_lengths: cluster_cfg
            .sections
            .table
            .then_some(outcome.loop_lengths.as_slice()),
        dendogram_lines: outcome.dendogram_lines.as_deref(),
        raw_assignments: &outcome.raw_assignments,
        raw_medians: &outcome.raw_medians,
        postcluster_merges: &outcome.postcluster_merges,
        assignments: &outcome.assignments,
        medians: &outcome.medians,
        critical_residues: outcome.critical_residues.as_deref(),
    };

    match &cluster_cfg.output {
        Some(path) => {
            let mut f = fs::File::create(path)?;
            write_report(&mut f, &report)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_report(&mut handle, &report)?;
            handle.flush()?;
        }
    }

    info!(target: "acaca", "clustering run complete");
    Ok(())
}
