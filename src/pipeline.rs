//! Driver orchestration (`spec.md` §3/§5): wires every subsystem together
//! for one clustering run. Grounded in `original_source/acaca.c`'s `main`,
//! which runs the same extractor → clusterer → refiner → SDR-analyser →
//! report sequence as one straight-line batch job (§5: single-threaded,
//! sequential, no cancellation).

use crate::accessibility::{AccessibilityProvider, AccessibilityTable};
use crate::atom::Structure;
use crate::control::{ClusterConfig, LoopSpec};
use crate::error::{AcacaError, ExtractError};
use crate::features::{extract, FeatureConfig};
use crate::refine::{post_cluster, LoopGeometry};
use crate::report::ReportHeader;
use crate::sdr::{analyse_cluster, build_loop_data, unify_sdrs, ClusterAnalysis, SdrRuleConfig};
use crate::structure_io::read_structure;
use crate::superpose::ResidueFrame;
use crate::{cluster, refine::MergeRecord};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Everything a report needs, already computed by one run of [`run`].
pub struct PipelineOutcome {
    pub header: ReportHeader,
    pub loop_ids: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub loop_lengths: Vec<usize>,
    pub dendogram_lines: Option<Vec<String>>,
    pub raw_assignments: Vec<usize>,
    pub raw_medians: Vec<(usize, String)>,
    pub postcluster_merges: Vec<MergeRecord>,
    pub assignments: Vec<usize>,
    pub medians: Vec<(usize, String)>,
    pub critical_residues: Option<Vec<ClusterAnalysis>>,
}

struct LoopUnit {
    spec: LoopSpec,
    structure_idx: usize,
    first_idx: usize,
    last_idx: usize,
}

impl LoopUnit {
    fn len(&self) -> usize {
        self.last_idx - self.first_idx + 1
    }
}

fn load_structures(
    specs: &[LoopSpec],
) -> Result<(Vec<Structure>, HashMap<PathBuf, usize>), AcacaError> {
    let mut structures = Vec::new();
    let mut by_path = HashMap::new();
    for spec in specs {
        if by_path.contains_key(&spec.file) {
            continue;
        }
        let structure = read_structure(&spec.file)?;
        let idx = structures.len();
        structures.push(structure);
        by_path.insert(spec.file.clone(), idx);
    }
    Ok((structures, by_path))
}

/// Resolve every registered loop spec to residue-index bounds, skipping (and
/// warning about) any loop whose feature extraction fails — a structural
/// mismatch, per `spec.md` §7, never aborts the run.
fn resolve_loops(
    specs: &[LoopSpec],
    structures: &[Structure],
    by_path: &HashMap<PathBuf, usize>,
    feature_cfg: &FeatureConfig,
) -> (Vec<LoopUnit>, Vec<String>, Vec<Vec<f64>>) {
    let mut units = Vec::new();
    let mut ids = Vec::new();
    let mut vectors = Vec::new();

    for spec in specs {
        let structure_idx = by_path[&spec.file];
        let structure = &structures[structure_idx];

        let first_idx = match structure.find_residue(spec.first) {
            Some(i) => i,
            None => {
                warn!(target: "pipeline", loop_id = %spec.id(), "first residue not found, skipping loop");
                continue;
            }
        };
        let last_idx = match structure.find_residue(spec.last) {
            Some(i) => i,
            None => {
                warn!(target: "pipeline", loop_id = %spec.id(), "last residue not found, skipping loop");
                continue;
            }
        };
        if last_idx < first_idx {
            warn!(target: "pipeline", loop_id = %spec.id(), "last residue precedes first, skipping loop");
            continue;
        }

        match extract(structure, spec.first, spec.last, feature_cfg) {
            Ok(vector) => {
                ids.push(spec.id());
                vectors.push(vector);
                units.push(LoopUnit {
                    spec: spec.clone(),
                    structure_idx,
                    first_idx,
                    last_idx,
                });
            }
            Err(ExtractError::LengthExceeded { length, max }) => {
                warn!(target: "pipeline", loop_id = %spec.id(), length, max, "loop longer than scheme, skipping");
            }
            Err(e) => {
                warn!(target: "pipeline", loop_id = %spec.id(), error = %e, "feature extraction failed, skipping loop");
            }
        }
    }

    (units, ids, vectors)
}

fn loop_geometry(structure: &Structure, unit: &LoopUnit, id: &str) -> LoopGeometry {
    let residues = (unit.first_idx..=unit.last_idx)
        .map(|k| {
            let atoms = structure.residue_atoms(k);
            ResidueFrame {
                ca: structure.ca(atoms).map(|a| a.xyz).unwrap_or([0.0, 0.0, 0.0]),
                cb: structure.cb(atoms).map(|a| a.xyz),
            }
        })
        .collect();
    LoopGeometry {
        id: id.to_string(),
        residues,
    }
}

fn medians_for(clusters: &[usize], data: &[Vec<f64>], loop_ids: &[String]) -> Vec<(usize, String)> {
    let n_clus = clusters.iter().copied().max().unwrap_or(0);
    let mut out = Vec::new();
    for c in 1..=n_clus {
        if let Some(idx) = cluster::find_median(clusters, data, c) {
            out.push((c, loop_ids[idx].clone()));
        }
    }
    out
}

/// Run the full clustering pipeline for `cfg`. `accessibility`, if given,
/// backs the SDR analyser's buried-hydrophobic rule; without it that rule
/// is bypassed for every loop (`spec.md` §7's accessibility-failure kind).
pub fn run(
    cfg: &ClusterConfig,
    accessibility: Option<&dyn AccessibilityProvider>,
) -> Result<PipelineOutcome, AcacaError> {
    let (structures, by_path) = load_structures(&cfg.loops)?;

    let feature_cfg = FeatureConfig {
        torsion_mode: cfg.torsion_mode,
        include_angles: cfg.include_angles,
        include_distances: cfg.include_distances,
        scheme: cfg.scheme.clone(),
    };

    let (units, loop_ids, data) = resolve_loops(&cfg.loops, &structures, &by_path, &feature_cfg);
    let loop_lengths: Vec<usize> = units.iter().map(LoopUnit::len).collect();

    let dend = cluster::agglomerate(&data, cfg.method)?;
    let n_true = cluster::find_num_true_clusters(&dend.crit, dend.vec_dim).max(1);

    let (raw_assignments, dendogram_lines) = if n_true >= 2 {
        let assignment = cluster::assign_clusters(&dend, n_true)?;
        let raw: Vec<usize> = assignment.clusters.iter().map(|row| row[n_true - 2]).collect();
        let lines = if cfg.sections.dendogram {
            let div_factor = assignment
                .critval
                .iter()
                .cloned()
                .fold(0.0f64, f64::max)
                .max(1.0);
            Some(cluster::render_dendrogram(&assignment, div_factor))
        } else {
            None
        };
        (raw, lines)
    } else {
        (vec![1usize; data.len()], None)
    };

    let raw_medians = medians_for(&raw_assignments, &data, &loop_ids);

    let geometries: Vec<LoopGeometry> = units
        .iter()
        .zip(loop_ids.iter())
        .map(|(unit, id)| loop_geometry(&structures[unit.structure_idx], unit, id))
        .collect();

    let mut assignments = raw_assignments.clone();
    let (_final_n, postcluster_merges) =
        post_cluster(&mut assignments, &data, &geometries, &cfg.postcluster);

    let medians = medians_for(&assignments, &data, &loop_ids);

    let critical_residues = if cfg.critical_residues {
        Some(run_sdr_analysis(cfg, &units, &loop_ids, &assignments, &structures, accessibility))
    } else {
        None
    };

    let header = ReportHeader {
        method: cfg.method,
        nloops: data.len(),
        postcluster: cfg.postcluster.clone(),
        maxlength: cfg.max_length,
        scheme: cfg.scheme.clone(),
        include_distances: cfg.include_distances,
        include_angles: cfg.include_angles,
        torsion_mode: cfg.torsion_mode,
    };

    Ok(PipelineOutcome {
        header,
        loop_ids,
        data,
        loop_lengths,
        dendogram_lines,
        raw_assignments,
        raw_medians,
        postcluster_merges,
        assignments,
        medians,
        critical_residues,
    })
}

fn run_sdr_analysis(
    cfg: &ClusterConfig,
    units: &[LoopUnit],
    loop_ids: &[String],
    assignments: &[usize],
    structures: &[Structure],
    accessibility: Option<&dyn AccessibilityProvider>,
) -> Vec<ClusterAnalysis> {
    let excluded_ids: std::collections::HashSet<String> =
        cfg.exclude.iter().map(LoopSpec::id).collect();

    let mut accessibility_cache: HashMap<usize, AccessibilityTable> = HashMap::new();

    let n_clus = assignments.iter().copied().max().unwrap_or(0);
    let mut analyses = Vec::new();

    for c in 1..=n_clus {
        let mut loops_for_sdr = Vec::new();
        let mut loop_length = None;
        for (i, unit) in units.iter().enumerate() {
            if assignments[i] != c || excluded_ids.contains(&loop_ids[i]) {
                continue;
            }
            let structure = &structures[unit.structure_idx];
            let table = accessibility.and_then(|provider| {
                accessibility_cache
                    .entry(unit.structure_idx)
                    .or_insert_with(|| {
                        provider
                            .sidecar_for(&unit.spec.file)
                            .unwrap_or_default()
                    });
                accessibility_cache.get(&unit.structure_idx)
            });
            loop_length.get_or_insert(unit.len());
            loops_for_sdr.push(build_loop_data(
                &loop_ids[i],
                structure,
                unit.first_idx,
                unit.last_idx,
                table,
            ));
        }

        let Some(loop_length) = loop_length else {
            warn!(target: "pipeline", cluster = c, "no non-excluded loops left for SDR analysis, skipping cluster");
            continue;
        };

        analyses.push(analyse_cluster(c, loop_length, &loops_for_sdr, &SdrRuleConfig::default()));
    }

    unify_sdrs(&mut analyses);
    analyses
}
