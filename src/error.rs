//! Error taxonomy for the clustering/SDR pipeline.
//!
//! Each subsystem boundary gets its own closed error enum; [`AcacaError`]
//! aggregates them for callers that cross several subsystems (the pipeline
//! driver and the CLI binaries). Per `spec.md` §7, only *input-format* and
//! *resource* errors are fatal — structural/geometric errors are handled by
//! the caller skipping the affected unit and logging a warning instead of
//! propagating an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while extracting a feature vector for one loop (§4.1).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("loop length {length} exceeds configured maximum {max}")]
    LengthExceeded { length: usize, max: usize },

    #[error("structure truncated: torsion at residue {residue} needs an atom past the end of the chain")]
    TruncatedStructure { residue: String },

    #[error("residue {0} not found in structure")]
    ResidueNotFound(String),

    #[error("required backbone atom {atom} missing from residue {residue}")]
    MissingAtom { atom: &'static str, residue: String },
}

/// Errors raised by the hierarchical clusterer (§4.2).
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("need at least 2 loops to cluster, got {0}")]
    TooFewLoops(usize),

    #[error("requested dendrogram depth {requested} exceeds input size {n_loops}")]
    RequestedDepthExceedsInput { requested: usize, n_loops: usize },

    #[error("allocation failure while building the dissimilarity matrix")]
    Allocation,
}

/// Errors raised by the post-clustering geometric refiner (§4.5).
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("superposition degenerate: {0}")]
    DegenerateSuperposition(String),
}

/// Errors raised by the template/SDR analyser (§4.6).
#[derive(Debug, Error)]
pub enum SdrError {
    #[error("cluster {0} has no registered loops")]
    EmptyCluster(usize),

    #[error("solvent accessibility unavailable for {0}; hydrophobic rule bypassed for this loop")]
    AccessibilityUnavailable(PathBuf),
}

/// Errors raised while parsing a control file (§6.1).
#[derive(Debug, Error)]
pub enum ControlFileError {
    #[error("{path}:{line}: unknown directive {directive:?}")]
    UnknownDirective {
        path: PathBuf,
        line: usize,
        directive: String,
    },

    #[error("{path}:{line}: directive {directive} expected {expected} argument(s), got {got}")]
    ArgCount {
        path: PathBuf,
        line: usize,
        directive: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{path}:{line}: malformed residue specifier {spec:?}")]
    BadResidueSpec {
        path: PathBuf,
        line: usize,
        spec: String,
    },

    #[error("MAXLENGTH ({maxlength}) does not match SCHEME length ({scheme_len})")]
    SchemeLengthMismatch { maxlength: usize, scheme_len: usize },

    #[error("duplicate loop id {0}")]
    DuplicateLoop(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised reading or writing the structured report (§6.2).
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("missing section {0}")]
    MissingSection(&'static str),

    #[error("malformed section {section}: {detail}")]
    Malformed { section: &'static str, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the nearest-cluster classifier (§4.8).
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("cluster dataset is empty, nothing to classify against")]
    EmptyDataset,

    #[error("query vector has dimension {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors raised parsing a structure file (the "structure-file reading"
/// external collaborator, §1).
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("could not read structure file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: no ATOM/HETATM records found")]
    Empty { path: PathBuf },
}

/// Top-level error aggregating every subsystem's fatal-error kind.
#[derive(Debug, Error)]
pub enum AcacaError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Refine(#[from] RefineError),
    #[error(transparent)]
    Sdr(#[from] SdrError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    ControlFile(#[from] ControlFileError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Structure(#[from] StructureError),
}
