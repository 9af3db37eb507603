//! # acaca
//!
//! Clusters protein loop conformations by geometry and derives the
//! Structurally Determining Residues (SDRs) for each cluster.
//!
//! ## Pipeline
//!
//! ```text
//! Structure files + control file
//!     ↓
//! [control]            → ClusterConfig (method, loop list, scheme, modes)
//!     ↓
//! [structure_io]        → Structure per PDB-like file
//!     ↓
//! [features]            → one feature vector per loop (canonical length scheme)
//!     ↓
//! [cluster]             → dissimilarity matrix + hierarchical clustering + dendrogram
//!     ↓
//! [refine]              → geometric post-cluster merge (superpose, §4.5)
//!     ↓
//! [sdr]                 → per-cluster and unified Structurally Determining Residues
//!     ↓
//! [report]              → structured text report
//! ```
//!
//! `classify` consumes a report written by this pipeline plus a new structure
//! and assigns the nearest cluster without reclustering.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acaca::control::ClusterConfig;
//! use acaca::pipeline;
//!
//! let config = ClusterConfig::from_file("loops.clan")?;
//! let report = pipeline::run(&config)?;
//! report.write_to(&mut std::io::stdout())?;
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |---|---|
//! | `residue` | Residue identifiers and the property bitmask table |
//! | `atom` | Atom records and the flat `Structure` model |
//! | `structure_io` | Structure file reading |
//! | `geometry` | Vector geometry: dihedrals, bond angles, distances |
//! | `scheme` | Canonical length scheme for the feature vector |
//! | `features` | Loop → feature vector extraction |
//! | `cluster` | Lance-Williams hierarchical clustering and the dendrogram |
//! | `superpose` | Least-squares superposition and RMSD/deviation measures |
//! | `refine` | Post-clustering geometric merge |
//! | `accessibility` | Solvent accessibility sidecar |
//! | `sdr` | Structurally Determining Residue analysis |
//! | `classify` | Nearest-cluster classifier for unseen loops |
//! | `control` | Control-file grammar parser |
//! | `report` | Structured report reader/writer |
//! | `pipeline` | Driver orchestration |
//! | `config` | Ambient run configuration (logging, limits) |
//! | `error` | Error taxonomy |

pub mod accessibility;
pub mod atom;
pub mod classify;
pub mod cluster;
pub mod config;
pub mod control;
pub mod error;
pub mod features;
pub mod geometry;
pub mod pipeline;
pub mod refine;
pub mod superpose;
pub mod report;
pub mod residue;
pub mod scheme;
pub mod sdr;
pub mod structure_io;

pub use config::RunConfig;
pub use error::AcacaError;
