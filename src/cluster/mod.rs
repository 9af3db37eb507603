//! Hierarchical agglomerative clustering: the Lance-Williams engine, the
//! cluster assigner/dendrogram, and the representative ("median") finder
//! (`spec.md` §4.2–§4.4).
//!
//! Grounded in `original_source/clan.c`'s `HierClus`/`ClusterAssign`/
//! `ClusterDendogram`/`FindMedian`, themselves a C port of F. Murtagh's
//! STATLIB Fortran hierarchical clustering routines.

pub mod assign;
pub mod engine;
pub mod median;

pub use assign::{assign_clusters, render_dendrogram, ClusterAssignment};
pub use engine::{agglomerate, find_num_true_clusters, Dendrogram};
pub use median::find_median;
