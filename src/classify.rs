//! Nearest-cluster classifier for a previously unseen loop (`spec.md` §4.8).
//!
//! Grounded in `original_source/clan.c`'s `FindBestCluster`/`InBoundingBox`:
//! start from the nearest median, let a neighbouring cluster steal the match
//! when the query falls inside its 10%-expanded bounding box and is closer
//! to one of its members, then confirm a match that falls outside every
//! bounding box by requiring it be nearer than the chosen cluster's own
//! median and by capping how far the box would have to stretch to admit it.

use crate::cluster::find_median;
use crate::error::ClassifyError;

/// Distance reported for a query with no matching cluster (`spec.md` §6.4).
pub const NO_MATCH_DISTANCE: f64 = 9999.000;
/// Bounding-box expansion fraction used for the inclusion test (step 3).
const BBOX_EXPAND: f64 = 0.10;
/// Maximum bounding-box growth tolerated by the confirm step (step 4).
const BBOX_GROWTH_LIMIT: f64 = 0.50;

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyOutcome {
    Matched {
        cluster_id: usize,
        representative: String,
        distance: f64,
        singleton: bool,
    },
    NoMatch,
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Per-dimension `(min, max)` over a cluster's members.
fn bounding_box(data: &[Vec<f64>], clusters: &[usize], cluster_id: usize) -> Vec<(f64, f64)> {
    let vec_dim = data[0].len();
    let mut bbox = vec![(f64::INFINITY, f64::NEG_INFINITY); vec_dim];
    for (i, &c) in clusters.iter().enumerate() {
        if c != cluster_id {
            continue;
        }
        for d in 0..vec_dim {
            let v = data[i][d];
            if v < bbox[d].0 {
                bbox[d].0 = v;
            }
            if v > bbox[d].1 {
                bbox[d].1 = v;
            }
        }
    }
    bbox
}

fn within_expanded_box(query: &[f64], bbox: &[(f64, f64)], fraction: f64) -> bool {
    for (d, &(lo, hi)) in bbox.iter().enumerate() {
        let extent = hi - lo;
        let (elo, ehi) = (lo - fraction * extent, hi + fraction * extent);
        if query[d] < elo || query[d] > ehi {
            return false;
        }
    }
    true
}

/// Maximum per-dimension growth ratio the box would need to admit `query`,
/// or `None` if a zero-extent dimension would need any growth at all.
fn max_box_growth(query: &[f64], bbox: &[(f64, f64)]) -> Option<f64> {
    let mut worst = 0.0f64;
    for (d, &(lo, hi)) in bbox.iter().enumerate() {
        let extent = hi - lo;
        let v = query[d];
        if v >= lo && v <= hi {
            continue;
        }
        if extent <= 0.0 {
            return None;
        }
        let new_extent = (hi.max(v)) - (lo.min(v));
        let growth = new_extent / extent - 1.0;
        if growth > worst {
            worst = growth;
        }
    }
    Some(worst)
}

fn min_distance_to_member(
    data: &[Vec<f64>],
    clusters: &[usize],
    cluster_id: usize,
    query: &[f64],
) -> Option<f64> {
    clusters
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == cluster_id)
        .map(|(i, _)| sq_dist(query, &data[i]).sqrt())
        .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.min(d))))
}

/// Classify `query` against the saved clustering dataset. `loop_ids[i]` is
/// the identifier of loop `i` in `clusters`/`data`.
pub fn classify(
    data: &[Vec<f64>],
    clusters: &[usize],
    loop_ids: &[String],
    query: &[f64],
) -> Result<ClassifyOutcome, ClassifyError> {
    if data.is_empty() {
        return Err(ClassifyError::EmptyDataset);
    }
    let vec_dim = data[0].len();
    if query.len() != vec_dim {
        return Err(ClassifyError::DimensionMismatch {
            expected: vec_dim,
            got: query.len(),
        });
    }

    let cluster_ids: std::collections::BTreeSet<usize> = clusters.iter().copied().collect();
    if cluster_ids.is_empty() {
        return Err(ClassifyError::EmptyDataset);
    }

    // Step 1: nearest cluster by squared distance to its median.
    let mut best: Option<(usize, usize, f64)> = None; // (cluster_id, median_idx, dist_to_median)
    for &c in &cluster_ids {
        let Some(median_idx) = find_median(clusters, data, c) else {
            continue;
        };
        let d = sq_dist(query, &data[median_idx]).sqrt();
        if best.as_ref().map_or(true, |&(_, _, bd)| d < bd) {
            best = Some((c, median_idx, d));
        }
    }
    let Some((mut best_id, mut best_median, _)) = best else {
        return Ok(ClassifyOutcome::NoMatch);
    };

    let mut d0 = min_distance_to_member(data, clusters, best_id, query).unwrap_or(f64::INFINITY);

    // Step 3: let any other cluster steal the match.
    for &c in &cluster_ids {
        if c == best_id {
            continue;
        }
        let bbox = bounding_box(data, clusters, c);
        if !within_expanded_box(query, &bbox, BBOX_EXPAND) {
            continue;
        }
        let Some(d_c) = min_distance_to_member(data, clusters, c, query) else {
            continue;
        };
        if d_c < d0 {
            if let Some(median_idx) = find_median(clusters, data, c) {
                best_id = c;
                best_median = median_idx;
                d0 = d_c;
            }
        }
    }

    // Step 4: confirm.
    let chosen_bbox = bounding_box(data, clusters, best_id);
    let inside = within_expanded_box(query, &chosen_bbox, BBOX_EXPAND);
    if !inside {
        let dist_to_median = sq_dist(query, &data[best_median]).sqrt();
        let closer_than_median = d0 < dist_to_median;
        let growth_ok = max_box_growth(query, &chosen_bbox)
            .map(|g| g <= BBOX_GROWTH_LIMIT)
            .unwrap_or(false);
        if !(closer_than_median && growth_ok) {
            return Ok(ClassifyOutcome::NoMatch);
        }
    }

    let size = clusters.iter().filter(|&&c| c == best_id).count();
    let distance = sq_dist(query, &data[best_median]).sqrt();
    Ok(ClassifyOutcome::Matched {
        cluster_id: best_id,
        representative: loop_ids[best_median].clone(),
        distance,
        singleton: size == 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<usize>, Vec<String>) {
        let data = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
        ];
        let clusters = vec![1, 1, 1, 2];
        let ids = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        (data, clusters, ids)
    }

    #[test]
    fn query_near_cluster_one_matches_cluster_one() {
        let (data, clusters, ids) = dataset();
        let outcome = classify(&data, &clusters, &ids, &[0.2, 0.2]).unwrap();
        match outcome {
            ClassifyOutcome::Matched { cluster_id, .. } => assert_eq!(cluster_id, 1),
            ClassifyOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn singleton_cluster_is_flagged() {
        let (data, clusters, ids) = dataset();
        let outcome = classify(&data, &clusters, &ids, &[10.1, 10.1]).unwrap();
        match outcome {
            ClassifyOutcome::Matched { singleton, cluster_id, .. } => {
                assert!(singleton);
                assert_eq!(cluster_id, 2);
            }
            ClassifyOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn s6_far_outside_every_box_is_no_match() {
        let (data, clusters, ids) = dataset();
        // Far from both clusters and from every bounding box: confirm step
        // should fail the 50%-growth cap.
        let outcome = classify(&data, &clusters, &ids, &[1000.0, 1000.0]).unwrap();
        assert_eq!(outcome, ClassifyOutcome::NoMatch);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (data, clusters, ids) = dataset();
        let err = classify(&data, &clusters, &ids, &[0.0]).unwrap_err();
        assert!(matches!(err, ClassifyError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = classify(&[], &[], &[], &[0.0]).unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyDataset));
    }
}
