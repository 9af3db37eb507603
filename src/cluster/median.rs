//! Representative ("median") finder (`spec.md` §4.4).
//!
//! Grounded in `original_source/clan.c`'s `FindMedian`: per-dimension
//! min/max over the cluster's members defines a synthetic `median[j] =
//! (min[j]+max[j])/2`, and the member closest to it (minimum squared
//! Euclidean distance, first occurrence wins ties) is the representative.

/// Find the representative member of cluster `clus_num` within `clusters`
/// (`clusters[i]` = cluster id of vector `i`). Returns the 0-based index of
/// the representative, or `None` for an empty cluster (the "no
/// representative" sentinel, per `spec.md` §4.4).
pub fn find_median(clusters: &[usize], data: &[Vec<f64>], clus_num: usize) -> Option<usize> {
    let vec_dim = data.first()?.len();
    let mut minval = vec![0.0f64; vec_dim];
    let mut maxval = vec![0.0f64; vec_dim];
    let mut n_memb = 0usize;

    for (i, &c) in clusters.iter().enumerate() {
        if c == clus_num {
            if n_memb == 0 {
                minval.copy_from_slice(&data[i]);
                maxval.copy_from_slice(&data[i]);
            } else {
                for j in 0..vec_dim {
                    if data[i][j] < minval[j] {
                        minval[j] = data[i][j];
                    }
                    if data[i][j] > maxval[j] {
                        maxval[j] = data[i][j];
                    }
                }
            }
            n_memb += 1;
        }
    }

    if n_memb == 0 {
        return None;
    }

    let medval: Vec<f64> = (0..vec_dim).map(|j| (minval[j] + maxval[j]) / 2.0).collect();

    let mut best: Option<usize> = None;
    let mut best_dist = f64::INFINITY;
    for (i, &c) in clusters.iter().enumerate() {
        if c == clus_num {
            let dist: f64 = (0..vec_dim)
                .map(|j| {
                    let d = data[i][j] - medval[j];
                    d * d
                })
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = Some(i);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_member_closest_to_per_dimension_midpoint() {
        let clusters = vec![1, 1, 1, 2];
        let data = vec![
            vec![0.0, 0.0],
            vec![2.0, 2.0],
            vec![1.0, 1.0],
            vec![9.0, 9.0],
        ];
        // midpoint of cluster 1 is (1,1) -- index 2 is an exact hit.
        assert_eq!(find_median(&clusters, &data, 1), Some(2));
    }

    #[test]
    fn ties_broken_by_first_occurrence() {
        let clusters = vec![1, 1];
        let data = vec![vec![0.0], vec![2.0]];
        // midpoint is 1.0, both members equidistant -> first wins.
        assert_eq!(find_median(&clusters, &data, 1), Some(0));
    }

    #[test]
    fn empty_cluster_returns_none() {
        let clusters = vec![1, 1];
        let data = vec![vec![0.0], vec![1.0]];
        assert_eq!(find_median(&clusters, &data, 2), None);
    }
}
