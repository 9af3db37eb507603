//! Cluster assignment across levels and ASCII dendrogram layout
//! (`spec.md` §4.3).
//!
//! Grounded in `original_source/clan.c`'s `ClusterAssign`/`ClusterDendogram`,
//! themselves a C port of F. Murtagh's STATLIB Fortran routines. The
//! algorithm is reproduced with 1-based padded arrays (index 0 unused) to
//! keep the translation from the original as literal as possible; the
//! public API converts back to 0-based Rust conventions at the boundary.

use super::engine::Dendrogram;
use crate::error::ClusterError;

/// Per-level cluster ids for every vector, plus the data needed to lay out
/// a dendrogram of the top `lev` levels.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    /// `clusters[vec][k]` = 1-based cluster id of vector `vec` (0-based) at
    /// the partition into `k+2` clusters, for `k` in `0..lev-1`.
    pub clusters: Vec<Vec<usize>>,
    /// Left-to-right ordering of the `lev` leaf clusters along the
    /// dendrogram baseline (1-based cluster ids, `iorder.len() == lev`).
    pub iorder: Vec<usize>,
    /// Real-valued merge heights, parallel to `iorder`.
    pub critval: Vec<f64>,
    /// Ordinal merge heights (1..=lev), parallel to `iorder`.
    pub height: Vec<usize>,
    pub lev: usize,
}

/// Derive the cluster assignment for the top `lev` levels of `dend`.
pub fn assign_clusters(dend: &Dendrogram, lev: usize) -> Result<ClusterAssignment, ClusterError> {
    let n = dend.n_vec;
    if lev > n {
        return Err(ClusterError::RequestedDepthExceedsInput {
            requested: lev,
            n_loops: n,
        });
    }
    if lev < 2 {
        return Ok(ClusterAssignment {
            clusters: vec![vec![1]; n],
            iorder: vec![1],
            critval: vec![0.0],
            height: vec![1],
            lev: 1,
        });
    }

    // 1-based shims over the 0-based merge history: step t (1..=n-1)
    // corresponds to dend.{ia,ib,crit}[t-1].
    let ia = |t: usize| dend.ia[t - 1] + 1;
    let ib = |t: usize| dend.ib[t - 1] + 1;
    let crit = |t: usize| dend.crit[t - 1];

    // hvals[1..] collects the distinct object numbers introduced by the top
    // `lev` merges, starting from the final (whole-dataset) merge.
    let mut hvals = vec![0usize; lev + 2];
    hvals[1] = 1;
    hvals[2] = ib(n - 1);
    let mut loc = 3usize;
    let mut step = n as isize - 2;
    while step >= (n as isize - lev as isize) && step > 0 {
        let t = step as usize;
        if !(1..loc).any(|j| ia(t) == hvals[j]) {
            hvals[loc] = ia(t);
            loc += 1;
        }
        if !(1..loc).any(|j| ib(t) == hvals[j]) {
            hvals[loc] = ib(t);
            loc += 1;
        }
        step -= 1;
    }

    // clusters[obj][ncl] (1-based both axes) = object id of the cluster
    // representative (lowest member index) at the partition with `ncl`
    // clusters, for ncl in 2..=lev.
    let mut clusters = vec![vec![0usize; lev]; n + 1];
    for level in (n - lev)..=(n - 2) {
        for obj in 1..=n {
            let mut icl = obj;
            for ilev in 1..=level {
                if ib(ilev) == icl {
                    icl = ia(ilev);
                }
            }
            let n_clusters = n - level;
            clusters[obj][n_clusters - 1] = icl;
        }
    }

    // Remap representative object-ids to compact cluster numbers 1..=lev
    // (via hvals) within every partition except the coarsest (lev clusters,
    // handled separately below via iorder/hvals directly).
    for obj in 1..=n {
        for j in 1..=(lev - 1) {
            for k in 2..=lev {
                if clusters[obj][j] == hvals[k] {
                    clusters[obj][j] = k;
                    break;
                }
            }
        }
    }

    // Determine iorder/critval/height describing the dendrogram baseline.
    let mut iorder = vec![0usize; lev + 1];
    let mut critval = vec![0.0f64; lev + 1];
    let mut height = vec![0usize; lev + 1];
    iorder[1] = ia(n - 1);
    iorder[2] = ib(n - 1);
    critval[1] = 0.0;
    critval[2] = crit(n - 1);
    height[1] = lev;
    height[2] = lev - 1;
    let mut loc2 = 2usize;
    let mut step2 = n as isize - 2;
    while step2 >= (n as isize - lev as isize + 1) {
        let t = step2 as usize;
        for j in 1..=loc2 {
            if ia(t) == iorder[j] {
                for k in (j + 1..=loc2 + 1).rev() {
                    iorder[k] = iorder[k - 1];
                    critval[k] = critval[k - 1];
                    height[k] = height[k - 1];
                }
                iorder[j + 1] = ib(t);
                critval[j + 1] = crit(t);
                height[j + 1] = t - (n - lev);
                loc2 += 1;
            }
        }
        step2 -= 1;
    }

    for i in 1..=lev {
        for j in 1..=lev {
            if hvals[i] == iorder[j] {
                iorder[j] = i;
                break;
            }
        }
    }

    iorder[1] = 1;
    iorder[2] = 2;
    for j in 2..=(lev - 1) {
        for obj in 1..=n {
            if clusters[obj][j] == j + 1 {
                let parent = clusters[obj][j - 1];
                insert_iorder(&mut iorder, lev, j + 1, parent);
                break;
            }
        }
    }

    // Convert to 0-based output.
    let mut out_clusters = vec![vec![0usize; lev - 1]; n];
    for obj in 1..=n {
        for j in 1..=(lev - 1) {
            out_clusters[obj - 1][j - 1] = clusters[obj][j];
        }
    }
    let out_iorder = iorder[1..=lev].to_vec();
    let out_critval = critval[1..=lev].to_vec();
    let out_height = height[1..=lev].to_vec();

    Ok(ClusterAssignment {
        clusters: out_clusters,
        iorder: out_iorder,
        critval: out_critval,
        height: out_height,
        lev,
    })
}

/// Insert `cluster` immediately to the right of `parent` in `iorder`
/// (1-based, length `lev`), shifting later entries right by one.
fn insert_iorder(iorder: &mut [usize], lev: usize, cluster: usize, parent: usize) -> bool {
    for i in 0..lev {
        if iorder[1 + i] == parent {
            if i == lev - 1 {
                return false;
            }
            for j in (i + 2..lev).rev() {
                iorder[1 + j] = iorder[1 + j - 1];
            }
            iorder[1 + i + 1] = cluster;
            return true;
        }
    }
    false
}

/// Render the ASCII dendrogram of the top `assignment.lev` levels: a
/// `3*lev x 3*lev` grid of `|`, `-`, and blank glyphs, per
/// `original_source/clan.c`'s `ClusterDendogram`.
pub fn render_dendrogram(assignment: &ClusterAssignment, div_factor: f64) -> Vec<String> {
    let lev = assignment.lev as isize;
    let size = (lev * 3) as usize;
    let mut grid = vec![vec![b' '; size]; size];
    let height: Vec<isize> = assignment.height.iter().map(|&h| h as isize).collect();

    let mut i = 3isize;
    while i <= lev * 3 {
        let i2 = i / 3;
        let j2 = (lev * 3 + 1) - 3 * height[(i2 - 1) as usize];

        let mut j = lev * 3;
        while j >= j2 {
            grid[(j - 1) as usize][(i - 1) as usize] = b'|';
            j -= 1;
        }

        let mut k = i;
        while k >= 3 {
            let i3 = (k + 2) / 3;
            if (lev * 3 + 1) - height[(i3 - 1) as usize] * 3 < j2 {
                break;
            }
            grid[(j2 - 1) as usize][(k - 1) as usize] = b'-';
            k -= 1;
        }
        i += 3;
    }

    let mut lines = Vec::with_capacity(size + 3);
    for row in &grid {
        lines.push(String::from_utf8_lossy(row).into_owned());
    }
    let baseline: String = assignment
        .iorder
        .iter()
        .map(|c| format!("{:3}", c))
        .collect();
    lines.push(baseline);
    let scaled: Vec<String> = assignment
        .critval
        .iter()
        .map(|v| format!("{:.2}", v / div_factor))
        .collect();
    lines.push(scaled.join(" "));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::engine::agglomerate;
    use crate::control::Method;

    #[test]
    fn two_level_assignment_for_four_points() {
        let data = vec![
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0],
        ];
        let dend = agglomerate(&data, Method::Ward).unwrap();
        let assignment = assign_clusters(&dend, 2).unwrap();
        assert_eq!(assignment.clusters.len(), 4);
        // D (index 3) must differ from A, B, C at the 2-cluster level.
        let ids: Vec<usize> = assignment.clusters.iter().map(|c| c[0]).collect();
        assert_ne!(ids[3], ids[0]);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[1], ids[2]);
    }

    #[test]
    fn depth_exceeding_input_is_rejected() {
        let data = vec![vec![0.0], vec![1.0], vec![2.0]];
        let dend = agglomerate(&data, Method::Ward).unwrap();
        assert!(matches!(
            assign_clusters(&dend, 10),
            Err(ClusterError::RequestedDepthExceedsInput { .. })
        ));
    }

    #[test]
    fn dendrogram_render_has_expected_line_count() {
        let data = vec![
            vec![0.0],
            vec![1.0],
            vec![2.0],
            vec![10.0],
            vec![11.0],
        ];
        let dend = agglomerate(&data, Method::Ward).unwrap();
        let assignment = assign_clusters(&dend, 3).unwrap();
        let lines = render_dendrogram(&assignment, 1.0);
        // 3*lev grid rows + baseline + criterion line.
        assert_eq!(lines.len(), 3 * 3 + 2);
    }
}
