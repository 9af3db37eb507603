//! Least-squares superposition and the RMSD / max-deviation measures the
//! post-clustering refiner needs (`spec.md` §4.7).
//!
//! Grounded in `original_source/clan.c`'s `RmsCAPDB`/`MaxCADeviationPDB`/
//! `MaxCBDeviationPDB`: fit on Cα pairs only (`FitCaPDB`), then walk the two
//! residue streams in lockstep measuring Cα-Cα and, where both sides have a
//! Cβ (skipping Gly), Cβ-Cβ distance after the fit. The rotation itself is
//! the standard Kabsch/Horn least-squares procedure, here via the
//! quaternion formulation (closed-form, no external linear-algebra crate):
//! build the 4x4 key matrix from the cross-covariance, take its eigenvector
//! of largest eigenvalue by Jacobi iteration, and read the rotation matrix
//! off that eigenvector.

use crate::error::RefineError;

/// One residue's superposable atoms: Cα is mandatory, Cβ absent for Gly.
#[derive(Debug, Clone, Copy)]
pub struct ResidueFrame {
    pub ca: [f64; 3],
    pub cb: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperposeResult {
    pub rms: f64,
    pub max_ca_dev: f64,
    pub max_cb_dev: f64,
}

fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    let n = points.len() as f64;
    let mut c = [0.0; 3];
    for p in points {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    [c[0] / n, c[1] / n, c[2] / n]
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn apply(rot: &[[f64; 3]; 3], p: [f64; 3]) -> [f64; 3] {
    [
        rot[0][0] * p[0] + rot[0][1] * p[1] + rot[0][2] * p[2],
        rot[1][0] * p[0] + rot[1][1] * p[1] + rot[1][2] * p[2],
        rot[2][0] * p[0] + rot[2][1] * p[1] + rot[2][2] * p[2],
    ]
}

fn distsq(a: [f64; 3], b: [f64; 3]) -> f64 {
    let d = sub(a, b);
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

/// Diagonalise a symmetric 4x4 matrix by cyclic Jacobi rotation, returning
/// the eigenvector of the largest eigenvalue.
fn largest_eigenvector_4x4(mut a: [[f64; 4]; 4]) -> [f64; 4] {
    let mut v = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..4 {
            for q in (p + 1)..4 {
                off += a[p][q] * a[p][q];
            }
        }
        if off < 1e-24 {
            break;
        }

        for p in 0..4 {
            for q in (p + 1)..4 {
                if a[p][q].abs() < 1e-18 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (1.0 + theta * theta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                for k in 0..4 {
                    let akp = a[k][p];
                    let akq = a[k][q];
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..4 {
                    let apk = a[p][k];
                    let aqk = a[q][k];
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for k in 0..4 {
                    let vkp = v[k][p];
                    let vkq = v[k][q];
                    v[k][p] = c * vkp - s * vkq;
                    v[k][q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut best = 0usize;
    for i in 1..4 {
        if a[i][i] > a[best][best] {
            best = i;
        }
    }
    [v[0][best], v[1][best], v[2][best], v[3][best]]
}

/// Compute the least-squares rotation matrix taking `mobile` onto `reference`
/// (both already centred on their own centroids), via Horn's quaternion
/// method.
fn kabsch_rotation(
    reference: &[[f64; 3]],
    mobile: &[[f64; 3]],
) -> Result<[[f64; 3]; 3], RefineError> {
    let mut r = [[0.0f64; 3]; 3];
    let mut total_var = 0.0;
    for (m, f) in mobile.iter().zip(reference.iter()) {
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] += m[i] * f[j];
            }
        }
        total_var += m[0] * m[0] + m[1] * m[1] + m[2] * m[2];
        total_var += f[0] * f[0] + f[1] * f[1] + f[2] * f[2];
    }

    if total_var < 1e-12 {
        return Err(RefineError::DegenerateSuperposition(
            "all fitted points coincide with their centroid".to_string(),
        ));
    }

    // Horn's 4x4 key matrix built from the cross-covariance R.
    let (xx, xy, xz) = (r[0][0], r[0][1], r[0][2]);
    let (yx, yy, yz) = (r[1][0], r[1][1], r[1][2]);
    let (zx, zy, zz) = (r[2][0], r[2][1], r[2][2]);

    let k = [
        [xx + yy + zz, yz - zy, zx - xz, xy - yx],
        [yz - zy, xx - yy - zz, xy + yx, zx + xz],
        [zx - xz, xy + yx, -xx + yy - zz, yz + zy],
        [xy - yx, zx + xz, yz + zy, -xx - yy + zz],
    ];

    let q = largest_eigenvector_4x4(k);
    let (w, x, y, z) = (q[0], q[1], q[2], q[3]);
    let norm = (w * w + x * x + y * y + z * z).sqrt();
    let (w, x, y, z) = (w / norm, x / norm, y / norm, z / norm);

    Ok([
        [
            w * w + x * x - y * y - z * z,
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
        ],
        [
            2.0 * (x * y + w * z),
            w * w - x * x + y * y - z * z,
            2.0 * (y * z - w * x),
        ],
        [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            w * w - x * x - y * y + z * z,
        ],
    ])
}

/// Fit `mobile` onto `reference` using Cα pairs and report the RMS over the
/// fitted Cα positions plus the max per-residue Cα and Cβ deviations.
/// Both streams must have the same residue count. A zero-length stream, or
/// one where every Cα coincides with the centroid, is a degenerate fit.
pub fn fit_and_measure(
    reference: &[ResidueFrame],
    mobile: &[ResidueFrame],
) -> Result<SuperposeResult, RefineError> {
    if reference.is_empty() || reference.len() != mobile.len() {
        return Err(RefineError::DegenerateSuperposition(
            "residue streams are empty or of unequal length".to_string(),
        ));
    }

    let ref_ca: Vec<[f64; 3]> = reference.iter().map(|r| r.ca).collect();
    let mob_ca: Vec<[f64; 3]> = mobile.iter().map(|r| r.ca).collect();
    let ref_centroid = centroid(&ref_ca);
    let mob_centroid = centroid(&mob_ca);

    let ref_centered: Vec<[f64; 3]> = ref_ca.iter().map(|&p| sub(p, ref_centroid)).collect();
    let mob_centered: Vec<[f64; 3]> = mob_ca.iter().map(|&p| sub(p, mob_centroid)).collect();

    let rot = kabsch_rotation(&ref_centered, &mob_centered)?;

    let mut sum_sq = 0.0;
    let mut max_ca_dev: f64 = 0.0;
    let mut max_cb_dev: f64 = 0.0;

    for i in 0..reference.len() {
        let fitted_ca = add(apply(&rot, sub(mobile[i].ca, mob_centroid)), ref_centroid);
        let d = distsq(fitted_ca, reference[i].ca);
        sum_sq += d;
        if d > max_ca_dev {
            max_ca_dev = d;
        }

        if let (Some(rcb), Some(mcb)) = (reference[i].cb, mobile[i].cb) {
            let fitted_cb = add(apply(&rot, sub(mcb, mob_centroid)), ref_centroid);
            let dcb = distsq(fitted_cb, rcb);
            if dcb > max_cb_dev {
                max_cb_dev = dcb;
            }
        }
    }

    Ok(SuperposeResult {
        rms: (sum_sq / reference.len() as f64).sqrt(),
        max_ca_dev: max_ca_dev.sqrt(),
        max_cb_dev: max_cb_dev.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ca: [f64; 3], cb: Option<[f64; 3]>) -> ResidueFrame {
        ResidueFrame { ca, cb }
    }

    #[test]
    fn identical_loops_fit_with_zero_rms() {
        let a = vec![
            frame([0.0, 0.0, 0.0], Some([1.0, 0.0, 0.0])),
            frame([1.0, 0.0, 0.0], Some([1.0, 1.0, 0.0])),
            frame([2.0, 1.0, 0.0], None),
        ];
        let result = fit_and_measure(&a, &a).unwrap();
        assert!(result.rms < 1e-9);
        assert!(result.max_ca_dev < 1e-9);
        assert!(result.max_cb_dev < 1e-9);
    }

    #[test]
    fn rotated_copy_fits_with_zero_rms() {
        let reference = vec![
            frame([0.0, 0.0, 0.0], None),
            frame([1.0, 0.0, 0.0], None),
            frame([2.0, 1.0, 0.0], None),
            frame([3.0, 2.0, 1.0], None),
        ];
        // 90 degree rotation about z, plus a translation.
        let rotated: Vec<ResidueFrame> = reference
            .iter()
            .map(|r| {
                let [x, y, z] = r.ca;
                frame([-y + 5.0, x + 5.0, z + 5.0], None)
            })
            .collect();
        let result = fit_and_measure(&reference, &rotated).unwrap();
        assert!(result.rms < 1e-6, "rms was {}", result.rms);
    }

    #[test]
    fn degenerate_when_all_points_coincide() {
        let a = vec![frame([0.0, 0.0, 0.0], None); 3];
        assert!(fit_and_measure(&a, &a).is_err());
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let a = vec![frame([0.0, 0.0, 0.0], None)];
        let b = vec![
            frame([0.0, 0.0, 0.0], None),
            frame([1.0, 0.0, 0.0], None),
        ];
        assert!(fit_and_measure(&a, &b).is_err());
    }
}
