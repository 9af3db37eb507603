//! Loop feature extractor (`spec.md` §4.1).
//!
//! Turns a named loop within a [`Structure`] into a fixed-length feature
//! vector, using the canonical [`Scheme`] to place variable-length loops
//! into shared coordinates. Grounded in `original_source/acaca.c`'s
//! `ConvertData`/`GetTorsions`-style computation: per-residue raw values are
//! computed for the whole loop first, then copied into the filled slots.

use crate::atom::Structure;
use crate::error::ExtractError;
use crate::geometry::{angle, dihedral, distance};
use crate::residue::ResidueId;
use crate::scheme::Scheme;
use std::f64::consts::PI;

/// Sentinel value for an unfilled torsion/angle slot.
pub const DUMMY: f64 = 10.0;
/// Sentinel value for an unfilled distance slot.
pub const DUMMY2: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorsionMode {
    Pseudo,
    True,
}

/// Mode flags controlling feature extraction, shared by every loop in a run
/// (set once from the control file, §6.1).
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub torsion_mode: TorsionMode,
    pub include_angles: bool,
    pub include_distances: bool,
    pub scheme: Scheme,
}

impl FeatureConfig {
    /// Per-slot feature count `F`, per `spec.md` §3.
    pub fn per_slot(&self) -> usize {
        let base = match self.torsion_mode {
            TorsionMode::Pseudo => 2,
            TorsionMode::True => 6,
        };
        base + usize::from(self.include_angles) + usize::from(self.include_distances)
    }

    /// Total feature-vector dimension `VD = L_max * F`.
    pub fn vector_dim(&self) -> usize {
        self.scheme.max_length() * self.per_slot()
    }

    fn angle_offset(&self) -> usize {
        match self.torsion_mode {
            TorsionMode::Pseudo => 2,
            TorsionMode::True => 6,
        }
    }

    fn dist_offset(&self) -> usize {
        self.angle_offset() + usize::from(self.include_angles)
    }
}

/// Per-residue raw geometric values computed over the whole loop, before
/// slotting into the final vector.
struct RawLoopValues {
    /// `torsions[i]` has 1 entry (pseudo) or 3 entries `[phi, psi, omega]`
    /// (true) for loop residue `i`.
    torsions: Vec<Vec<f64>>,
    angles: Vec<f64>,
    dists: Vec<f64>,
}

/// Extract the fixed-length feature vector for the loop
/// `[first_resid, last_resid]` in `structure`.
pub fn extract(
    structure: &Structure,
    first_resid: ResidueId,
    last_resid: ResidueId,
    cfg: &FeatureConfig,
) -> Result<Vec<f64>, ExtractError> {
    let first_idx = structure
        .find_residue(first_resid)
        .ok_or_else(|| ExtractError::ResidueNotFound(first_resid.to_string()))?;
    let last_idx = structure
        .find_residue(last_resid)
        .ok_or_else(|| ExtractError::ResidueNotFound(last_resid.to_string()))?;

    if last_idx < first_idx {
        return Err(ExtractError::ResidueNotFound(format!(
            "{first_resid}..{last_resid}"
        )));
    }
    let len = last_idx - first_idx + 1;
    if len > cfg.scheme.max_length() {
        return Err(ExtractError::LengthExceeded {
            length: len,
            max: cfg.scheme.max_length(),
        });
    }

    let raw = compute_raw_values(structure, first_idx, last_idx, cfg)?;

    let mut vector = vec![DUMMY; cfg.vector_dim()];
    let per_slot = cfg.per_slot();
    if cfg.include_distances {
        for slot in 0..cfg.scheme.max_length() {
            vector[slot * per_slot + cfg.dist_offset()] = DUMMY2;
        }
    }

    for (slot, pos) in cfg.scheme.filled_slots(len) {
        let base = slot * per_slot;
        match cfg.torsion_mode {
            TorsionMode::Pseudo => {
                let t = raw.torsions[pos][0];
                vector[base] = t.sin();
                vector[base + 1] = t.cos();
            }
            TorsionMode::True => {
                for (k, t) in raw.torsions[pos].iter().enumerate() {
                    vector[base + 2 * k] = t.sin();
                    vector[base + 2 * k + 1] = t.cos();
                }
            }
        }
        if cfg.include_angles {
            vector[base + cfg.angle_offset()] = 2.0 * raw.angles[pos] / PI - 1.0;
        }
        if cfg.include_distances {
            vector[base + cfg.dist_offset()] = raw.dists[pos];
        }
    }

    Ok(vector)
}

fn ca_xyz(structure: &Structure, residue_idx: usize) -> Option<[f64; 3]> {
    structure
        .ca(structure.residue_atoms(residue_idx))
        .map(|a| a.xyz)
}

fn atom_xyz(structure: &Structure, residue_idx: usize, name: &str) -> Option<[f64; 3]> {
    structure
        .find_atom(structure.residue_atoms(residue_idx), name)
        .map(|a| a.xyz)
}

fn compute_raw_values(
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
    cfg: &FeatureConfig,
) -> Result<RawLoopValues, ExtractError> {
    let len = last_idx - first_idx + 1;
    let mut torsions = Vec::with_capacity(len);
    let mut angles = Vec::with_capacity(len);
    let mut dists = Vec::with_capacity(len);

    let first_ca = ca_xyz(structure, first_idx).ok_or_else(|| ExtractError::MissingAtom {
        atom: "CA",
        residue: format!("residue index {first_idx}"),
    })?;

    for idx in first_idx..=last_idx {
        match cfg.torsion_mode {
            TorsionMode::Pseudo => {
                // Needs CA of idx-1, idx, idx+1, idx+2.
                if idx == 0 || idx + 2 >= structure.residue_count() {
                    return Err(ExtractError::TruncatedStructure {
                        residue: structure
                            .residue_atoms(idx)
                            .first()
                            .map(|a| a.resid.to_string())
                            .unwrap_or_default(),
                    });
                }
                let p = [
                    ca_xyz(structure, idx - 1),
                    ca_xyz(structure, idx),
                    ca_xyz(structure, idx + 1),
                    ca_xyz(structure, idx + 2),
                ];
                let p: Vec<[f64; 3]> = p
                    .into_iter()
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| ExtractError::MissingAtom {
                        atom: "CA",
                        residue: structure.residue_atoms(idx)[0].resid.to_string(),
                    })?;
                let t = dihedral(p[0], p[1], p[2], p[3]);
                torsions.push(vec![t]);

                if cfg.include_angles {
                    // Ca-Ca-Ca angle at idx using idx-1, idx, idx+1.
                    angles.push(angle(p[0], p[1], p[2]));
                }
            }
            TorsionMode::True => {
                // Needs preceding C (idx-1) and following N, CA (idx+1).
                if idx == 0 || idx + 1 >= structure.residue_count() {
                    return Err(ExtractError::TruncatedStructure {
                        residue: structure.residue_atoms(idx)[0].resid.to_string(),
                    });
                }
                let c_prev = atom_xyz(structure, idx - 1, "C");
                let n_i = atom_xyz(structure, idx, "N");
                let ca_i = atom_xyz(structure, idx, "CA");
                let c_i = atom_xyz(structure, idx, "C");
                let n_next = atom_xyz(structure, idx + 1, "N");
                let ca_next = atom_xyz(structure, idx + 1, "CA");

                let (c_prev, n_i, ca_i, c_i, n_next, ca_next) =
                    match (c_prev, n_i, ca_i, c_i, n_next, ca_next) {
                        (
                            Some(cp),
                            Some(n),
                            Some(ca),
                            Some(c),
                            Some(nn),
                            Some(can),
                        ) => (cp, n, ca, c, nn, can),
                        _ => {
                            return Err(ExtractError::MissingAtom {
                                atom: "N/CA/C",
                                residue: structure.residue_atoms(idx)[0].resid.to_string(),
                            })
                        }
                    };

                let phi = dihedral(c_prev, n_i, ca_i, c_i);
                let psi = dihedral(n_i, ca_i, c_i, n_next);
                let omega = dihedral(ca_i, c_i, n_next, ca_next);
                torsions.push(vec![phi, psi, omega]);

                if cfg.include_angles {
                    angles.push(angle(n_i, ca_i, c_i));
                }
            }
        }

        if cfg.include_distances {
            let ca = ca_xyz(structure, idx).ok_or_else(|| ExtractError::MissingAtom {
                atom: "CA",
                residue: structure.residue_atoms(idx)[0].resid.to_string(),
            })?;
            dists.push(distance(first_ca, ca));
        }
    }

    Ok(RawLoopValues {
        torsions,
        angles,
        dists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{pack_atom_name, pack_resname, Atom};
    use crate::scheme::Scheme;

    fn atom(chain: char, seq: i32, name: &str, resname: &str, xyz: [f64; 3]) -> Atom {
        Atom {
            resid: ResidueId::new(chain, seq, ' '),
            atom_name: pack_atom_name(name),
            resname: pack_resname(resname),
            xyz,
            occupancy: 1.0,
            bfactor: 0.0,
        }
    }

    /// A short, slightly twisted backbone-only helix fragment of 6 residues
    /// (enough to extract a 1-residue true-torsion loop in the middle).
    fn helix_fragment() -> Structure {
        let mut atoms = Vec::new();
        for i in 0..6 {
            let x = i as f64 * 1.5;
            atoms.push(atom('A', i + 1, "N", "ALA", [x, 0.0, 0.0]));
            atoms.push(atom('A', i + 1, "CA", "ALA", [x + 0.5, 0.3, 0.0]));
            atoms.push(atom('A', i + 1, "C", "ALA", [x + 1.0, 0.0, 0.0]));
            atoms.push(atom('A', i + 1, "O", "ALA", [x + 1.0, -0.5, 0.0]));
        }
        Structure::from_atoms(atoms)
    }

    #[test]
    fn length_one_loop_true_torsions_has_exact_non_sentinel_count() {
        let s = helix_fragment();
        let cfg = FeatureConfig {
            torsion_mode: TorsionMode::True,
            include_angles: false,
            include_distances: false,
            scheme: Scheme::default_for(3),
        };
        // Loop = residue 3 only (needs residue 2 preceding, residue 4 following).
        let first = ResidueId::new('A', 3, ' ');
        let last = ResidueId::new('A', 3, ' ');
        let v = extract(&s, first, last, &cfg).unwrap();
        let non_sentinel = v.iter().filter(|&&x| x != DUMMY).count();
        // length 1 * F(6) = 6 non-sentinel entries.
        assert_eq!(non_sentinel, 6);
    }

    #[test]
    fn loop_at_very_start_of_chain_fails_truncated() {
        let s = helix_fragment();
        let cfg = FeatureConfig {
            torsion_mode: TorsionMode::True,
            include_angles: false,
            include_distances: false,
            scheme: Scheme::default_for(3),
        };
        let first = ResidueId::new('A', 1, ' ');
        let last = ResidueId::new('A', 1, ' ');
        let err = extract(&s, first, last, &cfg).unwrap_err();
        assert!(matches!(err, ExtractError::TruncatedStructure { .. }));
    }

    #[test]
    fn length_exceeded_when_loop_longer_than_scheme() {
        let s = helix_fragment();
        let cfg = FeatureConfig {
            torsion_mode: TorsionMode::True,
            include_angles: false,
            include_distances: false,
            scheme: Scheme::default_for(2),
        };
        let first = ResidueId::new('A', 2, ' ');
        let last = ResidueId::new('A', 5, ' ');
        let err = extract(&s, first, last, &cfg).unwrap_err();
        assert!(matches!(err, ExtractError::LengthExceeded { .. }));
    }

    #[test]
    fn distance_feature_first_entry_is_zero() {
        let s = helix_fragment();
        let cfg = FeatureConfig {
            torsion_mode: TorsionMode::True,
            include_angles: false,
            include_distances: true,
            scheme: Scheme::default_for(2),
        };
        let first = ResidueId::new('A', 2, ' ');
        let last = ResidueId::new('A', 3, ' ');
        let v = extract(&s, first, last, &cfg).unwrap();
        let per_slot = cfg.per_slot();
        let dist_offset = cfg.dist_offset();
        // slot 0 holds loop position 0 (the first residue): distance 0.
        assert!((v[dist_offset] - 0.0).abs() < 1e-9);
        let _ = per_slot;
    }
}
