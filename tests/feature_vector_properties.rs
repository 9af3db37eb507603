//! Property-based check of `spec.md` §8 invariant 5: a feature vector for a
//! loop of length `l` has exactly `l * F` non-sentinel entries, for any
//! length between 1 and the scheme's `L_max`.

use acaca::features::{extract, FeatureConfig, TorsionMode, DUMMY, DUMMY2};
use acaca::residue::ResidueId;
use acaca::scheme::Scheme;
use acaca::structure_io::read_structure;
use proptest::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn helix_point(j: i32) -> [f64; 3] {
    let r = 1.6;
    let h = 1.5;
    let twist = 0.41;
    let theta = j as f64 * twist;
    [r * theta.cos(), r * theta.sin(), j as f64 * h]
}

fn atom_line(serial: usize, name: &str, chain: char, seq: i32, xyz: [f64; 3]) -> String {
    format!(
        "{:<6}{:>5} {:<4}{:<1}{:<3} {:<1}{:>4}{:<1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}",
        "ATOM", serial, name, "", "ALA", chain, seq, "", xyz[0], xyz[1], xyz[2], 1.0, 20.0
    )
}

/// A chain of `n_res` residues (1-based seqnums `1..=n_res`) with full N/CA/C
/// backbone atoms placed on one continuous helix, so every residue has valid
/// neighbours for both torsion modes.
fn write_chain(n_res: i32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let mut serial = 1;
    for residue in 0..n_res {
        let base = residue * 3;
        for (offset, name) in [(0, "N"), (1, "CA"), (2, "C")] {
            let xyz = helix_point(base + offset);
            writeln!(file, "{}", atom_line(serial, name, 'A', residue + 1, xyz)).unwrap();
            serial += 1;
        }
    }
    file.flush().unwrap();
    file
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For every loop length `len` (1..=8) and every scheme `max_len`
    /// (len..=10), the extracted vector has exactly `len * F` slots that
    /// differ from the dummy sentinels, under both torsion modes and with
    /// angle/distance features optionally switched on.
    #[test]
    fn vector_has_exactly_len_times_f_filled_entries(
        len in 1usize..=8,
        extra_max in 0usize..=2,
        true_torsions in any::<bool>(),
        include_angles in any::<bool>(),
        include_distances in any::<bool>(),
    ) {
        let max_len = len + extra_max;
        // One flanking residue on each side so both torsion modes (which need
        // idx-1 and idx+1, or idx-1..=idx+2 for pseudo-torsions) stay in bounds.
        let n_res = (len + 3) as i32;
        let file = write_chain(n_res);
        let structure = read_structure(file.path()).unwrap();

        let cfg = FeatureConfig {
            torsion_mode: if true_torsions { TorsionMode::True } else { TorsionMode::Pseudo },
            include_angles,
            include_distances,
            scheme: Scheme::default_for(max_len),
        };

        let first = ResidueId::new('A', 2, ' ');
        let last = ResidueId::new('A', 1 + len as i32, ' ');

        let vector = extract(&structure, first, last, &cfg).unwrap();

        let filled = vector
            .iter()
            .filter(|&&v| v != DUMMY && v != DUMMY2)
            .count();
        let f = cfg.per_slot();
        prop_assert_eq!(filled, len * f);
        prop_assert_eq!(vector.len(), cfg.vector_dim());
    }
}
