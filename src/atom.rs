//! Atom records and the in-memory structure model.
//!
//! Per `spec.md` §9 Design Notes, atoms are a flat owned array with a
//! parallel `residue_start` offset table — no linked lists. `next_residue`
//! is an index function, not a pointer walk, matching `bioplib`'s
//! `blFindNextResidue` contract ("walk forward until `resid` changes") but
//! realised as an O(1) lookup after the one-time offset build in
//! [`Structure::from_atoms`].

use crate::residue::ResidueId;

/// One atomic coordinate record.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub resid: ResidueId,
    /// 4-character PDB atom name, e.g. `" CA "`, `" N  "`.
    pub atom_name: [u8; 4],
    pub resname: [u8; 3],
    pub xyz: [f64; 3],
    pub occupancy: f64,
    /// Temperature factor. Doubles as the solvent-accessibility carrier
    /// field when the atom stream came from an `.sa` sidecar (§6.3).
    pub bfactor: f64,
}

/// Backbone atom names; everything else on a residue is "side chain" for
/// the purposes of the contact search (§4.6) and the hydrogen-bond rules.
const BACKBONE_NAMES: [&str; 4] = ["N", "CA", "C", "O"];

impl Atom {
    pub fn atom_name_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.atom_name).trim().to_string()
    }

    pub fn resname_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.resname).trim().to_string()
    }

    pub fn is_backbone(&self) -> bool {
        BACKBONE_NAMES.contains(&self.atom_name_trimmed().as_str())
    }

    pub fn is_sidechain(&self) -> bool {
        !self.is_backbone()
    }

    pub fn distance(&self, other: &Atom) -> f64 {
        let dx = self.xyz[0] - other.xyz[0];
        let dy = self.xyz[1] - other.xyz[1];
        let dz = self.xyz[2] - other.xyz[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A parsed structure: a flat atom array plus residue boundary offsets.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    pub atoms: Vec<Atom>,
    /// `residue_start[k]` is the index of the first atom of the k-th
    /// residue (in file order); `residue_start.len()` is the residue count.
    residue_start: Vec<usize>,
}

impl Structure {
    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        let mut residue_start = Vec::new();
        let mut last: Option<ResidueId> = None;
        for (i, a) in atoms.iter().enumerate() {
            if last != Some(a.resid) {
                residue_start.push(i);
                last = Some(a.resid);
            }
        }
        Structure {
            atoms,
            residue_start,
        }
    }

    pub fn residue_count(&self) -> usize {
        self.residue_start.len()
    }

    /// Index of the residue (0-based, in file order) that atom `atom_idx`
    /// belongs to, via binary search over `residue_start`.
    fn residue_of_atom(&self, atom_idx: usize) -> usize {
        match self.residue_start.binary_search(&atom_idx) {
            Ok(k) => k,
            Err(k) => k - 1,
        }
    }

    /// Atom index range `[start, end)` for residue index `k` (0-based).
    pub fn residue_atom_range(&self, k: usize) -> (usize, usize) {
        let start = self.residue_start[k];
        let end = self
            .residue_start
            .get(k + 1)
            .copied()
            .unwrap_or(self.atoms.len());
        (start, end)
    }

    pub fn residue_atoms(&self, k: usize) -> &[Atom] {
        let (s, e) = self.residue_atom_range(k);
        &self.atoms[s..e]
    }

    /// 0-based residue index of the first residue matching `id`, if any.
    pub fn find_residue(&self, id: ResidueId) -> Option<usize> {
        (0..self.residue_count()).find(|&k| self.residue_atoms(k)[0].resid == id)
    }

    /// The residue index immediately following the residue containing
    /// `atom_idx`, or `None` at the end of the chain. Mirrors
    /// `blFindNextResidue`'s "walk until resid changes" contract.
    pub fn next_residue_index(&self, atom_idx: usize) -> Option<usize> {
        let k = self.residue_of_atom(atom_idx);
        if k + 1 < self.residue_count() {
            Some(k + 1)
        } else {
            None
        }
    }

    pub fn find_atom<'a>(&'a self, residue_atoms: &'a [Atom], name: &str) -> Option<&'a Atom> {
        residue_atoms
            .iter()
            .find(|a| a.atom_name_trimmed() == name)
    }

    pub fn ca<'a>(&'a self, residue_atoms: &'a [Atom]) -> Option<&'a Atom> {
        self.find_atom(residue_atoms, "CA")
    }

    pub fn cb<'a>(&'a self, residue_atoms: &'a [Atom]) -> Option<&'a Atom> {
        self.find_atom(residue_atoms, "CB")
    }

    /// One-letter amino acid code for residue index `k`, derived from the
    /// three-letter PDB residue name. Unrecognised names resolve to `'X'`
    /// rather than failing the parse (non-standard residues, e.g. `MSE`).
    pub fn one_letter(&self, k: usize) -> char {
        let resname = self.residue_atoms(k)[0].resname_trimmed();
        three_to_one(&resname)
    }
}

/// Standard 20 three-letter -> one-letter translations, plus a handful of
/// common non-standard residues tolerated by the original reader.
pub fn three_to_one(resname: &str) -> char {
    match resname.to_ascii_uppercase().as_str() {
        "ALA" => 'A',
        "CYS" => 'C',
        "ASP" => 'D',
        "GLU" => 'E',
        "PHE" => 'F',
        "GLY" => 'G',
        "HIS" => 'H',
        "ILE" => 'I',
        "LYS" => 'K',
        "LEU" => 'L',
        "MET" => 'M',
        "ASN" => 'N',
        "PRO" => 'P',
        "GLN" => 'Q',
        "ARG" => 'R',
        "SER" => 'S',
        "THR" => 'T',
        "VAL" => 'V',
        "TRP" => 'W',
        "TYR" => 'Y',
        "MSE" => 'M', // selenomethionine
        _ => 'X',
    }
}

pub fn pack_atom_name(name: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (i, b) in name.as_bytes().iter().take(4).enumerate() {
        out[i] = *b;
    }
    out
}

pub fn pack_resname(name: &str) -> [u8; 3] {
    let mut out = [b' '; 3];
    for (i, b) in name.as_bytes().iter().take(3).enumerate() {
        out[i] = *b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(resid: ResidueId, name: &str, resname: &str, xyz: [f64; 3]) -> Atom {
        Atom {
            resid,
            atom_name: pack_atom_name(name),
            resname: pack_resname(resname),
            xyz,
            occupancy: 1.0,
            bfactor: 0.0,
        }
    }

    fn three_residue_structure() -> Structure {
        let r1 = ResidueId::new('A', 1, ' ');
        let r2 = ResidueId::new('A', 2, ' ');
        let r3 = ResidueId::new('A', 3, ' ');
        Structure::from_atoms(vec![
            atom(r1, "N", "ALA", [0.0, 0.0, 0.0]),
            atom(r1, "CA", "ALA", [1.0, 0.0, 0.0]),
            atom(r1, "C", "ALA", [2.0, 0.0, 0.0]),
            atom(r2, "N", "GLY", [3.0, 0.0, 0.0]),
            atom(r2, "CA", "GLY", [4.0, 0.0, 0.0]),
            atom(r2, "C", "GLY", [5.0, 0.0, 0.0]),
            atom(r3, "N", "SER", [6.0, 0.0, 0.0]),
            atom(r3, "CA", "SER", [7.0, 0.0, 0.0]),
            atom(r3, "CB", "SER", [7.0, 1.0, 0.0]),
            atom(r3, "C", "SER", [8.0, 0.0, 0.0]),
        ])
    }

    #[test]
    fn residue_count_and_ranges() {
        let s = three_residue_structure();
        assert_eq!(s.residue_count(), 3);
        assert_eq!(s.residue_atom_range(0), (0, 3));
        assert_eq!(s.residue_atom_range(1), (3, 6));
        assert_eq!(s.residue_atom_range(2), (6, 10));
    }

    #[test]
    fn next_residue_walks_forward() {
        let s = three_residue_structure();
        assert_eq!(s.next_residue_index(0), Some(1));
        assert_eq!(s.next_residue_index(4), Some(2));
        assert_eq!(s.next_residue_index(9), None);
    }

    #[test]
    fn backbone_vs_sidechain() {
        let s = three_residue_structure();
        let res3 = s.residue_atoms(2);
        assert!(s.find_atom(res3, "CB").unwrap().is_sidechain());
        assert!(s.find_atom(res3, "CA").unwrap().is_backbone());
    }

    #[test]
    fn one_letter_from_three_letter() {
        let s = three_residue_structure();
        assert_eq!(s.one_letter(0), 'A');
        assert_eq!(s.one_letter(1), 'G');
        assert_eq!(s.one_letter(2), 'S');
    }
}
