//! Residue identifiers and the static residue-property bitmask table.
//!
//! Grounded in `resprops.h` and `decr2.c`'s `InitProperties`/`SetProperties`:
//! the flag bit positions and the per-amino-acid table below are reproduced
//! exactly, just re-expressed as a `bitflags`-free `u16` newtype with named
//! constants (the teacher crate favours small explicit bit constants over a
//! `bitflags!` macro for anything this size).

use std::fmt;

/// A residue identifier: chain, PDB sequence number, insertion code.
///
/// Comparisons are componentwise exact, per `spec.md` §3. Insert code `' '`
/// means "no insertion".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResidueId {
    pub chain: char,
    pub seqnum: i32,
    pub insert: char,
}

impl ResidueId {
    pub fn new(chain: char, seqnum: i32, insert: char) -> Self {
        Self {
            chain,
            seqnum,
            insert,
        }
    }
}

impl fmt::Display for ResidueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.insert == ' ' {
            write!(f, "{}{}", self.chain, self.seqnum)
        } else {
            write!(f, "{}{}{}", self.chain, self.seqnum, self.insert)
        }
    }
}

/// A 16-bit physico-chemical property bitmask, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Props(pub u16);

pub const HPHOB_FLAG: u16 = 0x0001;
pub const HPHIL_FLAG: u16 = 0x0002;
pub const NEGATIVE_FLAG: u16 = 0x0004;
pub const POSITIVE_FLAG: u16 = 0x0008;
pub const UNCHARGED_FLAG: u16 = 0x0010;
pub const AROMATIC_FLAG: u16 = 0x0020;
pub const ALIPHATIC_FLAG: u16 = 0x0040;
pub const SMALL_FLAG: u16 = 0x0080;
pub const MEDIUM_FLAG: u16 = 0x0100;
pub const LARGE_FLAG: u16 = 0x0200;
pub const GLY_FLAG: u16 = 0x0400;
pub const PRO_FLAG: u16 = 0x0800;
pub const OTHER_FLAG: u16 = 0x1000;
pub const HBOND_FLAG: u16 = 0x2000;
pub const NOHBOND_FLAG: u16 = 0x4000;
pub const DELETED_FLAG: u16 = 0x8000;

/// Residue types whose side chain is considered hydrophobic for the
/// buried-hydrophobic SDR rule (`spec.md` §4.6 rule 4).
pub const HYDROPHOBIC_LETTERS: [char; 9] = ['A', 'C', 'F', 'I', 'L', 'M', 'V', 'W', 'Y'];

impl Props {
    pub const fn empty() -> Self {
        Props(0)
    }

    pub fn is_set(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }

    /// Property intersection: properties conserved across a set.
    pub fn and(self, other: Props) -> Props {
        Props(self.0 & other.0)
    }

    /// Property union: properties observed anywhere in a set.
    pub fn or(self, other: Props) -> Props {
        Props(self.0 | other.0)
    }

    /// `true` iff `self` is a subset of `other` (used by `AND ⊆ OR`, invariant 7).
    pub fn is_subset_of(self, other: Props) -> bool {
        self.0 & other.0 == self.0
    }
}

/// Look up the property bitmask for a one-letter amino acid code, or the
/// deletion marker `'-'`. Unrecognised codes return `None`; callers treat an
/// unrecognised residue the way the original treats non-standard residues:
/// contributing no property bits (effectively "other" with nothing
/// conserved), rather than aborting.
pub fn props_for(one_letter: char) -> Option<Props> {
    let mut p = Props::empty();
    match one_letter {
        'A' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'C' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'D' => {
            p.set(HPHIL_FLAG);
            p.set(NEGATIVE_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'E' => {
            p.set(HPHIL_FLAG);
            p.set(NEGATIVE_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'F' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(AROMATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'G' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(GLY_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'H' => {
            p.set(HPHIL_FLAG);
            p.set(POSITIVE_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        'I' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'K' => {
            p.set(HPHIL_FLAG);
            p.set(POSITIVE_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'L' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'M' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'N' => {
            p.set(HPHIL_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        'P' => {
            p.set(HPHIL_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(PRO_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'Q' => {
            p.set(HPHIL_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        'R' => {
            p.set(HPHIL_FLAG);
            p.set(POSITIVE_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'S' => {
            p.set(HPHIL_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(SMALL_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        'T' => {
            p.set(HPHIL_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        'V' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(ALIPHATIC_FLAG);
            p.set(MEDIUM_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'W' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(AROMATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(NOHBOND_FLAG);
        }
        'Y' => {
            p.set(HPHOB_FLAG);
            p.set(UNCHARGED_FLAG);
            p.set(AROMATIC_FLAG);
            p.set(LARGE_FLAG);
            p.set(OTHER_FLAG);
            p.set(HBOND_FLAG);
        }
        '-' => {
            p.set(DELETED_FLAG);
        }
        _ => return None,
    }
    Some(p)
}

/// `true` if `letter` is one of the nine hydrophobic residue types used by
/// the buried-hydrophobic SDR rule.
pub fn is_hydrophobic_letter(letter: char) -> bool {
    HYDROPHOBIC_LETTERS.contains(&letter)
}

/// The 20 standard amino acid one-letter codes, in the same fixed
/// enumeration order as `decr2.c`'s `sResArray`.
pub const STANDARD_LETTERS: [char; 20] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W', 'Y',
];

/// Every standard residue whose property mask is a superset of `props`,
/// plus the deletion marker `-` when `deletable`.
///
/// Grounded in `decr2.c`'s `PrintSampleResidues`: `for i in 0..20 { if
/// (sPropsArray[i] & props) == props { print } }` — i.e. a residue is a
/// sample match when `props` is a subset of its own mask, not when its own
/// letter was one of the letters the intersection was built from. A position
/// conserved on every bit of `props` can therefore print a residue that was
/// never actually observed there, as long as that residue's mask is a
/// strict or non-strict superset.
pub fn sample_residues(props: Props, deletable: bool) -> std::collections::BTreeSet<char> {
    let mut out: std::collections::BTreeSet<char> = STANDARD_LETTERS
        .iter()
        .copied()
        .filter(|&letter| {
            let mask = props_for(letter).expect("standard letters are always recognised");
            props.is_subset_of(mask)
        })
        .collect();
    if deletable {
        out.insert('-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phe_and_trp_share_hydrophobic_aromatic_large_nohbond() {
        let f = props_for('F').unwrap();
        let w = props_for('W').unwrap();
        let common = f.and(w);
        assert!(common.is_set(HPHOB_FLAG));
        assert!(common.is_set(AROMATIC_FLAG));
        assert!(common.is_set(LARGE_FLAG));
        assert!(common.is_set(NOHBOND_FLAG));
    }

    #[test]
    fn and_is_subset_of_or() {
        let f = props_for('F').unwrap();
        let w = props_for('W').unwrap();
        let y = props_for('Y').unwrap();
        let conserved = f.and(w).and(y);
        let observed = f.or(w).or(y);
        assert!(conserved.is_subset_of(observed));
    }

    #[test]
    fn deleted_marker_has_only_deleted_flag() {
        let d = props_for('-').unwrap();
        assert_eq!(d.0, DELETED_FLAG);
    }

    #[test]
    fn residue_id_ordering_is_componentwise() {
        let a = ResidueId::new('L', 48, ' ');
        let b = ResidueId::new('L', 48, 'A');
        assert!(a < b);
    }

    #[test]
    fn unrecognised_code_returns_none() {
        assert!(props_for('X').is_none());
        assert!(props_for('B').is_none());
    }

    #[test]
    fn empty_props_samples_every_standard_residue() {
        let sample = sample_residues(Props::empty(), false);
        assert_eq!(sample.len(), 20);
    }

    #[test]
    fn sample_residues_adds_deletion_marker_when_deletable() {
        let sample = sample_residues(Props::empty(), true);
        assert!(sample.contains(&'-'));
        assert_eq!(sample.len(), 21);
    }

    #[test]
    fn phe_trp_conserved_mask_samples_only_phe_and_trp() {
        // F and W share an identical 6-bit mask (hydrophobic, uncharged,
        // aromatic, large, other, non-H-bonding); Y differs by one bit
        // (H-bonding instead of non-H-bonding), so it fails the superset
        // test even though it's otherwise a close match.
        let conserved = props_for('F').unwrap().and(props_for('W').unwrap());
        let sample = sample_residues(conserved, false);
        assert_eq!(sample, ['F', 'W'].into_iter().collect());
    }
}
