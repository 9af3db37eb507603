//! Structure file reading: the "atomic coordinate records" input collaborator
//! (`spec.md` §1/§3).
//!
//! Reads the standard fixed-column PDB `ATOM`/`HETATM` record layout. Only
//! the fields the clustering pipeline needs are extracted; anything else on
//! the line (element symbol, charge) is ignored. `HETATM` records are kept
//! only for residue types recognised by [`crate::atom::three_to_one`] as
//! standard or `MSE` — other heteroatoms (waters, ligands) are skipped, they
//! never participate in loop geometry.

use crate::atom::{pack_atom_name, pack_resname, Atom, Structure};
use crate::error::StructureError;
use crate::residue::ResidueId;
use std::fs;
use std::path::Path;

/// Read a structure from a PDB-format file.
pub fn read_structure(path: &Path) -> Result<Structure, StructureError> {
    let text = fs::read_to_string(path).map_err(|source| StructureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let atoms = parse_pdb(&text);
    if atoms.is_empty() {
        return Err(StructureError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(Structure::from_atoms(atoms))
}

/// Parse `ATOM`/`HETATM` records from PDB text into a flat atom list, in file
/// order. Lines that don't parse as coordinate records (headers, `TER`,
/// `END`, blank lines) are silently skipped.
fn parse_pdb(text: &str) -> Vec<Atom> {
    let mut atoms = Vec::new();
    for line in text.lines() {
        if let Some(atom) = parse_atom_record(line) {
            atoms.push(atom);
        }
    }
    atoms
}

/// Parse one `ATOM`/`HETATM` line using the standard PDB column layout:
///
/// ```text
/// 1-6    Record name     "ATOM  " / "HETATM"
/// 13-16  Atom name
/// 18-20  Residue name
/// 22     Chain identifier
/// 23-26  Residue sequence number
/// 27     Insertion code
/// 31-38  X
/// 39-46  Y
/// 47-54  Z
/// 55-60  Occupancy
/// 61-66  Temperature factor
/// ```
fn parse_atom_record(line: &str) -> Option<Atom> {
    if line.len() < 54 {
        return None;
    }
    let record = line.get(0..6)?.trim();
    if record != "ATOM" && record != "HETATM" {
        return None;
    }

    let atom_name = line.get(12..16)?.trim();
    let resname = line.get(17..20)?.trim();
    let chain = line.get(21..22)?.chars().next().unwrap_or(' ');
    let seqnum: i32 = line.get(22..26)?.trim().parse().ok()?;
    let insert = line.get(26..27)?.chars().next().unwrap_or(' ');

    let x: f64 = line.get(30..38)?.trim().parse().ok()?;
    let y: f64 = line.get(38..46)?.trim().parse().ok()?;
    let z: f64 = line.get(46..54)?.trim().parse().ok()?;
    let occupancy: f64 = line
        .get(54..60)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1.0);
    let bfactor: f64 = line
        .get(60..66)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0.0);

    if record == "HETATM" && resname.to_ascii_uppercase() != "MSE" {
        return None;
    }

    Some(Atom {
        resid: ResidueId::new(chain, seqnum, insert),
        atom_name: pack_atom_name(atom_name),
        resname: pack_resname(resname),
        xyz: [x, y, z],
        occupancy,
        bfactor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ATOM      1  N   ALA A   1      11.104  13.207   2.104  1.00 20.00           N
ATOM      2  CA  ALA A   1      11.853  13.243   0.847  1.00 20.00           C
ATOM      3  C   ALA A   1      13.337  13.490   1.098  1.00 20.00           C
ATOM      4  O   ALA A   1      13.832  14.356   0.384  1.00 20.00           O
ATOM      5  N   GLY A   2      14.020  12.720   2.169  1.00 20.00           N
TER
HETATM    6  O   HOH A 101      20.000  20.000  20.000  1.00 30.00           O
END
";

    #[test]
    fn parses_atom_records_and_skips_ter_end_and_water() {
        let atoms = parse_pdb(SAMPLE);
        assert_eq!(atoms.len(), 5);
        assert_eq!(atoms[0].resid, ResidueId::new('A', 1, ' '));
        assert_eq!(atoms[0].atom_name_trimmed(), "N");
        assert!((atoms[1].xyz[0] - 11.853).abs() < 1e-9);
    }

    #[test]
    fn structure_groups_into_two_residues() {
        let atoms = parse_pdb(SAMPLE);
        let s = Structure::from_atoms(atoms);
        assert_eq!(s.residue_count(), 2);
    }

    #[test]
    fn mse_hetatm_is_kept() {
        let line = "HETATM    7 SE   MSE A   3      10.000  10.000  10.000  1.00 20.00          SE";
        let atom = parse_atom_record(line);
        assert!(atom.is_some());
    }
}
