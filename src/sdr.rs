//! Template/Structurally-Determining-Residue (SDR) analyser (`spec.md` §4.6).
//!
//! Grounded in `original_source/FindSDRs.c`: per cluster, find residue
//! positions common to every loop (either as a loop residue or as a contact
//! residue in every member), intersect their property bitmasks, then run
//! five independently-toggleable augmentation rules (`MarkHPhob`,
//! `MarkHBonders`, the absolute-conservation/Gly-Pro/cis-Pro checks in
//! `FindSDRs`) to build the per-cluster `key` set. [`unify_sdrs`] then
//! builds the cross-cluster unified SDR table (`ReportUnifiedSDRs`,
//! `FlagNonInformativeSDRs`) and flags rogue clusters
//! (`FlagRogueClusters`/`IsRogue`).
//!
//! The hydrogen-bond rules use a distance-only donor/acceptor heuristic
//! (any two heteroatoms, N or O, within [`HBOND_DIST`]) rather than
//! `bioplib`'s full donor/acceptor-angle `IsHBonded` geometry, since this
//! crate has no equivalent library; the simplification is recorded in
//! `DESIGN.md`.

use crate::accessibility::AccessibilityTable;
use crate::atom::Structure;
use crate::geometry::dihedral;
use crate::residue::{self, Props};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Side-chain contact distance for the neighbour set (`spec.md` §4.6 step 1).
pub const CONTACT_DIST: f64 = 4.0;
/// Side-chain contact distance for the buried-hydrophobic partner rule.
pub const HPHOB_CONTACT_DIST: f64 = 5.0;
/// Solvent-accessibility cutoff below which a hydrophobic residue is buried.
pub const SA_CUT: f64 = 3.0;
/// Distance-only heuristic for a sidechain hydrogen bond donor/acceptor pair.
pub const HBOND_DIST: f64 = 3.5;
/// Minimum cluster size for the absolute-conservation rule and for
/// contributing to the cross-cluster unified SDR pool.
pub const MIN_ABSCONS: usize = 5;
/// Minimum cluster size for the conserved Gly/Pro rule.
pub const MIN_GLYPRO: usize = 2;

/// Which of the five augmentation rules (`spec.md` §4.6 step 4) are active.
/// All rules default to on.
#[derive(Debug, Clone, Copy)]
pub struct SdrRuleConfig {
    pub abs_conservation: bool,
    pub gly_pro: bool,
    pub cis_pro: bool,
    pub hbonds: bool,
    pub buried_hydrophobic: bool,
}

impl Default for SdrRuleConfig {
    fn default() -> Self {
        SdrRuleConfig {
            abs_conservation: true,
            gly_pro: true,
            cis_pro: true,
            hbonds: true,
            buried_hydrophobic: true,
        }
    }
}

/// Everything the analyser needs about one loop, extracted once from its
/// structure and kept alive through SDR analysis (per `spec.md` §3's
/// lifecycle note). Built by [`build_loop_data`].
#[derive(Debug, Clone)]
pub struct LoopSdrData {
    pub id: String,
    /// Loop residues, N- to C-terminal.
    pub loop_residues: Vec<crate::residue::ResidueId>,
    pub loop_letters: Vec<char>,
    pub loop_props: Vec<Props>,
    /// Framework (non-loop) residues with a side-chain atom within
    /// [`CONTACT_DIST`] of any loop atom.
    pub contact_residues: Vec<crate::residue::ResidueId>,
    pub contact_letters: Vec<char>,
    pub contact_props: Vec<Props>,
    /// Loop residues with a sidechain-to-anything H-bond crossing the
    /// loop/framework boundary.
    pub hbond_cross: HashSet<crate::residue::ResidueId>,
    /// Loop residues with a sidechain-to-backbone H-bond to another loop
    /// residue (both endpoints in the loop).
    pub hbond_intra: HashSet<crate::residue::ResidueId>,
    /// Loop residues that are hydrophobic and buried (`accessibility < SA_CUT`).
    pub buried_hydrophobic: HashSet<crate::residue::ResidueId>,
    /// Framework hydrophobic residues within [`HPHOB_CONTACT_DIST`] of a
    /// buried-hydrophobic loop residue.
    pub partners: HashSet<crate::residue::ResidueId>,
    /// omega torsion per loop residue, for the cis-proline check. `None`
    /// where the next residue (needed to define omega) is unavailable.
    pub omega: HashMap<crate::residue::ResidueId, f64>,
}

use crate::residue::ResidueId;

/// Build [`LoopSdrData`] for the loop `[first_idx, last_idx]` (0-based
/// residue indices) within `structure`. `accessibility`, if present, backs
/// the buried-hydrophobic rule; absent accessibility degrades that rule for
/// this loop only (`spec.md` §7's solvent-accessibility failure kind).
pub fn build_loop_data(
    id: &str,
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
    accessibility: Option<&AccessibilityTable>,
) -> LoopSdrData {
    let mut loop_residues = Vec::new();
    let mut loop_letters = Vec::new();
    let mut loop_props = Vec::new();
    for k in first_idx..=last_idx {
        let atoms = structure.residue_atoms(k);
        loop_residues.push(atoms[0].resid);
        let letter = structure.one_letter(k);
        loop_letters.push(letter);
        loop_props.push(residue::props_for(letter).unwrap_or_default());
    }

    let mut contact_residues = Vec::new();
    let mut contact_letters = Vec::new();
    let mut contact_props = Vec::new();
    for k in 0..structure.residue_count() {
        if (first_idx..=last_idx).contains(&k) {
            continue;
        }
        let res_atoms = structure.residue_atoms(k);
        let is_contact = res_atoms.iter().any(|a| {
            a.is_sidechain()
                && (first_idx..=last_idx).any(|lk| {
                    structure
                        .residue_atoms(lk)
                        .iter()
                        .any(|la| a.distance(la) <= CONTACT_DIST)
                })
        });
        if is_contact {
            contact_residues.push(res_atoms[0].resid);
            let letter = structure.one_letter(k);
            contact_letters.push(letter);
            contact_props.push(residue::props_for(letter).unwrap_or_default());
        }
    }

    let hbond_cross = find_hbond_cross(structure, first_idx, last_idx, &contact_residues);
    let hbond_intra = find_hbond_intra(structure, first_idx, last_idx);
    let buried_hydrophobic =
        find_buried_hydrophobic(structure, first_idx, last_idx, &loop_letters, accessibility);
    let partners = find_partners(
        structure,
        first_idx,
        last_idx,
        &contact_residues,
        &contact_letters,
        &buried_hydrophobic,
    );
    let omega = compute_omegas(structure, first_idx, last_idx);

    LoopSdrData {
        id: id.to_string(),
        loop_residues,
        loop_letters,
        loop_props,
        contact_residues,
        contact_letters,
        contact_props,
        hbond_cross,
        hbond_intra,
        buried_hydrophobic,
        partners,
        omega,
    }
}

fn is_heteroatom(name: &str) -> bool {
    name.starts_with('N') || name.starts_with('O')
}

fn sidechain_hbond(
    res_a: &[crate::atom::Atom],
    res_b: &[crate::atom::Atom],
    require_backbone_b: bool,
) -> bool {
    for pa in res_a.iter().filter(|a| a.is_sidechain() && is_heteroatom(&a.atom_name_trimmed())) {
        for pb in res_b.iter().filter(|a| {
            (!require_backbone_b || a.is_backbone()) && is_heteroatom(&a.atom_name_trimmed())
        }) {
            if pa.distance(pb) <= HBOND_DIST {
                return true;
            }
        }
    }
    false
}

fn find_hbond_cross(
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
    contact_residues: &[ResidueId],
) -> HashSet<ResidueId> {
    let mut out = HashSet::new();
    for k in first_idx..=last_idx {
        let loop_atoms = structure.residue_atoms(k);
        let resid = loop_atoms[0].resid;
        for &cres in contact_residues {
            if let Some(ck) = structure.find_residue(cres) {
                let fw_atoms = structure.residue_atoms(ck);
                if sidechain_hbond(loop_atoms, fw_atoms, false) {
                    out.insert(resid);
                    break;
                }
            }
        }
    }
    out
}

fn find_hbond_intra(structure: &Structure, first_idx: usize, last_idx: usize) -> HashSet<ResidueId> {
    let mut out = HashSet::new();
    for i in first_idx..=last_idx {
        let atoms_i = structure.residue_atoms(i);
        for j in first_idx..=last_idx {
            if i == j {
                continue;
            }
            let atoms_j = structure.residue_atoms(j);
            if sidechain_hbond(atoms_i, atoms_j, true) {
                out.insert(atoms_i[0].resid);
                break;
            }
        }
    }
    out
}

fn find_buried_hydrophobic(
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
    loop_letters: &[char],
    accessibility: Option<&AccessibilityTable>,
) -> HashSet<ResidueId> {
    let mut out = HashSet::new();
    let Some(table) = accessibility else {
        return out;
    };
    for (offset, k) in (first_idx..=last_idx).enumerate() {
        let letter = loop_letters[offset];
        if !residue::is_hydrophobic_letter(letter) {
            continue;
        }
        let (start, _) = structure.residue_atom_range(k);
        // Mean accessibility over the residue's atoms, matching the
        // original's per-residue b-value (a single representative value
        // stored by the accessibility tool per atom, averaged here since
        // this crate keeps accessibility per-atom rather than per-residue).
        let atoms = structure.residue_atoms(k);
        let mut sum = 0.0;
        let mut n = 0usize;
        for (i, _) in atoms.iter().enumerate() {
            if let Some(v) = table.get(start + i) {
                sum += v;
                n += 1;
            }
        }
        if n > 0 && sum / n as f64 < SA_CUT {
            out.insert(atoms[0].resid);
        }
    }
    out
}

fn find_partners(
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
    contact_residues: &[ResidueId],
    contact_letters: &[char],
    buried_hydrophobic: &HashSet<ResidueId>,
) -> HashSet<ResidueId> {
    let mut out = HashSet::new();
    if buried_hydrophobic.is_empty() {
        return out;
    }
    for (ci, &cres) in contact_residues.iter().enumerate() {
        let letter = contact_letters[ci];
        if !residue::is_hydrophobic_letter(letter) {
            continue;
        }
        let Some(ck) = structure.find_residue(cres) else {
            continue;
        };
        let fw_atoms: Vec<_> = structure
            .residue_atoms(ck)
            .iter()
            .filter(|a| a.is_sidechain())
            .collect();
        'loopres: for k in first_idx..=last_idx {
            let resid = structure.residue_atoms(k)[0].resid;
            if !buried_hydrophobic.contains(&resid) {
                continue;
            }
            for la in structure.residue_atoms(k).iter().filter(|a| a.is_sidechain()) {
                for fa in &fw_atoms {
                    if la.distance(fa) <= HPHOB_CONTACT_DIST {
                        out.insert(cres);
                        break 'loopres;
                    }
                }
            }
        }
    }
    out
}

/// Omega torsion `Ca(i)-C(i)-N(i+1)-Ca(i+1)` for each loop residue that has
/// a following residue in the structure.
fn compute_omegas(
    structure: &Structure,
    first_idx: usize,
    last_idx: usize,
) -> HashMap<ResidueId, f64> {
    let mut out = HashMap::new();
    for k in first_idx..=last_idx {
        let Some(next) = structure.next_residue_index(structure.residue_atom_range(k).0) else {
            continue;
        };
        let atoms_i = structure.residue_atoms(k);
        let atoms_n = structure.residue_atoms(next);
        let (ca_i, c_i, n_n, ca_n) = (
            structure.ca(atoms_i),
            structure.find_atom(atoms_i, "C"),
            structure.find_atom(atoms_n, "N"),
            structure.ca(atoms_n),
        );
        if let (Some(ca_i), Some(c_i), Some(n_n), Some(ca_n)) = (ca_i, c_i, n_n, ca_n) {
            let omega = dihedral(ca_i.xyz, c_i.xyz, n_n.xyz, ca_n.xyz);
            out.insert(atoms_i[0].resid, omega);
        }
    }
    out
}

/// Whether a common identifier was common because it's a loop residue in
/// every loop, or a contact residue in every loop (`spec.md` §4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    InLoop,
    Contact,
}

/// One residue position common to every loop in a cluster, with its merged
/// property data (`spec.md` §3's cluster-info record, §4.6 steps 2-3).
#[derive(Debug, Clone)]
pub struct CommonPosition {
    pub resid: ResidueId,
    pub kind: PositionKind,
    pub conserved_props: Props,
    pub range_props: Props,
    pub absolute: bool,
    pub conserved_letter: Option<char>,
    pub observed_letters: BTreeSet<char>,
    /// The residue is absent from the loop proper in at least one member
    /// (it's a contact-only common position rather than a loop-resident
    /// one in every member).
    pub deletable: bool,
}

/// Per-cluster common-identifier intersection and property merge
/// (`spec.md` §4.6 steps 2-3).
pub fn compute_common_positions(loops: &[LoopSdrData]) -> Vec<CommonPosition> {
    let n = loops.len();
    if n == 0 {
        return Vec::new();
    }

    let mut loop_count: HashMap<ResidueId, usize> = HashMap::new();
    let mut contact_count: HashMap<ResidueId, usize> = HashMap::new();
    // Letter/props contributed by each loop for a given identifier, in
    // whichever role (loop or contact) it played in that particular loop.
    let mut contributions: HashMap<ResidueId, Vec<(char, Props)>> = HashMap::new();

    for lp in loops {
        for (i, &resid) in lp.loop_residues.iter().enumerate() {
            *loop_count.entry(resid).or_insert(0) += 1;
            contributions
                .entry(resid)
                .or_default()
                .push((lp.loop_letters[i], lp.loop_props[i]));
        }
        for (i, &resid) in lp.contact_residues.iter().enumerate() {
            *contact_count.entry(resid).or_insert(0) += 1;
            contributions
                .entry(resid)
                .or_default()
                .push((lp.contact_letters[i], lp.contact_props[i]));
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for lp in loops {
        for &resid in lp.loop_residues.iter().chain(lp.contact_residues.iter()) {
            if !seen.insert(resid) {
                continue;
            }
            let lc = *loop_count.get(&resid).unwrap_or(&0);
            let cc = *contact_count.get(&resid).unwrap_or(&0);
            let kind = if lc == n {
                PositionKind::InLoop
            } else if cc == n {
                PositionKind::Contact
            } else {
                continue;
            };

            let contrib = &contributions[&resid];
            let mut conserved_props = contrib[0].1;
            let mut range_props = contrib[0].1;
            let mut observed_letters = BTreeSet::new();
            let first_letter = contrib[0].0;
            let mut absolute = true;
            for &(letter, props) in contrib {
                conserved_props = conserved_props.and(props);
                range_props = range_props.or(props);
                observed_letters.insert(letter);
                if letter != first_letter {
                    absolute = false;
                }
            }

            out.push(CommonPosition {
                resid,
                kind,
                conserved_props,
                range_props,
                absolute,
                conserved_letter: absolute.then_some(first_letter),
                observed_letters,
                deletable: kind == PositionKind::Contact,
            });
        }
    }
    out
}

/// Run the five key-residue augmentation rules (`spec.md` §4.6 step 4),
/// returning the cluster's `key` set.
pub fn apply_key_rules(
    loops: &[LoopSdrData],
    common: &[CommonPosition],
    rules: &SdrRuleConfig,
) -> BTreeSet<ResidueId> {
    let size = loops.len();
    let mut key = BTreeSet::new();

    for pos in common {
        if pos.kind != PositionKind::InLoop {
            continue;
        }

        if rules.abs_conservation && size >= MIN_ABSCONS && pos.absolute {
            key.insert(pos.resid);
        }

        if rules.gly_pro
            && size >= MIN_GLYPRO
            && pos.absolute
            && matches!(pos.conserved_letter, Some('G') | Some('P'))
        {
            key.insert(pos.resid);
        }

        if rules.cis_pro && size < MIN_GLYPRO && pos.absolute && pos.conserved_letter == Some('P') {
            if let Some(first_loop) = loops.first() {
                if let Some(&omega) = first_loop.omega.get(&pos.resid) {
                    use std::f64::consts::FRAC_PI_2;
                    if omega > -FRAC_PI_2 && omega < FRAC_PI_2 {
                        key.insert(pos.resid);
                    }
                }
            }
        }

        if rules.hbonds {
            let cross_every = loops.iter().all(|lp| lp.hbond_cross.contains(&pos.resid));
            let intra_every = loops.iter().all(|lp| lp.hbond_intra.contains(&pos.resid));
            if cross_every || intra_every {
                key.insert(pos.resid);
            }
        }

        if rules.buried_hydrophobic {
            let buried_every = loops
                .iter()
                .all(|lp| lp.buried_hydrophobic.contains(&pos.resid));
            if buried_every {
                key.insert(pos.resid);
            }
        }
    }

    if rules.buried_hydrophobic {
        for pos in common.iter().filter(|p| p.kind == PositionKind::Contact) {
            let partner_every = loops.iter().all(|lp| lp.partners.contains(&pos.resid));
            if partner_every {
                key.insert(pos.resid);
            }
        }
    }

    key
}

/// Tag describing why a position appears in a cluster's unified SDR table
/// (`spec.md` §4.6 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdrTag {
    InLoop,
    MakesContact,
    NoContact,
    AddedOnLength,
}

/// One row of a cluster's unified SDR table.
///
/// Carries the same property-merge fields as [`CommonPosition`]
/// (`conserved_props`, `range_props`, `absolute`, `conserved_letter`) so a
/// report writer can render the full cluster-info record (`spec.md` §3) for
/// every unified entry, not just the ones native to this cluster.
#[derive(Debug, Clone)]
pub struct SdrEntry {
    pub resid: ResidueId,
    pub tag: SdrTag,
    pub observed: BTreeSet<char>,
    pub conserved_props: Props,
    pub range_props: Props,
    pub absolute: bool,
    pub conserved_letter: Option<char>,
    pub deletable: bool,
}

/// A fully analysed cluster: common positions, key residues, the unified
/// cross-cluster SDR table, and rogue status. Produced by [`analyse_cluster`]
/// then completed by [`unify_sdrs`].
#[derive(Debug, Clone)]
pub struct ClusterAnalysis {
    pub cluster_id: usize,
    pub size: usize,
    pub loop_length: usize,
    pub common: Vec<CommonPosition>,
    pub key: BTreeSet<ResidueId>,
    pub unified: Vec<SdrEntry>,
    /// `Some(parent cluster id)` if this cluster is a rogue relative to a
    /// larger same-length cluster (`spec.md` §4.6 step 7).
    pub rogue_of: Option<usize>,
}

/// Run steps 1-4 for one cluster (everything local to the cluster, no
/// cross-cluster data needed yet).
pub fn analyse_cluster(
    cluster_id: usize,
    loop_length: usize,
    loops: &[LoopSdrData],
    rules: &SdrRuleConfig,
) -> ClusterAnalysis {
    let common = compute_common_positions(loops);
    let key = apply_key_rules(loops, &common, rules);
    ClusterAnalysis {
        cluster_id,
        size: loops.len(),
        loop_length,
        common,
        key,
        unified: Vec::new(),
        rogue_of: None,
    }
}

/// Build the cross-cluster unified SDR table for every cluster, suppress
/// non-informative added-on-length positions, and flag rogue clusters
/// (`spec.md` §4.6 steps 5-7). Mutates `clusters` in place.
pub fn unify_sdrs(clusters: &mut [ClusterAnalysis]) {
    let snapshot: Vec<(usize, usize, BTreeSet<ResidueId>)> = clusters
        .iter()
        .map(|c| (c.cluster_id, c.loop_length, c.key.clone()))
        .collect();
    let big_clusters: Vec<usize> = clusters
        .iter()
        .filter(|c| c.size >= MIN_ABSCONS)
        .map(|c| c.cluster_id)
        .collect();
    // Cloned up front so the per-cluster mutation loop below never needs a
    // second, overlapping borrow of `clusters` to look up another cluster's
    // common positions.
    let position_snapshot: HashMap<(usize, ResidueId), CommonPosition> = clusters
        .iter()
        .flat_map(|c| {
            c.common
                .iter()
                .map(move |p| ((c.cluster_id, p.resid), p.clone()))
        })
        .collect();

    for c in clusters.iter_mut() {
        let mut entries: Vec<SdrEntry> = Vec::new();
        let mut placed: HashSet<ResidueId> = HashSet::new();

        for pos in &c.common {
            if c.key.contains(&pos.resid) {
                let tag = match pos.kind {
                    PositionKind::InLoop => SdrTag::InLoop,
                    PositionKind::Contact => SdrTag::MakesContact,
                };
                entries.push(SdrEntry {
                    resid: pos.resid,
                    tag,
                    observed: pos.observed_letters.clone(),
                    conserved_props: pos.conserved_props,
                    range_props: pos.range_props,
                    absolute: pos.absolute,
                    conserved_letter: pos.conserved_letter,
                    deletable: false,
                });
                placed.insert(pos.resid);
            }
        }

        for &(other_id, other_len, ref other_key) in &snapshot {
            if other_id == c.cluster_id {
                continue;
            }
            let contributes_big = big_clusters.contains(&other_id);
            let same_length = other_len == c.loop_length;
            if !contributes_big && !same_length {
                continue;
            }
            for &resid in other_key {
                if placed.contains(&resid) {
                    continue;
                }
                let Some(pos) = position_snapshot.get(&(other_id, resid)) else {
                    continue;
                };
                let tag = if contributes_big {
                    SdrTag::NoContact
                } else {
                    SdrTag::AddedOnLength
                };
                entries.push(SdrEntry {
                    resid,
                    tag,
                    observed: pos.observed_letters.clone(),
                    conserved_props: pos.conserved_props,
                    range_props: pos.range_props,
                    absolute: pos.absolute,
                    conserved_letter: pos.conserved_letter,
                    deletable: false,
                });
                placed.insert(resid);
            }
        }

        c.unified = entries;
    }

    suppress_non_informative(clusters);
    flag_rogue_clusters(clusters);
}

/// `ValueIsAdded`: `true` iff neither set shares an observed amino acid with
/// the other, i.e. the candidate set is disjoint from the reference set.
fn value_is_added(reference: &BTreeSet<char>, candidate: &BTreeSet<char>) -> bool {
    reference.is_disjoint(candidate)
}

/// `FlagNonInformativeSDRs`/`ValueIsAdded`: mark an added-on-length position
/// deletable when no same-length cluster's allowed set at that position adds
/// discriminatory value over whichever same-length cluster allows the most
/// residues there.
fn suppress_non_informative(clusters: &mut [ClusterAnalysis]) {
    // Group, per (loop_length, resid), every cluster's observed set at that
    // resid (from its own common-position list, not the unified table).
    let mut by_length_resid: HashMap<(usize, ResidueId), Vec<(usize, BTreeSet<char>)>> =
        HashMap::new();
    for c in clusters.iter() {
        for pos in &c.common {
            by_length_resid
                .entry((c.loop_length, pos.resid))
                .or_default()
                .push((c.cluster_id, pos.observed_letters.clone()));
        }
    }

    let mut deletable_keys: HashSet<(usize, ResidueId)> = HashSet::new();
    for (&(length, resid), candidates) in &by_length_resid {
        if candidates.len() < 2 {
            continue;
        }
        let (max_id, max_set) = candidates
            .iter()
            .max_by_key(|(_, set)| set.len())
            .cloned()
            .unwrap();
        let added = candidates
            .iter()
            .any(|(id, set)| *id != max_id && value_is_added(&max_set, set));
        if !added {
            deletable_keys.insert((length, resid));
        }
    }

    for c in clusters.iter_mut() {
        for entry in c.unified.iter_mut() {
            if entry.tag == SdrTag::AddedOnLength
                && deletable_keys.contains(&(c.loop_length, entry.resid))
            {
                entry.deletable = true;
            }
        }
    }
}

fn is_rogue(large: &[SdrEntry], small: &[SdrEntry]) -> bool {
    for s1 in large {
        for s2 in small {
            if s1.resid == s2.resid && value_is_added(&s1.observed, &s2.observed) {
                return false;
            }
        }
    }
    true
}

/// `FlagRogueClusters`: per loop length, flag clusters indistinguishable
/// (at every shared SDR position) from a larger same-length cluster.
fn flag_rogue_clusters(clusters: &mut [ClusterAnalysis]) {
    let lengths: BTreeSet<usize> = clusters.iter().map(|c| c.loop_length).collect();

    for length in lengths {
        let ids: Vec<usize> = clusters
            .iter()
            .filter(|c| c.loop_length == length)
            .map(|c| c.cluster_id)
            .collect();
        if ids.is_empty() {
            continue;
        }

        let largest_id = ids
            .iter()
            .copied()
            .max_by_key(|&id| clusters.iter().find(|c| c.cluster_id == id).unwrap().size)
            .unwrap();

        let largest_unified = clusters
            .iter()
            .find(|c| c.cluster_id == largest_id)
            .unwrap()
            .unified
            .clone();

        for &id in &ids {
            if id == largest_id {
                continue;
            }
            let c = clusters.iter().find(|c| c.cluster_id == id).unwrap();
            if is_rogue(&largest_unified, &c.unified) {
                clusters
                    .iter_mut()
                    .find(|c| c.cluster_id == id)
                    .unwrap()
                    .rogue_of = Some(largest_id);
            }
        }

        for i in 0..ids.len() {
            let clus1 = ids[i];
            if clusters
                .iter()
                .find(|c| c.cluster_id == clus1)
                .unwrap()
                .rogue_of
                .is_some()
            {
                continue;
            }
            for &clus2 in ids.iter().skip(i + 1) {
                let size1 = clusters.iter().find(|c| c.cluster_id == clus1).unwrap().size;
                let size2 = clusters.iter().find(|c| c.cluster_id == clus2).unwrap().size;
                let (clusa, clusb) = if size1 < size2 {
                    (clus2, clus1)
                } else {
                    (clus1, clus2)
                };
                let a_unified = clusters
                    .iter()
                    .find(|c| c.cluster_id == clusa)
                    .unwrap()
                    .unified
                    .clone();
                let b_unified = clusters
                    .iter()
                    .find(|c| c.cluster_id == clusb)
                    .unwrap()
                    .unified
                    .clone();
                if is_rogue(&a_unified, &b_unified) {
                    for c in clusters.iter_mut() {
                        if c.rogue_of == Some(clusb) {
                            c.rogue_of = Some(clusa);
                        }
                    }
                    clusters
                        .iter_mut()
                        .find(|c| c.cluster_id == clusb)
                        .unwrap()
                        .rogue_of = Some(clusa);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{pack_atom_name, pack_resname, Atom};

    fn make_loop(letters: &[(char, &str)], offset: i32) -> LoopSdrData {
        let mut loop_residues = Vec::new();
        let mut loop_letters = Vec::new();
        let mut loop_props = Vec::new();
        for (i, &(letter, resname)) in letters.iter().enumerate() {
            let resid = ResidueId::new('L', offset + i as i32, ' ');
            loop_residues.push(resid);
            loop_letters.push(letter);
            loop_props.push(residue::props_for(letter).unwrap());
            let _ = resname;
        }
        LoopSdrData {
            id: format!("loop{offset}"),
            loop_residues,
            loop_letters,
            loop_props,
            contact_residues: Vec::new(),
            contact_letters: Vec::new(),
            contact_props: Vec::new(),
            hbond_cross: HashSet::new(),
            hbond_intra: HashSet::new(),
            buried_hydrophobic: HashSet::new(),
            partners: HashSet::new(),
            omega: HashMap::new(),
        }
    }

    #[test]
    fn s3_property_intersection_of_f_and_w() {
        // spec.md S3: position L50 is F in one loop, W in the other; both
        // hydrophobic + aromatic + large + non-H-bonding, not absolute.
        let mut a = make_loop(&[('F', "PHE")], 50);
        let mut b = make_loop(&[('W', "TRP")], 50);
        a.id = "a".into();
        b.id = "b".into();
        let common = compute_common_positions(&[a, b]);
        assert_eq!(common.len(), 1);
        let pos = &common[0];
        assert!(!pos.absolute);
        assert!(pos.conserved_props.is_set(residue::HPHOB_FLAG));
        assert!(pos.conserved_props.is_set(residue::AROMATIC_FLAG));
        assert!(pos.conserved_props.is_set(residue::LARGE_FLAG));
        assert!(pos.conserved_props.is_set(residue::NOHBOND_FLAG));
        assert_eq!(
            pos.observed_letters.iter().collect::<Vec<_>>(),
            vec![&'F', &'W']
        );
        // The property-matched sample print (`ALLCRITICALRESIDUES`'s
        // rendering of a non-absolute position) enumerates every standard
        // residue whose own mask is a superset of the conserved mask, not
        // just the letters actually observed here. Y is one bit short (it's
        // H-bonding, not non-H-bonding), so it does not qualify: F and W
        // are the only residues carrying this exact six-bit combination.
        let sample = residue::sample_residues(pos.conserved_props, pos.deletable);
        assert_eq!(sample, ['F', 'W'].into_iter().collect());
    }

    #[test]
    fn s4_buried_hydrophobic_key_when_buried_in_every_loop() {
        let mut loops = Vec::new();
        for i in 0..3 {
            let mut lp = make_loop(&[('L', "LEU")], 95);
            lp.id = format!("l{i}");
            lp.buried_hydrophobic.insert(ResidueId::new('L', 95, ' '));
            loops.push(lp);
        }
        let common = compute_common_positions(&loops);
        let key = apply_key_rules(&loops, &common, &SdrRuleConfig::default());
        assert!(key.contains(&ResidueId::new('L', 95, ' ')));
    }

    #[test]
    fn s4_not_buried_in_every_loop_so_not_key() {
        let mut loops = Vec::new();
        for i in 0..3 {
            let mut lp = make_loop(&[('L', "LEU")], 95);
            lp.id = format!("l{i}");
            if i != 1 {
                lp.buried_hydrophobic.insert(ResidueId::new('L', 95, ' '));
            }
            loops.push(lp);
        }
        let common = compute_common_positions(&loops);
        let key = apply_key_rules(&loops, &common, &SdrRuleConfig::default());
        assert!(!key.contains(&ResidueId::new('L', 95, ' ')));
    }

    #[test]
    fn absolute_conservation_requires_five_members() {
        let mut loops = Vec::new();
        for i in 0..4 {
            let mut lp = make_loop(&[('W', "TRP")], 10);
            lp.id = format!("l{i}");
            loops.push(lp);
        }
        let common = compute_common_positions(&loops);
        let key = apply_key_rules(&loops, &common, &SdrRuleConfig::default());
        // Only 4 members: abs-conservation rule requires >= 5.
        assert!(key.is_empty());

        loops.push({
            let mut lp = make_loop(&[('W', "TRP")], 10);
            lp.id = "l4".into();
            lp
        });
        let common = compute_common_positions(&loops);
        let key = apply_key_rules(&loops, &common, &SdrRuleConfig::default());
        assert!(key.contains(&ResidueId::new('L', 10, ' ')));
    }

    #[test]
    fn rules_can_be_toggled_off() {
        let mut loops = Vec::new();
        for i in 0..5 {
            let mut lp = make_loop(&[('W', "TRP")], 10);
            lp.id = format!("l{i}");
            loops.push(lp);
        }
        let common = compute_common_positions(&loops);
        let mut rules = SdrRuleConfig::default();
        rules.abs_conservation = false;
        let key = apply_key_rules(&loops, &common, &rules);
        assert!(key.is_empty());
    }

    #[test]
    fn s5_rogue_detection_subset_allowed_sets() {
        // Three clusters of the same loop length; the two small ones have
        // allowed-residue sets at the SDR position that are subsets of the
        // big cluster's set, so both are rogues of the big cluster.
        let resid = ResidueId::new('A', 1, ' ');
        let big = ClusterAnalysis {
            cluster_id: 1,
            size: 30,
            loop_length: 6,
            common: Vec::new(),
            key: BTreeSet::new(),
            unified: vec![SdrEntry {
                resid,
                tag: SdrTag::InLoop,
                observed: ['A', 'G', 'S'].into_iter().collect(),
                conserved_props: Props::empty(),
                range_props: Props::empty(),
                absolute: false,
                conserved_letter: None,
                deletable: false,
            }],
            rogue_of: None,
        };
        let small1 = ClusterAnalysis {
            cluster_id: 2,
            size: 3,
            loop_length: 6,
            common: Vec::new(),
            key: BTreeSet::new(),
            unified: vec![SdrEntry {
                resid,
                tag: SdrTag::InLoop,
                observed: ['A'].into_iter().collect(),
                conserved_props: Props::empty(),
                range_props: Props::empty(),
                absolute: false,
                conserved_letter: None,
                deletable: false,
            }],
            rogue_of: None,
        };
        let small2 = ClusterAnalysis {
            cluster_id: 3,
            size: 2,
            loop_length: 6,
            common: Vec::new(),
            key: BTreeSet::new(),
            unified: vec![SdrEntry {
                resid,
                tag: SdrTag::InLoop,
                observed: ['G'].into_iter().collect(),
                conserved_props: Props::empty(),
                range_props: Props::empty(),
                absolute: false,
                conserved_letter: None,
                deletable: false,
            }],
            rogue_of: None,
        };
        let mut clusters = vec![big, small1, small2];
        flag_rogue_clusters(&mut clusters);
        assert_eq!(clusters[1].rogue_of, Some(1));
        assert_eq!(clusters[2].rogue_of, Some(1));
    }

    #[test]
    fn value_is_added_is_disjointness() {
        let a: BTreeSet<char> = ['F', 'W'].into_iter().collect();
        let b: BTreeSet<char> = ['F'].into_iter().collect();
        let c: BTreeSet<char> = ['Y'].into_iter().collect();
        assert!(!value_is_added(&a, &b));
        assert!(value_is_added(&a, &c));
    }
}
