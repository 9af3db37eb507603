//! Structured report reader/writer (`spec.md` §6.2).
//!
//! Grounded in `original_source/clan.c`'s `WriteClanFile` and
//! `original_source/FindSDRs.c`'s `ReadClanFile`: named `BEGIN <name>` /
//! `END <name>` sections in a fixed order, shared by both halves of the
//! pipeline (the clustering tool writes; the classifier and the SDR
//! analyser read) so the two stay in sync by construction. One `report`
//! module backs both directions.

use crate::control::{Method, PostClusterGates};
use crate::error::ReportError;
use crate::features::TorsionMode;
use crate::refine::MergeRecord;
use crate::residue::{self, Props};
use crate::scheme::Scheme;
use crate::sdr::{ClusterAnalysis, CommonPosition, SdrTag};
use std::collections::BTreeMap;
use std::io::{self, Write};

const SECTION_ORDER: &[&str] = &[
    "HEADER",
    "DATA",
    "CLUSTABLE",
    "DENDOGRAM",
    "RAWASSIGNMENTS",
    "RAWMEDIANS",
    "POSTCLUSTER",
    "ASSIGNMENTS",
    "MEDIANS",
    "CRITICALRESIDUES",
    "ALLCRITICALRESIDUES",
];

/// The `HEADER` section's fields.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub method: Method,
    pub nloops: usize,
    pub postcluster: PostClusterGates,
    pub maxlength: usize,
    pub scheme: Scheme,
    pub include_distances: bool,
    pub include_angles: bool,
    pub torsion_mode: TorsionMode,
}

/// Everything a clustering run produces, ready to be serialised. Which
/// optional sections actually get written is controlled by which `Option`
/// fields are `Some`.
pub struct ReportData<'a> {
    pub header: ReportHeader,
    pub loop_ids: &'a [String],
    pub data: Option<&'a [Vec<f64>]>,
    pub loop_lengths: Option<&'a [usize]>,
    pub dendogram_lines: Option<&'a [String]>,
    pub raw_assignments: &'a [usize],
    pub raw_medians: &'a [(usize, String)],
    pub postcluster_merges: &'a [MergeRecord],
    pub assignments: &'a [usize],
    pub medians: &'a [(usize, String)],
    pub critical_residues: Option<&'a [ClusterAnalysis]>,
}

fn method_name(m: Method) -> &'static str {
    match m {
        Method::Ward => "WARD",
        Method::Single => "SINGLE",
        Method::Complete => "COMPLETE",
        Method::Average => "AVERAGE",
        Method::McQuitty => "MCQUITTY",
        Method::Median => "MEDIAN",
        Method::Centroid => "CENTROID",
    }
}

fn parse_method(tok: &str) -> Option<Method> {
    match tok {
        "WARD" => Some(Method::Ward),
        "SINGLE" => Some(Method::Single),
        "COMPLETE" => Some(Method::Complete),
        "AVERAGE" => Some(Method::Average),
        "MCQUITTY" => Some(Method::McQuitty),
        "MEDIAN" => Some(Method::Median),
        "CENTROID" => Some(Method::Centroid),
        _ => None,
    }
}

fn tag_name(tag: SdrTag) -> &'static str {
    match tag {
        SdrTag::InLoop => "INLOOP",
        SdrTag::MakesContact => "MAKESCONTACT",
        SdrTag::NoContact => "NOCONTACT",
        SdrTag::AddedOnLength => "ADDEDONLENGTH",
    }
}

/// Write the full report to `w`, in the fixed section order, skipping any
/// section whose corresponding `ReportData` field is `None`.
pub fn write_report(w: &mut impl Write, report: &ReportData) -> Result<(), ReportError> {
    write_header(w, &report.header)?;

    if let Some(vectors) = report.data {
        write_data(w, report.loop_ids, vectors)?;
    }
    if let Some(lengths) = report.loop_lengths {
        write_clustable(w, report.loop_ids, lengths)?;
    }
    if let Some(lines) = report.dendogram_lines {
        write_dendogram(w, lines)?;
    }

    write_assignment_section(w, "RAWASSIGNMENTS", report.loop_ids, report.raw_assignments)?;
    write_median_section(w, "RAWMEDIANS", report.raw_medians)?;
    write_postcluster(w, report.postcluster_merges)?;
    write_assignment_section(w, "ASSIGNMENTS", report.loop_ids, report.assignments)?;
    write_median_section(w, "MEDIANS", report.medians)?;

    if let Some(analyses) = report.critical_residues {
        write_critical_residues(w, analyses)?;
        write_all_critical_residues(w, analyses)?;
    }

    Ok(())
}

fn write_header(w: &mut impl Write, h: &ReportHeader) -> io::Result<()> {
    writeln!(w, "BEGIN HEADER")?;
    writeln!(w, "METHOD {}", method_name(h.method))?;
    writeln!(w, "NLOOPS {}", h.nloops)?;
    writeln!(
        w,
        "POSTCLUSTER {:.3} {:.3} {:.3}",
        h.postcluster.rms_cut, h.postcluster.ca_dev_cut, h.postcluster.cb_dev_cut
    )?;
    writeln!(w, "MAXLENGTH {}", h.maxlength)?;
    let scheme_str = h
        .scheme
        .thresholds
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(w, "SCHEME {scheme_str}")?;
    writeln!(w, "{}", if h.include_distances { "DISTANCE" } else { "NODISTANCE" })?;
    writeln!(w, "{}", if h.include_angles { "ANGLES" } else { "NOANGLES" })?;
    writeln!(
        w,
        "{}",
        match h.torsion_mode {
            TorsionMode::Pseudo => "PSEUDOTORSIONS",
            TorsionMode::True => "TRUETORSIONS",
        }
    )?;
    writeln!(w, "END HEADER")
}

fn write_data(w: &mut impl Write, loop_ids: &[String], vectors: &[Vec<f64>]) -> io::Result<()> {
    writeln!(w, "BEGIN DATA")?;
    for (id, v) in loop_ids.iter().zip(vectors.iter()) {
        let row = v.iter().map(|x| format!("{x:.6}")).collect::<Vec<_>>().join(" ");
        writeln!(w, "{id} {row}")?;
    }
    writeln!(w, "END DATA")
}

fn write_clustable(w: &mut impl Write, loop_ids: &[String], lengths: &[usize]) -> io::Result<()> {
    writeln!(w, "BEGIN CLUSTABLE")?;
    for (id, len) in loop_ids.iter().zip(lengths.iter()) {
        writeln!(w, "{id} {len}")?;
    }
    writeln!(w, "END CLUSTABLE")
}

fn write_dendogram(w: &mut impl Write, lines: &[String]) -> io::Result<()> {
    writeln!(w, "BEGIN DENDOGRAM")?;
    for line in lines {
        writeln!(w, "{line}")?;
    }
    writeln!(w, "END DENDOGRAM")
}

fn write_assignment_section(
    w: &mut impl Write,
    name: &str,
    loop_ids: &[String],
    clusters: &[usize],
) -> io::Result<()> {
    writeln!(w, "BEGIN {name}")?;
    for (id, c) in loop_ids.iter().zip(clusters.iter()) {
        writeln!(w, "{c} {id}")?;
    }
    writeln!(w, "END {name}")
}

fn write_median_section(w: &mut impl Write, name: &str, medians: &[(usize, String)]) -> io::Result<()> {
    writeln!(w, "BEGIN {name}")?;
    writeln!(w, "{}", medians.len())?;
    for (cluster_num, loop_id) in medians {
        writeln!(w, "{cluster_num} {loop_id}")?;
    }
    writeln!(w, "END {name}")
}

fn write_postcluster(w: &mut impl Write, merges: &[MergeRecord]) -> io::Result<()> {
    writeln!(w, "BEGIN POSTCLUSTER")?;
    for m in merges {
        writeln!(
            w,
            "{} {} {} {} {:.3} {:.3} {:.3}",
            m.cluster_a, m.rep_a, m.cluster_b, m.rep_b, m.rms, m.ca_dev, m.cb_dev
        )?;
    }
    writeln!(w, "END POSTCLUSTER")
}

/// Render the per-residue template from `spec.md` §3's cluster-info record
/// (conserved-property bitmask, union-of-properties bitmask, and either the
/// conserved amino-acid letter or a property-matched sample print), mirroring
/// `FindSDRs.c`'s `ReportSDRs`: `PrintProps` followed by `[CONSERVED] (%c)`
/// when absolutely conserved, else `PrintSampleResidues`.
fn write_residue_template(
    w: &mut impl Write,
    conserved_props: Props,
    range_props: Props,
    absolute: bool,
    conserved_letter: Option<char>,
    deletable: bool,
) -> io::Result<()> {
    write!(w, "PROPS {:#06x} RANGE {:#06x}", conserved_props.0, range_props.0)?;
    match (absolute, conserved_letter) {
        (true, Some(letter)) => write!(w, " CONSERVED ({letter})")?,
        _ => {
            let sample: String = residue::sample_residues(conserved_props, deletable)
                .into_iter()
                .collect();
            write!(w, " SAMPLE ({sample})")?;
        }
    }
    writeln!(w)
}

fn write_critical_residues(w: &mut impl Write, analyses: &[ClusterAnalysis]) -> io::Result<()> {
    writeln!(w, "BEGIN CRITICALRESIDUES")?;
    for a in analyses {
        writeln!(w, "CLUSTER {} SIZE {} LENGTH {}", a.cluster_id, a.size, a.loop_length)?;
        let key = a
            .key
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(w, "KEY {key}")?;
        for resid in &a.key {
            let Some(pos): Option<&CommonPosition> = a.common.iter().find(|p| &p.resid == resid) else {
                continue;
            };
            write!(w, "{resid} ")?;
            write_residue_template(
                w,
                pos.conserved_props,
                pos.range_props,
                pos.absolute,
                pos.conserved_letter,
                pos.deletable,
            )?;
        }
    }
    writeln!(w, "END CRITICALRESIDUES")
}

fn write_all_critical_residues(w: &mut impl Write, analyses: &[ClusterAnalysis]) -> io::Result<()> {
    writeln!(w, "BEGIN ALLCRITICALRESIDUES")?;
    for a in analyses {
        let rogue = a
            .rogue_of
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(w, "CLUSTER {} ROGUEOF {}", a.cluster_id, rogue)?;
        for entry in &a.unified {
            let observed: String = entry.observed.iter().collect();
            write!(
                w,
                "{} {} {} {} ",
                entry.resid,
                tag_name(entry.tag),
                if observed.is_empty() { "-".to_string() } else { observed },
                if entry.deletable { "DELETABLE" } else { "KEEP" }
            )?;
            write_residue_template(
                w,
                entry.conserved_props,
                entry.range_props,
                entry.absolute,
                entry.conserved_letter,
                entry.deletable,
            )?;
        }
    }
    writeln!(w, "END ALLCRITICALRESIDUES")
}

/// Everything parsed back out of a report's always-present sections, plus
/// whatever optional sections were found. Only the pieces actually
/// consumed downstream (the classifier; SDR re-analysis) are given typed
/// accessors — the rest stays as raw lines.
#[derive(Debug, Clone)]
pub struct Report {
    pub header: ReportHeader,
    pub data: Option<Vec<(String, Vec<f64>)>>,
    pub raw_assignments: Vec<(usize, String)>,
    pub raw_medians: Vec<(usize, String)>,
    pub assignments: Vec<(usize, String)>,
    pub medians: Vec<(usize, String)>,
    pub sections: BTreeMap<String, Vec<String>>,
}

impl Report {
    /// Cluster id per loop id from `ASSIGNMENTS` (the final, post-refine
    /// partition — the "established clusters" the classifier matches
    /// against).
    pub fn assignment_vectors(&self) -> (Vec<String>, Vec<usize>) {
        let ids = self.assignments.iter().map(|(_, id)| id.clone()).collect();
        let clusters = self.assignments.iter().map(|(c, _)| *c).collect();
        (ids, clusters)
    }

    pub fn feature_matrix(&self) -> Option<(Vec<String>, Vec<Vec<f64>>)> {
        let data = self.data.as_ref()?;
        let ids = data.iter().map(|(id, _)| id.clone()).collect();
        let vectors = data.iter().map(|(_, v)| v.clone()).collect();
        Some((ids, vectors))
    }
}

fn split_sections(text: &str) -> Result<BTreeMap<String, Vec<String>>, ReportError> {
    let mut sections: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end();
        if let Some(name) = line.strip_prefix("BEGIN ") {
            if current.is_some() {
                return Err(ReportError::Malformed {
                    section: "<nested>",
                    detail: format!("nested BEGIN {name} before matching END"),
                });
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else if let Some(name) = line.strip_prefix("END ") {
            match current.take() {
                Some((open_name, body)) if open_name == name.trim() => {
                    sections.insert(open_name, body);
                }
                Some((open_name, _)) => {
                    return Err(ReportError::Malformed {
                        section: "<mismatched>",
                        detail: format!("END {} does not match BEGIN {}", name.trim(), open_name),
                    });
                }
                None => {
                    return Err(ReportError::Malformed {
                        section: "<mismatched>",
                        detail: format!("END {} with no matching BEGIN", name.trim()),
                    });
                }
            }
        } else if let Some((_, body)) = current.as_mut() {
            if !line.is_empty() {
                body.push(line.to_string());
            }
        }
    }

    if current.is_some() {
        return Err(ReportError::Malformed {
            section: "<unterminated>",
            detail: "report ends with an open section".to_string(),
        });
    }
    Ok(sections)
}

fn parse_header(lines: &[String]) -> Result<ReportHeader, ReportError> {
    let mut method = None;
    let mut nloops = None;
    let mut postcluster = PostClusterGates::default();
    let mut maxlength = None;
    let mut scheme = None;
    let mut include_distances = None;
    let mut include_angles = None;
    let mut torsion_mode = None;

    for line in lines {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else { continue };
        match key {
            "METHOD" => {
                let tok = tokens.next().ok_or_else(|| malformed_header("missing METHOD value"))?;
                method = Some(parse_method(tok).ok_or_else(|| malformed_header("unknown METHOD"))?);
            }
            "NLOOPS" => {
                let tok = tokens.next().ok_or_else(|| malformed_header("missing NLOOPS value"))?;
                nloops = Some(tok.parse::<usize>().map_err(|_| malformed_header("bad NLOOPS"))?);
            }
            "POSTCLUSTER" => {
                let vals: Vec<f64> = tokens
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| malformed_header("bad POSTCLUSTER values"))?;
                if vals.len() != 3 {
                    return Err(malformed_header("POSTCLUSTER needs 3 values"));
                }
                postcluster = PostClusterGates {
                    rms_cut: vals[0],
                    ca_dev_cut: vals[1],
                    cb_dev_cut: vals[2],
                };
            }
            "MAXLENGTH" => {
                let tok = tokens.next().ok_or_else(|| malformed_header("missing MAXLENGTH value"))?;
                maxlength = Some(tok.parse::<usize>().map_err(|_| malformed_header("bad MAXLENGTH"))?);
            }
            "SCHEME" => {
                let vals: Vec<usize> = tokens
                    .map(|t| t.parse::<usize>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| malformed_header("bad SCHEME values"))?;
                scheme = Some(Scheme::from_values(vals));
            }
            "DISTANCE" => include_distances = Some(true),
            "NODISTANCE" => include_distances = Some(false),
            "ANGLES" => include_angles = Some(true),
            "NOANGLES" => include_angles = Some(false),
            "PSEUDOTORSIONS" => torsion_mode = Some(TorsionMode::Pseudo),
            "TRUETORSIONS" => torsion_mode = Some(TorsionMode::True),
            _ => {}
        }
    }

    Ok(ReportHeader {
        method: method.ok_or_else(|| malformed_header("missing METHOD"))?,
        nloops: nloops.ok_or_else(|| malformed_header("missing NLOOPS"))?,
        postcluster,
        maxlength: maxlength.ok_or_else(|| malformed_header("missing MAXLENGTH"))?,
        scheme: scheme.ok_or_else(|| malformed_header("missing SCHEME"))?,
        include_distances: include_distances.ok_or_else(|| malformed_header("missing DISTANCE/NODISTANCE"))?,
        include_angles: include_angles.ok_or_else(|| malformed_header("missing ANGLES/NOANGLES"))?,
        torsion_mode: torsion_mode.ok_or_else(|| malformed_header("missing PSEUDOTORSIONS/TRUETORSIONS"))?,
    })
}

fn malformed_header(detail: &str) -> ReportError {
    ReportError::Malformed {
        section: "HEADER",
        detail: detail.to_string(),
    }
}

fn parse_data(lines: &[String]) -> Result<Vec<(String, Vec<f64>)>, ReportError> {
    lines
        .iter()
        .map(|line| {
            let mut tokens = line.split_whitespace();
            let id = tokens
                .next()
                .ok_or_else(|| ReportError::Malformed {
                    section: "DATA",
                    detail: "empty row".to_string(),
                })?
                .to_string();
            let values: Vec<f64> = tokens
                .map(|t| t.parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|_| ReportError::Malformed {
                    section: "DATA",
                    detail: format!("non-numeric feature value on loop {id}"),
                })?;
            Ok((id, values))
        })
        .collect()
}

fn parse_assignment_section(name: &'static str, lines: &[String]) -> Result<Vec<(usize, String)>, ReportError> {
    lines
        .iter()
        .map(|line| {
            let mut tokens = line.split_whitespace();
            let cluster = tokens
                .next()
                .ok_or_else(|| ReportError::Malformed { section: name, detail: "empty row".into() })?
                .parse::<usize>()
                .map_err(|_| ReportError::Malformed { section: name, detail: "bad cluster id".into() })?;
            let loop_id = tokens
                .next()
                .ok_or_else(|| ReportError::Malformed { section: name, detail: "missing loop id".into() })?
                .to_string();
            Ok((cluster, loop_id))
        })
        .collect()
}

fn parse_median_section(name: &'static str, lines: &[String]) -> Result<Vec<(usize, String)>, ReportError> {
    // First line is the cluster count; remaining lines are `cluster-num loop-id`.
    if lines.is_empty() {
        return Err(ReportError::Malformed { section: name, detail: "missing cluster count".into() });
    }
    parse_assignment_section(name, &lines[1..])
}

/// Parse a full report. `HEADER`, `RAWASSIGNMENTS`, `RAWMEDIANS`,
/// `ASSIGNMENTS`, `MEDIANS` are mandatory; everything else is optional.
pub fn read_report(text: &str) -> Result<Report, ReportError> {
    let sections = split_sections(text)?;

    let header_lines = sections
        .get("HEADER")
        .ok_or(ReportError::MissingSection("HEADER"))?;
    let header = parse_header(header_lines)?;

    let data = sections.get("DATA").map(|lines| parse_data(lines)).transpose()?;

    let raw_assignments = parse_assignment_section(
        "RAWASSIGNMENTS",
        sections
            .get("RAWASSIGNMENTS")
            .ok_or(ReportError::MissingSection("RAWASSIGNMENTS"))?,
    )?;
    let raw_medians = parse_median_section(
        "RAWMEDIANS",
        sections
            .get("RAWMEDIANS")
            .ok_or(ReportError::MissingSection("RAWMEDIANS"))?,
    )?;
    let assignments = parse_assignment_section(
        "ASSIGNMENTS",
        sections
            .get("ASSIGNMENTS")
            .ok_or(ReportError::MissingSection("ASSIGNMENTS"))?,
    )?;
    let medians = parse_median_section(
        "MEDIANS",
        sections.get("MEDIANS").ok_or(ReportError::MissingSection("MEDIANS"))?,
    )?;

    Ok(Report {
        header,
        data,
        raw_assignments,
        raw_medians,
        assignments,
        medians,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Method;

    fn sample_header() -> ReportHeader {
        ReportHeader {
            method: Method::Ward,
            nloops: 3,
            postcluster: PostClusterGates {
                rms_cut: 1.0,
                ca_dev_cut: 1.5,
                cb_dev_cut: 1.9,
            },
            maxlength: 6,
            scheme: Scheme::default_for(6),
            include_distances: false,
            include_angles: false,
            torsion_mode: TorsionMode::Pseudo,
        }
    }

    #[test]
    fn round_trips_header_and_mandatory_sections() {
        let loop_ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let data = ReportData {
            header: sample_header(),
            loop_ids: &loop_ids,
            data: None,
            loop_lengths: None,
            dendogram_lines: None,
            raw_assignments: &[1, 1, 2],
            raw_medians: &[(1, "a".to_string()), (2, "c".to_string())],
            postcluster_merges: &[],
            assignments: &[1, 1, 2],
            medians: &[(1, "a".to_string()), (2, "c".to_string())],
            critical_residues: None,
        };

        let mut buf = Vec::new();
        write_report(&mut buf, &data).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let parsed = read_report(&text).unwrap();
        assert_eq!(parsed.header.nloops, 3);
        assert_eq!(parsed.header.method, Method::Ward);
        assert_eq!(parsed.assignments, vec![(1, "a".to_string()), (1, "b".to_string()), (2, "c".to_string())]);
        assert_eq!(parsed.medians, vec![(1, "a".to_string()), (2, "c".to_string())]);
    }

    #[test]
    fn missing_mandatory_section_is_rejected() {
        let text = "BEGIN HEADER\nMETHOD WARD\nEND HEADER\n";
        let err = read_report(text).unwrap_err();
        assert!(matches!(err, ReportError::MissingSection("RAWASSIGNMENTS")));
    }

    #[test]
    fn unmatched_end_is_malformed() {
        let text = "END HEADER\n";
        let err = read_report(text).unwrap_err();
        assert!(matches!(err, ReportError::Malformed { .. }));
    }

    #[test]
    fn data_section_round_trips_feature_matrix() {
        let loop_ids = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        let data = ReportData {
            header: sample_header(),
            loop_ids: &loop_ids,
            data: Some(&vectors),
            loop_lengths: None,
            dendogram_lines: None,
            raw_assignments: &[1, 2],
            raw_medians: &[(1, "a".to_string()), (2, "b".to_string())],
            postcluster_merges: &[],
            assignments: &[1, 2],
            medians: &[(1, "a".to_string()), (2, "b".to_string())],
            critical_residues: None,
        };
        let mut buf = Vec::new();
        write_report(&mut buf, &data).unwrap();
        let parsed = read_report(&String::from_utf8(buf).unwrap()).unwrap();
        let (ids, matrix) = parsed.feature_matrix().unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        assert!((matrix[0][0] - 0.1).abs() < 1e-6);
    }
}
