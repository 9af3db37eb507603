//! Control-file grammar: the clustering tool's job description (`spec.md`
//! §6.1). Parses a line-oriented directive script into a [`ClusterConfig`].
//!
//! Grounded in `original_source/acaca.c`'s `ProcessCommandLine`/`ReadControlFile`
//! equivalent directive dispatch and `original_source/clan.c`'s residue
//! specifier parsing (`ParseResSpec`): chain, sequence number, insertion
//! code, e.g. `L48`, `H100A`. Directive keywords are matched
//! case-insensitively and `#` starts a comment, consistent with the rest of
//! the ACACA toolchain's scripts.

use crate::error::ControlFileError;
use crate::features::TorsionMode;
use crate::residue::ResidueId;
use crate::scheme::{parse_scheme_args, Scheme};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Ward,
    Single,
    Complete,
    Average,
    McQuitty,
    Median,
    Centroid,
}

impl Method {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "ward" | "1" => Some(Method::Ward),
            "single" | "2" => Some(Method::Single),
            "complete" | "3" => Some(Method::Complete),
            "average" | "4" => Some(Method::Average),
            "mcquitty" | "5" => Some(Method::McQuitty),
            "median" | "6" => Some(Method::Median),
            "centroid" | "7" => Some(Method::Centroid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSpec {
    pub file: PathBuf,
    pub first: ResidueId,
    pub last: ResidueId,
}

impl LoopSpec {
    /// Stable identifier used for duplicate detection and reporting:
    /// `file:first-last`.
    pub fn id(&self) -> String {
        format!("{}:{}-{}", self.file.display(), self.first, self.last)
    }
}

#[derive(Debug, Clone)]
pub struct PostClusterGates {
    pub rms_cut: f64,
    pub ca_dev_cut: f64,
    pub cb_dev_cut: f64,
}

impl Default for PostClusterGates {
    fn default() -> Self {
        // A zero cutoff disables the gate (spec.md §4.5).
        PostClusterGates {
            rms_cut: 0.0,
            ca_dev_cut: 0.0,
            cb_dev_cut: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sections {
    pub dendogram: bool,
    pub table: bool,
    pub data: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Sections {
            dendogram: false,
            table: false,
            data: false,
        }
    }
}

/// The full algorithmic configuration for one clustering run, built from the
/// control file. Distinct from [`crate::config::RunConfig`], which carries
/// only ambient run concerns (logging, limits).
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub method: Method,
    pub loops: Vec<LoopSpec>,
    pub exclude: Vec<LoopSpec>,
    pub output: Option<PathBuf>,
    pub max_length: usize,
    pub scheme: Scheme,
    pub sections: Sections,
    pub postcluster: PostClusterGates,
    pub critical_residues: bool,
    pub include_distances: bool,
    pub include_angles: bool,
    pub torsion_mode: TorsionMode,
    pub infolevel: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let max_length = 6;
        ClusterConfig {
            method: Method::Ward,
            loops: Vec::new(),
            exclude: Vec::new(),
            output: None,
            max_length,
            scheme: Scheme::default_for(max_length),
            sections: Sections::default(),
            postcluster: PostClusterGates::default(),
            critical_residues: false,
            include_distances: false,
            include_angles: false,
            torsion_mode: TorsionMode::Pseudo,
            infolevel: 0,
        }
    }
}

fn residue_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<chain>[A-Za-z0-9])(?P<seq>-?\d+)(?P<ins>[A-Za-z ]?)$").unwrap())
}

/// Parse a residue specifier `C####I` (chain, sequence number, optional
/// insertion code), e.g. `L48`, `H100A`.
pub fn parse_residue_spec(
    path: &Path,
    line: usize,
    spec: &str,
) -> Result<ResidueId, ControlFileError> {
    let caps = residue_spec_re()
        .captures(spec)
        .ok_or_else(|| ControlFileError::BadResidueSpec {
            path: path.to_path_buf(),
            line,
            spec: spec.to_string(),
        })?;
    let chain = caps["chain"].chars().next().unwrap();
    let seqnum: i32 = caps["seq"].parse().map_err(|_| ControlFileError::BadResidueSpec {
        path: path.to_path_buf(),
        line,
        spec: spec.to_string(),
    })?;
    let insert = caps["ins"].chars().next().unwrap_or(' ');
    Ok(ResidueId::new(chain, seqnum, insert))
}

/// Parse a control file into a [`ClusterConfig`].
pub fn parse_control_file(path: &Path, text: &str) -> Result<ClusterConfig, ControlFileError> {
    let mut cfg = ClusterConfig::default();
    let mut maxlength_seen = false;
    let mut scheme_seen = false;
    let mut seen_ids = std::collections::HashSet::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let directive = tokens.next().unwrap();
        let args: Vec<&str> = tokens.collect();

        match directive.to_ascii_uppercase().as_str() {
            "METHOD" => {
                require_args(path, line_no, "METHOD", "1", &args)?;
                cfg.method = Method::parse(args[0]).ok_or_else(|| ControlFileError::BadResidueSpec {
                    path: path.to_path_buf(),
                    line: line_no,
                    spec: args[0].to_string(),
                })?;
            }
            "LOOP" => {
                require_args(path, line_no, "LOOP", "3", &args)?;
                let spec = LoopSpec {
                    file: PathBuf::from(args[0]),
                    first: parse_residue_spec(path, line_no, args[1])?,
                    last: parse_residue_spec(path, line_no, args[2])?,
                };
                let id = spec.id();
                if !seen_ids.insert(id.clone()) {
                    return Err(ControlFileError::DuplicateLoop(id));
                }
                cfg.loops.push(spec);
            }
            "EXCLUDE" => {
                require_args(path, line_no, "EXCLUDE", "3", &args)?;
                cfg.exclude.push(LoopSpec {
                    file: PathBuf::from(args[0]),
                    first: parse_residue_spec(path, line_no, args[1])?,
                    last: parse_residue_spec(path, line_no, args[2])?,
                });
            }
            "OUTPUT" => {
                require_args(path, line_no, "OUTPUT", "1", &args)?;
                cfg.output = Some(PathBuf::from(args[0]));
            }
            "MAXLENGTH" => {
                require_args(path, line_no, "MAXLENGTH", "1", &args)?;
                let l: usize = args[0].parse().map_err(|_| ControlFileError::BadResidueSpec {
                    path: path.to_path_buf(),
                    line: line_no,
                    spec: args[0].to_string(),
                })?;
                cfg.max_length = l;
                maxlength_seen = true;
                if !scheme_seen {
                    cfg.scheme = Scheme::default_for(l);
                }
            }
            "SCHEME" => {
                let scheme = parse_scheme_args(path, line_no, &args)?;
                if maxlength_seen && scheme.max_length() != cfg.max_length {
                    return Err(ControlFileError::SchemeLengthMismatch {
                        maxlength: cfg.max_length,
                        scheme_len: scheme.max_length(),
                    });
                }
                cfg.max_length = scheme.max_length();
                cfg.scheme = scheme;
                scheme_seen = true;
            }
            "DENDOGRAM" => cfg.sections.dendogram = true,
            "TABLE" => cfg.sections.table = true,
            "DATA" => cfg.sections.data = true,
            "POSTCLUSTER" => {
                if args.is_empty() || args.len() > 3 {
                    return Err(ControlFileError::ArgCount {
                        path: path.to_path_buf(),
                        line: line_no,
                        directive: "POSTCLUSTER",
                        expected: "1-3",
                        got: args.len(),
                    });
                }
                cfg.postcluster.rms_cut = parse_f64(path, line_no, args[0])?;
                if let Some(a) = args.get(1) {
                    cfg.postcluster.ca_dev_cut = parse_f64(path, line_no, a)?;
                }
                if let Some(a) = args.get(2) {
                    cfg.postcluster.cb_dev_cut = parse_f64(path, line_no, a)?;
                }
            }
            "CRITICALRESIDUES" => cfg.critical_residues = true,
            "DISTANCE" => cfg.include_distances = true,
            "NODISTANCE" => cfg.include_distances = false,
            "ANGLE" => cfg.include_angles = true,
            "NOANGLE" => cfg.include_angles = false,
            "TRUETORSIONS" => cfg.torsion_mode = TorsionMode::True,
            "PSEUDOTORSIONS" => cfg.torsion_mode = TorsionMode::Pseudo,
            "INFOLEVEL" => {
                require_args(path, line_no, "INFOLEVEL", "1", &args)?;
                cfg.infolevel = parse_f64(path, line_no, args[0])? as usize;
            }
            other => {
                return Err(ControlFileError::UnknownDirective {
                    path: path.to_path_buf(),
                    line: line_no,
                    directive: other.to_string(),
                })
            }
        }
    }

    Ok(cfg)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn require_args(
    path: &Path,
    line: usize,
    directive: &'static str,
    expected: &'static str,
    args: &[&str],
) -> Result<(), ControlFileError> {
    let want: usize = expected.parse().unwrap_or(0);
    if args.len() != want {
        return Err(ControlFileError::ArgCount {
            path: path.to_path_buf(),
            line,
            directive,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn parse_f64(path: &Path, line: usize, tok: &str) -> Result<f64, ControlFileError> {
    tok.parse().map_err(|_| ControlFileError::BadResidueSpec {
        path: path.to_path_buf(),
        line,
        spec: tok.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chain_seq_and_insert() {
        let p = Path::new("x.clan");
        assert_eq!(
            parse_residue_spec(p, 1, "L48").unwrap(),
            ResidueId::new('L', 48, ' ')
        );
        assert_eq!(
            parse_residue_spec(p, 1, "H100A").unwrap(),
            ResidueId::new('H', 100, 'A')
        );
    }

    #[test]
    fn minimal_control_file_parses_method_and_loop() {
        let text = "\
# a comment
METHOD ward
LOOP loop1.pdb L48 L54
DENDOGRAM
CRITICALRESIDUES
";
        let cfg = parse_control_file(Path::new("c.clan"), text).unwrap();
        assert_eq!(cfg.method, Method::Ward);
        assert_eq!(cfg.loops.len(), 1);
        assert!(cfg.sections.dendogram);
        assert!(cfg.critical_residues);
    }

    #[test]
    fn duplicate_loop_id_is_rejected() {
        let text = "\
LOOP loop1.pdb L48 L54
LOOP loop1.pdb L48 L54
";
        let err = parse_control_file(Path::new("c.clan"), text).unwrap_err();
        assert!(matches!(err, ControlFileError::DuplicateLoop(_)));
    }

    #[test]
    fn maxlength_scheme_mismatch_is_rejected() {
        let text = "\
MAXLENGTH 6
SCHEME 1 3 5 7
";
        let err = parse_control_file(Path::new("c.clan"), text).unwrap_err();
        assert!(matches!(err, ControlFileError::SchemeLengthMismatch { .. }));
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let text = "BOGUS 1\n";
        let err = parse_control_file(Path::new("c.clan"), text).unwrap_err();
        assert!(matches!(err, ControlFileError::UnknownDirective { .. }));
    }

    #[test]
    fn directive_keywords_are_case_insensitive() {
        let text = "method Ward\nloop loop1.pdb L48 L54\n";
        let cfg = parse_control_file(Path::new("c.clan"), text).unwrap();
        assert_eq!(cfg.method, Method::Ward);
    }
}
