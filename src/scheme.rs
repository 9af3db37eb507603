//! Canonical length scheme: the slot-to-length-threshold table that lets
//! loops of different lengths share feature-vector coordinates.
//!
//! Grounded in `spec.md` §3/§4.1/§9 and `original_source/acaca.c`'s
//! `CreateDefaultScheme`: the default scheme counts up from the N-terminus
//! on odd slots and from the C-terminus on even slots (`1,3,5,…,6,4,2`).

use crate::error::ControlFileError;
use std::path::Path;

/// `scheme[i]` = minimum loop length at which slot `i` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub thresholds: Vec<usize>,
}

impl Scheme {
    pub fn max_length(&self) -> usize {
        self.thresholds.len()
    }

    /// Build the default scheme for a given `L_max`, reproducing
    /// `CreateDefaultScheme`: slot `i` (0-based) gets threshold `i+1` if `i`
    /// is even (N-terminal count), else the mirrored C-terminal count.
    ///
    /// For `L_max` slots, half count up from the front (1, 3, 5, …) and the
    /// other half count down mirrored from the back (…, 6, 4, 2), so that
    /// `scheme[i] <= l` fires from both ends symmetrically as `l` grows.
    pub fn default_for(l_max: usize) -> Self {
        let mut thresholds = vec![0usize; l_max];
        let half = l_max.div_ceil(2);
        for i in 0..half {
            thresholds[i] = 2 * i + 1;
        }
        for i in half..l_max {
            let mirror = l_max - 1 - i;
            thresholds[i] = thresholds[mirror] + 1;
        }
        Scheme { thresholds }
    }

    pub fn from_values(values: Vec<usize>) -> Self {
        Scheme { thresholds: values }
    }

    /// For a loop of actual length `len`, decide which slots are filled and
    /// from which end, per the slot-filling rule in `spec.md` §4.1 and
    /// `original_source/acaca.c`'s `ConvertData`.
    ///
    /// Both passes stop at the *first* slot whose threshold exceeds `len`
    /// (a `for`-loop break, not a full scan) — the default scheme's
    /// thresholds increase monotonically in from each end, so this fills a
    /// genuine prefix/suffix of slots from either side, leaving the middle
    /// untouched as `DUMMY`, with no overlap between the two passes.
    ///
    /// Returns, for each filled slot index, `(slot, loop_position)` where
    /// `loop_position` is 0-based counted from the N-terminus.
    pub fn filled_slots(&self, len: usize) -> Vec<(usize, usize)> {
        let l_max = self.max_length();
        let mut out = Vec::new();

        let mut n_count = 0usize;
        while n_count < l_max && self.thresholds[n_count] <= len {
            out.push((n_count, n_count));
            n_count += 1;
        }

        if len > 0 {
            let mut count = l_max as isize - 1;
            let mut pos = len as isize - 1;
            while count >= 0 && self.thresholds[count as usize] <= len {
                let slot = count as usize;
                // The two passes can both reach the same slot once `len`
                // approaches `l_max` (as in the original C `for`-loops, which
                // likewise re-visit and overwrite with the same value); keep
                // a single entry per slot.
                if !out.iter().any(|&(s, _)| s == slot) {
                    out.push((slot, pos as usize));
                }
                count -= 1;
                pos -= 1;
            }
        }
        out
    }
}

/// Parse a `SCHEME` directive's integer arguments into a [`Scheme`],
/// validating against an optional `MAXLENGTH` already seen.
pub fn parse_scheme_args(
    path: &Path,
    line: usize,
    args: &[&str],
) -> Result<Scheme, ControlFileError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        let v: usize = a.parse().map_err(|_| ControlFileError::BadResidueSpec {
            path: path.to_path_buf(),
            line,
            spec: (*a).to_string(),
        })?;
        values.push(v);
    }
    Ok(Scheme::from_values(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheme_matches_documented_pattern_for_six() {
        // spec.md: "1,3,5,...,6,4,2" — for L_max=6 that's 1,3,5,6,4,2
        let s = Scheme::default_for(6);
        assert_eq!(s.thresholds, vec![1, 3, 5, 6, 4, 2]);
    }

    #[test]
    fn minimum_length_loop_fills_only_lowest_threshold_slots() {
        let s = Scheme::default_for(6);
        let filled = s.filled_slots(1);
        // Only slots whose threshold <= 1 are filled: slot 0 (threshold 1).
        assert_eq!(filled, vec![(0, 0)]);
    }

    #[test]
    fn maximum_length_loop_fills_every_slot() {
        let s = Scheme::default_for(6);
        let filled = s.filled_slots(6);
        assert_eq!(filled.len(), 6);
        let mut slots: Vec<usize> = filled.iter().map(|&(s, _)| s).collect();
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn middle_slots_stay_dummy_for_intermediate_length() {
        let s = Scheme::default_for(6);
        let filled = s.filled_slots(3);
        let slots: Vec<usize> = filled.iter().map(|&(s, _)| s).collect();
        // thresholds are [1,3,5,6,4,2]; len=3 fills slots with threshold<=3: 0,1,5
        let mut sorted = slots.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 5]);
    }
}
