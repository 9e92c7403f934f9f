//! Gap-affine wavefront alignment (WFA).
//!
//! Global alignment whose running time grows with the alignment penalty
//! rather than with the product of the sequence lengths, which keeps long
//! and mostly identical alleles cheap. Scores are converted to penalties
//! with `x = 2(a + b)`, `o = 2g`, `e = 2h + a` (match `a`, mismatch `b`,
//! gap open `g`, gap extend `h`), which preserves the optimal path.

use super::{bases_match, check_inputs, Aligner, Alignment, AlignmentOperation, Scoring};
use crate::error::AlignmentError;

const NONE: i32 = i32::MIN / 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct WavefrontAligner;

#[derive(Debug, Clone, Copy)]
struct Penalties {
    mismatch: usize,
    open_extend: usize,
    extend: usize,
}

impl From<&Scoring> for Penalties {
    fn from(scoring: &Scoring) -> Self {
        let a = scoring.match_score().max(0) as usize;
        let b = scoring.mismatch().max(0) as usize;
        let g = scoring.gap_open().max(0) as usize;
        let h = scoring.gap_extend().max(0) as usize;
        Penalties {
            mismatch: (2 * (a + b)).max(1),
            open_extend: (2 * g + 2 * h + a).max(1),
            extend: (2 * h + a).max(1),
        }
    }
}

/// Offsets (position in ALT) per diagonal `k = h - v` for one score.
#[derive(Debug, Clone)]
struct Wavefront {
    lo: i32,
    hi: i32,
    m: Vec<i32>,
    i: Vec<i32>,
    d: Vec<i32>,
}

impl Wavefront {
    fn new(lo: i32, hi: i32) -> Self {
        let len = (hi - lo + 1) as usize;
        Wavefront {
            lo,
            hi,
            m: vec![NONE; len],
            i: vec![NONE; len],
            d: vec![NONE; len],
        }
    }

    fn index(&self, k: i32) -> Option<usize> {
        if k < self.lo || k > self.hi {
            None
        } else {
            Some((k - self.lo) as usize)
        }
    }
}

struct Wavefronts {
    fronts: Vec<Option<Wavefront>>,
}

#[derive(Clone, Copy)]
enum Component {
    M,
    I,
    D,
}

impl Wavefronts {
    fn get(&self, score: isize, component: Component, k: i32) -> i32 {
        if score < 0 {
            return NONE;
        }
        match self.fronts.get(score as usize).and_then(Option::as_ref) {
            Some(wf) => match wf.index(k) {
                Some(idx) => match component {
                    Component::M => wf.m[idx],
                    Component::I => wf.i[idx],
                    Component::D => wf.d[idx],
                },
                None => NONE,
            },
            None => NONE,
        }
    }

    fn bounds(&self, score: isize) -> Option<(i32, i32)> {
        if score < 0 {
            return None;
        }
        self.fronts
            .get(score as usize)
            .and_then(Option::as_ref)
            .map(|wf| (wf.lo, wf.hi))
    }
}

fn extend(wf: &mut Wavefront, reference: &[u8], alternate: &[u8]) {
    let (n, m) = (reference.len() as i32, alternate.len() as i32);
    for k in wf.lo..=wf.hi {
        let idx = (k - wf.lo) as usize;
        let mut h = wf.m[idx];
        if h < 0 {
            continue;
        }
        let mut v = h - k;
        while v < n && h < m && bases_match(reference[v as usize], alternate[h as usize]) {
            h += 1;
            v += 1;
        }
        wf.m[idx] = h;
    }
}

fn valid(h: i32, k: i32, n: i32, m: i32) -> i32 {
    if h < 0 || h > m || h - k < 0 || h - k > n {
        NONE
    } else {
        h
    }
}

impl Aligner for WavefrontAligner {
    fn align(
        &self,
        reference: &[u8],
        alternate: &[u8],
        scoring: &Scoring,
    ) -> Result<Alignment, AlignmentError> {
        check_inputs(reference, alternate, scoring)?;
        let p = Penalties::from(scoring);
        let (n, m) = (reference.len() as i32, alternate.len() as i32);
        let k_end = m - n;

        let mut wfs = Wavefronts { fronts: Vec::new() };
        let mut initial = Wavefront::new(0, 0);
        initial.m[0] = 0;
        extend(&mut initial, reference, alternate);
        wfs.fronts.push(Some(initial));

        let mut score = 0isize;
        while wfs.get(score, Component::M, k_end) < m {
            score += 1;
            let sources = [
                wfs.bounds(score - p.mismatch as isize),
                wfs.bounds(score - p.open_extend as isize),
                wfs.bounds(score - p.extend as isize),
            ];
            let (lo, hi) = match sources.iter().flatten().fold(None, |acc, &(lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((i32::min(a, lo), i32::max(b, hi))),
            }) {
                Some(bounds) => bounds,
                None => {
                    wfs.fronts.push(None);
                    continue;
                }
            };
            let (lo, hi) = ((lo - 1).max(-n), (hi + 1).min(m));
            let mut wf = Wavefront::new(lo, hi);
            let s_x = score - p.mismatch as isize;
            let s_oe = score - p.open_extend as isize;
            let s_e = score - p.extend as isize;
            for k in lo..=hi {
                let idx = (k - lo) as usize;
                let ins = wfs
                    .get(s_oe, Component::M, k - 1)
                    .max(wfs.get(s_e, Component::I, k - 1))
                    + 1;
                let del = wfs
                    .get(s_oe, Component::M, k + 1)
                    .max(wfs.get(s_e, Component::D, k + 1));
                let sub = wfs.get(s_x, Component::M, k) + 1;
                let ins = valid(ins, k, n, m);
                let del = valid(del, k, n, m);
                let sub = valid(sub, k, n, m);
                wf.i[idx] = ins;
                wf.d[idx] = del;
                wf.m[idx] = sub.max(ins).max(del);
            }
            extend(&mut wf, reference, alternate);
            wfs.fronts.push(Some(wf));
        }

        let operations = backtrace(&wfs, &p, score, k_end, reference, alternate);
        Ok(Alignment {
            score: -(score as i32),
            ref_start: 0,
            ref_end: reference.len(),
            alt_start: 0,
            alt_end: alternate.len(),
            ref_len: reference.len(),
            alt_len: alternate.len(),
            operations,
        })
    }
}

fn backtrace(
    wfs: &Wavefronts,
    p: &Penalties,
    mut score: isize,
    mut k: i32,
    reference: &[u8],
    alternate: &[u8],
) -> Vec<AlignmentOperation> {
    let mut ops = Vec::new();
    let mut component = Component::M;
    let mut h = wfs.get(score, Component::M, k);
    loop {
        match component {
            Component::M => {
                if score == 0 {
                    ops.extend(std::iter::repeat(AlignmentOperation::Match).take(h as usize));
                    break;
                }
                let sub = valid(
                    wfs.get(score - p.mismatch as isize, Component::M, k) + 1,
                    k,
                    reference.len() as i32,
                    alternate.len() as i32,
                );
                let ins = wfs.get(score, Component::I, k);
                let del = wfs.get(score, Component::D, k);
                let start = sub.max(ins).max(del);
                ops.extend(std::iter::repeat(AlignmentOperation::Match).take((h - start) as usize));
                h = start;
                // substitutions first so that gaps end up as far left as possible
                if sub == start {
                    let v = (h - 1 - k) as usize;
                    ops.push(if bases_match(reference[v], alternate[(h - 1) as usize]) {
                        AlignmentOperation::Match
                    } else {
                        AlignmentOperation::Subst
                    });
                    h -= 1;
                    score -= p.mismatch as isize;
                } else if ins == start {
                    component = Component::I;
                } else {
                    component = Component::D;
                }
            }
            Component::I => {
                ops.push(AlignmentOperation::Ins);
                let extend = wfs.get(score - p.extend as isize, Component::I, k - 1) + 1;
                h -= 1;
                k -= 1;
                if extend == h + 1 {
                    score -= p.extend as isize;
                } else {
                    score -= p.open_extend as isize;
                    component = Component::M;
                }
            }
            Component::D => {
                ops.push(AlignmentOperation::Del);
                let extend = wfs.get(score - p.extend as isize, Component::D, k + 1);
                k += 1;
                if extend == h {
                    score -= p.extend as isize;
                } else {
                    score -= p.open_extend as isize;
                    component = Component::M;
                }
            }
        }
    }
    ops.reverse();
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::tests::consumed;
    use AlignmentOperation::*;

    #[test]
    fn test_identical() {
        let aln = WavefrontAligner
            .align(b"GATTACA", b"GATTACA", &Scoring::default())
            .unwrap();
        assert_eq!(aln.operations, vec![Match; 7]);
        assert_eq!(aln.score, 0);
    }

    #[test]
    fn test_single_mismatch() {
        let aln = WavefrontAligner
            .align(b"GATTACA", b"GATCACA", &Scoring::default())
            .unwrap();
        assert_eq!(
            aln.operations,
            vec![Match, Match, Match, Subst, Match, Match, Match]
        );
    }

    #[test]
    fn test_long_deletion_consumes_everything() {
        let reference = b"ACGTACGTTTTTTTTTTTTTTTTTTTTGGCCAAT";
        let alternate = b"ACGTACGTGGCCAAT";
        let aln = WavefrontAligner
            .align(reference, alternate, &Scoring::default())
            .unwrap();
        assert_eq!(consumed(&aln.operations), (reference.len(), alternate.len()));
        assert_eq!(aln.operations.iter().filter(|&&op| op == Del).count(), 19);
        assert!(aln.operations.iter().all(|&op| op != Ins && op != Subst));
    }

    #[test]
    fn test_free_gaps_still_terminate() {
        let aln = WavefrontAligner
            .align(b"ACGT", b"ACGTTT", &Scoring::new(0, 4, 0, 0))
            .unwrap();
        assert_eq!(consumed(&aln.operations), (4, 6));
        assert_eq!(aln.operations.iter().filter(|&&op| op == Ins).count(), 2);
        assert!(aln.operations.iter().all(|&op| op != Del));
        assert!(matches!(
            WavefrontAligner.align(b"ACGT", b"ACGTTT", &Scoring::new(-1, 4, 0, 0)),
            Err(AlignmentError::InvalidScoring(_))
        ));
    }

    #[test]
    fn test_insertion_and_mismatch() {
        let reference = b"CCCCAGGGGTTTT";
        let alternate = b"CCCCAGGGTGGTTTA";
        let aln = WavefrontAligner
            .align(reference, alternate, &Scoring::default())
            .unwrap();
        assert_eq!(consumed(&aln.operations), (reference.len(), alternate.len()));
    }
}
