//! Decomposition of a REF/ALT pair into minimal, position-anchored edits.

use getset::CopyGetters;
use indexmap::IndexMap;
use log::debug;
use strum::Display;

use crate::align::{
    AlignerSelector, Alignment, AlignmentOperation, Scoring, DEFAULT_WAVEFRONT_THRESHOLD,
    MAX_ALIGNMENT_LENGTH,
};
use crate::cigar::{EditOp, EditScript};
use crate::error::{AlignmentError, Error};
use crate::record::{is_symbolic, Record, Variant};
use crate::repeat::{copies_after, copies_before, repeat_unit, MAX_REPEAT_PERIOD};

// never occurs in an allele, so padding only ever matches padding
const SENTINEL: u8 = b'Z';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AlleleKind {
    Identity,
    Substitution,
    Insertion,
    Deletion,
}

/// The tandem repeat an indel adds or removes copies of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepeatAnnotation {
    pub unit: String,
    pub ref_copies: usize,
    pub alt_copies: usize,
}

/// One edit between REF and one ALT.
///
/// `position` is 1-based; for an insertion it is the position of the
/// reference base the inserted sequence precedes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantAllele {
    pub position: u64,
    pub reference: String,
    pub alternate: String,
    pub repeat: Option<RepeatAnnotation>,
}

impl VariantAllele {
    pub fn kind(&self) -> AlleleKind {
        let (r, a) = (self.reference.len(), self.alternate.len());
        if self.reference == self.alternate {
            AlleleKind::Identity
        } else if r == a {
            AlleleKind::Substitution
        } else if r < a {
            AlleleKind::Insertion
        } else {
            AlleleKind::Deletion
        }
    }

    pub fn is_identity(&self) -> bool {
        self.kind() == AlleleKind::Identity
    }
}

/// Aligner settings used by a [`Decomposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DecomposeConfig {
    scoring: Scoring,
    wavefront_threshold: usize,
    max_repeat_period: usize,
}

impl DecomposeConfig {
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Alleles at least `threshold` long are aligned with the wavefront
    /// backend. The two backends can split the same pair into different
    /// primitive edits, so decompositions depend on this setting; the
    /// normalized record does not.
    pub fn with_wavefront_threshold(mut self, threshold: usize) -> Self {
        self.wavefront_threshold = threshold;
        self
    }

    pub fn with_max_repeat_period(mut self, period: usize) -> Self {
        self.max_repeat_period = period;
        self
    }
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        DecomposeConfig {
            scoring: Scoring::default(),
            wavefront_threshold: DEFAULT_WAVEFRONT_THRESHOLD,
            max_repeat_period: MAX_REPEAT_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    ref_off: usize,
    ref_len: usize,
    alt_off: usize,
    alt_len: usize,
    identity: bool,
    repeat: Option<RepeatAnnotation>,
}

impl Segment {
    fn identity(ref_off: usize, alt_off: usize, len: usize) -> Self {
        Segment {
            ref_off,
            ref_len: len,
            alt_off,
            alt_len: len,
            identity: true,
            repeat: None,
        }
    }

    fn edit(ref_off: usize, ref_len: usize, alt_off: usize, alt_len: usize) -> Self {
        Segment {
            ref_off,
            ref_len,
            alt_off,
            alt_len,
            identity: false,
            repeat: None,
        }
    }

    fn is_indel(&self) -> bool {
        !self.identity && (self.ref_len == 0) != (self.alt_len == 0)
    }
}

/// Splits REF/ALT pairs into [`VariantAllele`]s. Holds only immutable
/// configuration and can be shared between threads.
#[derive(Debug)]
pub struct Decomposer {
    config: DecomposeConfig,
    aligner: AlignerSelector,
}

impl Default for Decomposer {
    fn default() -> Self {
        Decomposer::new(DecomposeConfig::default())
    }
}

impl Decomposer {
    pub fn new(config: DecomposeConfig) -> Self {
        Decomposer {
            aligner: AlignerSelector::with_threshold(config.wavefront_threshold()),
            config,
        }
    }

    pub fn config(&self) -> &DecomposeConfig {
        &self.config
    }

    /// Edits turning `reference` into `alternate`, anchored at the 1-based
    /// `position` of the first REF base. Concatenating the `reference`
    /// (`alternate`) strings of the result gives back the inputs.
    pub fn decompose(
        &self,
        reference: &[u8],
        alternate: &[u8],
        position: u64,
    ) -> Result<VariantAlleles, AlignmentError> {
        if reference.is_empty() || alternate.is_empty() {
            return Err(AlignmentError::EmptyInput);
        }
        let segments = if reference == alternate {
            vec![Segment::identity(0, 0, reference.len())]
        } else {
            self.segments(reference, alternate)?
        };
        Ok(VariantAlleles {
            reference: reference.to_vec(),
            alternate: alternate.to_vec(),
            position,
            segments,
            next: 0,
        })
    }

    /// Decompose every ALT of `variant`. Symbolic ALTs are returned as a single
    /// edit spanning the whole REF.
    pub fn decompose_variant(
        &self,
        variant: &Variant,
    ) -> Result<IndexMap<String, Vec<VariantAllele>>, Error> {
        let reference = variant.ref_allele();
        let mut decomposed = IndexMap::with_capacity(variant.alt_alleles().len());
        for alt in variant.alt_alleles() {
            let alleles = if is_symbolic(alt) {
                vec![VariantAllele {
                    position: variant.pos(),
                    reference: reference.to_owned(),
                    alternate: alt.clone(),
                    repeat: None,
                }]
            } else {
                self.decompose(reference.as_bytes(), alt.as_bytes(), variant.pos())
                    .map_err(|e| Error::at_variant(variant.chrom(), variant.pos(), e))?
                    .collect()
            };
            decomposed.insert(alt.clone(), alleles);
        }
        Ok(decomposed)
    }

    fn segments(&self, reference: &[u8], alternate: &[u8]) -> Result<Vec<Segment>, AlignmentError> {
        let shorter = reference.len().min(alternate.len());
        let prefix = reference
            .iter()
            .zip(alternate)
            .take_while(|(r, a)| r == a)
            .count();
        let suffix = reference
            .iter()
            .rev()
            .zip(alternate.iter().rev())
            .take(shorter - prefix)
            .take_while(|(r, a)| r == a)
            .count();
        let ref_mid = &reference[prefix..reference.len() - suffix];
        let alt_mid = &alternate[prefix..alternate.len() - suffix];

        let mut segments = Vec::new();
        if prefix > 0 {
            segments.push(Segment::identity(0, 0, prefix));
        }
        if ref_mid.is_empty() || alt_mid.is_empty() {
            segments.push(Segment::edit(prefix, ref_mid.len(), prefix, alt_mid.len()));
        } else {
            let script = self.align(ref_mid, alt_mid)?;
            segments.extend(script_segments(&script, ref_mid, alt_mid, prefix));
        }
        if suffix > 0 {
            segments.push(Segment::identity(
                reference.len() - suffix,
                alternate.len() - suffix,
                suffix,
            ));
        }

        self.slide_repeats(&mut segments, reference, alternate);
        Ok(coalesce_identities(segments))
    }

    /// Align the differing middle of a pair. Both sides are flanked with
    /// sentinel bases so that a local alignment has to run end to end; if
    /// it does not, the unpadded alignment is closed off by
    /// [`EditScript::from_alignment`].
    fn align(&self, reference: &[u8], alternate: &[u8]) -> Result<EditScript, AlignmentError> {
        let scoring = self.config.scoring;
        let aligner = self.aligner.select(reference.len(), alternate.len());
        if scoring.match_score() > 0 {
            let gap = 2 * (scoring.gap_open() + scoring.gap_extend()).max(0) as usize
                + scoring.gap_extend().max(0) as usize * (reference.len() + alternate.len());
            let pad = gap / scoring.match_score() as usize + 2;
            if reference.len().max(alternate.len()) + 2 * pad <= MAX_ALIGNMENT_LENGTH {
                let padded_ref = padded(reference, pad);
                let padded_alt = padded(alternate, pad);
                let alignment = aligner.align(&padded_ref, &padded_alt, &scoring)?;
                if let Some(script) = strip_padding(&alignment, pad) {
                    return Ok(script);
                }
                debug!(
                    "padded alignment of {}/{} did not span the padding",
                    String::from_utf8_lossy(reference),
                    String::from_utf8_lossy(alternate)
                );
            }
        }
        let alignment = aligner.align(reference, alternate, &scoring)?;
        Ok(EditScript::from_alignment(&alignment, reference, alternate))
    }

    /// Slide indels that add or remove whole copies of a short tandem repeat
    /// to the start of the run, without crossing the preceding edit.
    fn slide_repeats(&self, segments: &mut Vec<Segment>, reference: &[u8], alternate: &[u8]) {
        let max_period = self.config.max_repeat_period;
        let mut i = 0;
        while i < segments.len() {
            if !segments[i].is_indel() {
                i += 1;
                continue;
            }
            let seg = &segments[i];
            let (ref_off, ref_len, alt_off, alt_len) =
                (seg.ref_off, seg.ref_len, seg.alt_off, seg.alt_len);
            let indel = if ref_len > 0 {
                &reference[ref_off..ref_off + ref_len]
            } else {
                &alternate[alt_off..alt_off + alt_len]
            };
            let unit = match repeat_unit(indel, max_period) {
                Some(unit) => unit.to_vec(),
                None => {
                    i += 1;
                    continue;
                }
            };
            let p = unit.len();
            let m = indel.len() / p;

            // whole units available to the left, bounded by the preceding identity
            let floor = match i.checked_sub(1).map(|j| &segments[j]) {
                Some(prev) if prev.identity => prev.ref_off,
                Some(_) => ref_off,
                None => ref_off,
            };
            let k = copies_before(&reference[floor..], ref_off - floor, &unit);
            let left = copies_before(reference, ref_off - k * p, &unit);
            let right = copies_after(reference, ref_off - k * p, &unit);
            let ref_copies = left + right;
            let has_copy = if ref_len > 0 { ref_copies > m } else { ref_copies > 0 };
            if !has_copy {
                i += 1;
                continue;
            }
            let alt_copies = if ref_len > 0 {
                ref_copies - m
            } else {
                ref_copies + m
            };
            segments[i].repeat = Some(RepeatAnnotation {
                unit: String::from_utf8_lossy(&unit).into_owned(),
                ref_copies,
                alt_copies,
            });
            if k == 0 {
                i += 1;
                continue;
            }

            let shift = k * p;
            debug!(
                "sliding {}-base indel left by {} across {} repeat",
                indel.len(),
                shift,
                String::from_utf8_lossy(&unit)
            );
            segments[i].ref_off -= shift;
            segments[i].alt_off -= shift;
            let prev = &mut segments[i - 1];
            prev.ref_len -= shift;
            prev.alt_len -= shift;
            let after = Segment::identity(ref_off - shift + ref_len, alt_off - shift + alt_len, shift);
            segments.insert(i + 1, after);
            if segments[i - 1].ref_len == 0 {
                segments.remove(i - 1);
            } else {
                i += 1;
            }
            i += 1;
        }
    }
}

fn padded(seq: &[u8], pad: usize) -> Vec<u8> {
    let mut padded = Vec::with_capacity(seq.len() + 2 * pad);
    padded.resize(pad, SENTINEL);
    padded.extend_from_slice(seq);
    padded.resize(seq.len() + 2 * pad, SENTINEL);
    padded
}

fn strip_padding(alignment: &Alignment, pad: usize) -> Option<EditScript> {
    let ops = &alignment.operations;
    let spans_all = alignment.ref_start == 0
        && alignment.alt_start == 0
        && alignment.ref_end == alignment.ref_len
        && alignment.alt_end == alignment.alt_len;
    if !spans_all || ops.len() < 2 * pad {
        return None;
    }
    let (head, rest) = ops.split_at(pad);
    let (middle, tail) = rest.split_at(rest.len() - pad);
    let all_match = |ops: &[AlignmentOperation]| ops.iter().all(|&op| op == AlignmentOperation::Match);
    if !all_match(head) || !all_match(tail) {
        return None;
    }
    let mut script = EditScript::new();
    for &op in middle {
        if let Some(op) = EditOp::from_alignment_op(op) {
            script.push(1, op);
        }
    }
    Some(script)
}

/// Turn a script over `reference`/`alternate` into segments offset by
/// `offset`. Matching columns become identity segments; every other run
/// becomes one edit.
fn script_segments(
    script: &EditScript,
    reference: &[u8],
    alternate: &[u8],
    offset: usize,
) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let (mut r, mut a) = (0, 0);
    let push = |segment: Segment, segments: &mut Vec<Segment>| match segments.last_mut() {
        Some(last) if last.identity && segment.identity => {
            last.ref_len += segment.ref_len;
            last.alt_len += segment.alt_len;
        }
        _ => segments.push(segment),
    };
    for element in script {
        let len = element.len as usize;
        match element.op {
            EditOp::Match | EditOp::Mismatch => {
                // classify columns by the bases themselves; the aligner
                // compares case-insensitively
                let mut column = 0;
                while column < len {
                    let same = reference[r + column] == alternate[a + column];
                    let run = (column..len)
                        .take_while(|&c| (reference[r + c] == alternate[a + c]) == same)
                        .count();
                    let (ro, ao) = (offset + r + column, offset + a + column);
                    let segment = if same {
                        Segment::identity(ro, ao, run)
                    } else {
                        Segment::edit(ro, run, ao, run)
                    };
                    push(segment, &mut segments);
                    column += run;
                }
                r += len;
                a += len;
            }
            EditOp::Insertion => {
                push(Segment::edit(offset + r, 0, offset + a, len), &mut segments);
                a += len;
            }
            EditOp::Deletion => {
                push(Segment::edit(offset + r, len, offset + a, 0), &mut segments);
                r += len;
            }
        }
    }
    segments
}

fn coalesce_identities(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.ref_len == 0 && segment.alt_len == 0 {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.identity && segment.identity => {
                last.ref_len += segment.ref_len;
                last.alt_len += segment.alt_len;
            }
            _ => out.push(segment),
        }
    }
    out
}

/// Lazily materialized result of [`Decomposer::decompose`]. A clone taken
/// before iterating replays the same edits.
#[derive(Debug, Clone)]
pub struct VariantAlleles {
    reference: Vec<u8>,
    alternate: Vec<u8>,
    position: u64,
    segments: Vec<Segment>,
    next: usize,
}

impl Iterator for VariantAlleles {
    type Item = VariantAllele;

    fn next(&mut self) -> Option<Self::Item> {
        let segment = self.segments.get(self.next)?;
        self.next += 1;
        Some(VariantAllele {
            position: self.position + segment.ref_off as u64,
            reference: String::from_utf8_lossy(
                &self.reference[segment.ref_off..segment.ref_off + segment.ref_len],
            )
            .into_owned(),
            alternate: String::from_utf8_lossy(
                &self.alternate[segment.alt_off..segment.alt_off + segment.alt_len],
            )
            .into_owned(),
            repeat: segment.repeat.clone(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.segments.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for VariantAlleles {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use super::*;
    use crate::types::Header;

    fn decompose(reference: &str, alternate: &str, position: u64) -> Vec<VariantAllele> {
        Decomposer::default()
            .decompose(reference.as_bytes(), alternate.as_bytes(), position)
            .unwrap()
            .collect()
    }

    fn summary(alleles: &[VariantAllele]) -> Vec<(u64, &str, &str)> {
        alleles
            .iter()
            .map(|a| (a.position, a.reference.as_str(), a.alternate.as_str()))
            .collect()
    }

    #[test]
    fn test_identity() {
        let alleles = decompose("ACGT", "ACGT", 7);
        assert_eq!(summary(&alleles), vec![(7, "ACGT", "ACGT")]);
        assert!(alleles[0].is_identity());
        assert!(alleles[0].repeat.is_none());
    }

    #[test]
    fn test_deletion_with_flanks() {
        let alleles = decompose("GATTACA", "GACA", 50);
        assert_eq!(
            summary(&alleles),
            vec![(50, "GA", "GA"), (52, "TTA", ""), (55, "CA", "CA")]
        );
        assert_eq!(alleles[1].kind(), AlleleKind::Deletion);
        assert!(alleles[1].repeat.is_none());
    }

    #[test]
    fn test_homopolymer_insertion_slides_to_run_start() {
        let alleles = decompose("CAAAT", "CAAAAT", 100);
        assert_eq!(
            summary(&alleles),
            vec![(100, "C", "C"), (101, "", "A"), (101, "AAAT", "AAAT")]
        );
        assert_eq!(
            alleles[1].repeat,
            Some(RepeatAnnotation {
                unit: "A".into(),
                ref_copies: 3,
                alt_copies: 4
            })
        );
    }

    #[test]
    fn test_dinucleotide_deletion_slides() {
        let alleles = decompose("GCACACAT", "GCACAT", 10);
        assert_eq!(
            summary(&alleles),
            vec![(10, "G", "G"), (11, "CA", ""), (13, "CACAT", "CACAT")]
        );
        let repeat = alleles[1].repeat.as_ref().unwrap();
        assert_eq!((repeat.ref_copies, repeat.alt_copies), (3, 2));
    }

    #[test]
    fn test_substitution_in_middle() {
        let alleles = decompose("ACGT", "AGGT", 1);
        assert_eq!(
            summary(&alleles),
            vec![(1, "A", "A"), (2, "C", "G"), (3, "GT", "GT")]
        );
        assert_eq!(alleles[1].kind(), AlleleKind::Substitution);
    }

    #[test]
    fn test_reconstruction() {
        let pairs = [
            ("GATTACA", "GACA"),
            ("A", "ACGTACGT"),
            ("ACGTTTGA", "TCGTGA"),
            ("TTTTTTTTTTGC", "TTTTTTTTGC"),
            ("ACGGTCAGGTTACC", "ACGTCAGGGTTAC"),
            ("AC", "GT"),
            ("acgt", "ACGT"),
        ];
        for (reference, alternate) in pairs {
            let alleles = decompose(reference, alternate, 1);
            let r: String = alleles.iter().map(|a| a.reference.as_str()).collect();
            let a: String = alleles.iter().map(|a| a.alternate.as_str()).collect();
            assert_eq!((r.as_str(), a.as_str()), (reference, alternate));
            // consecutive entries tile the reference
            for (x, y) in alleles.iter().tuple_windows() {
                assert_eq!(x.position + x.reference.len() as u64, y.position);
            }
        }
    }

    #[test]
    fn test_case_difference_is_an_edit() {
        let alleles = decompose("acgt", "ACGT", 1);
        assert_eq!(summary(&alleles), vec![(1, "acgt", "ACGT")]);
    }

    #[test]
    fn test_long_alleles_use_wavefront() {
        let decomposer =
            Decomposer::new(DecomposeConfig::default().with_wavefront_threshold(8));
        let reference = "ACGTTGCAAGGCTTAGCTAGG";
        let alternate = "ACGTTGCAGGCTTAGCTTTAGG";
        let alleles = decomposer
            .decompose(reference.as_bytes(), alternate.as_bytes(), 1)
            .unwrap()
            .collect_vec();
        let r: String = alleles.iter().map(|a| a.reference.as_str()).collect();
        let a: String = alleles.iter().map(|a| a.alternate.as_str()).collect();
        assert_eq!((r.as_str(), a.as_str()), (reference, alternate));
    }

    #[test]
    fn test_iterator_is_exact_and_replayable() {
        let alleles = Decomposer::default()
            .decompose(b"GATTACA", b"GACA", 50)
            .unwrap();
        assert_eq!(alleles.len(), 3);
        let replay = alleles.clone();
        assert_eq!(alleles.collect_vec(), replay.collect_vec());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            Decomposer::default().decompose(b"", b"A", 1).unwrap_err(),
            AlignmentError::EmptyInput
        );
    }

    #[test]
    fn test_decompose_variant_passes_symbolic_through() {
        let header = Arc::new(Header::new());
        let variant = Variant::new(header, "1", 10, "CAAAT", &["CAAAAT", "<DEL>"]);
        let decomposed = Decomposer::default().decompose_variant(&variant).unwrap();
        assert_eq!(decomposed.keys().collect_vec(), vec!["CAAAAT", "<DEL>"]);
        assert_eq!(decomposed["CAAAAT"].len(), 3);
        assert_eq!(
            summary(&decomposed["<DEL>"]),
            vec![(10, "CAAAT", "<DEL>")]
        );
    }
}
