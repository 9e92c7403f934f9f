//! Left-alignment and trimming of records to their canonical VCF form.
//!
//! Every literal ALT is decomposed against REF. A lone insertion or deletion
//! is slid left base by base while the sequence allows it and then written
//! with the preceding base as anchor; any other combination of edits is
//! trimmed to the span between its first and last edit. The ALTs of one
//! record are finally re-expressed over the union of their spans so that
//! they share POS and REF.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::{debug, warn};

use crate::align::bases_match;
use crate::allele::{AlleleKind, Decomposer, VariantAllele};
use crate::error::{AnchorUnderflowError, Error};
use crate::record::{Record, Variant};
use crate::repeat::{
    slide_deletion_left, slide_deletion_right, slide_insertion_left, slide_insertion_right,
};

/// Whole-contig sequences by name.
pub trait ReferenceSource {
    fn sequence(&self, chrom: &str) -> Option<&[u8]>;
}

impl ReferenceSource for HashMap<String, Vec<u8>> {
    fn sequence(&self, chrom: &str) -> Option<&[u8]> {
        self.get(chrom).map(Vec::as_slice)
    }
}

impl ReferenceSource for IndexMap<String, Vec<u8>> {
    fn sequence(&self, chrom: &str) -> Option<&[u8]> {
        self.get(chrom).map(Vec::as_slice)
    }
}

/// Sequence the ALTs are slid along. `start` is the 1-based position of
/// `bases[0]`; REF occupies the end of the window.
struct Window<'a> {
    bases: &'a [u8],
    start: u64,
}

impl<'a> Window<'a> {
    /// Lowest offset an edit may start at. A window beginning at the contig
    /// start may be slid all the way (and underflow); REF alone has to keep
    /// its first base as anchor.
    fn floor(&self) -> usize {
        if self.start == 1 {
            0
        } else {
            1
        }
    }
}

/// One ALT as `alternate` replacing `bases[start..end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    alternate: Vec<u8>,
}

pub struct Normalizer<'r> {
    decomposer: Decomposer,
    reference: Option<&'r (dyn ReferenceSource + Sync)>,
}

impl Default for Normalizer<'_> {
    fn default() -> Self {
        Normalizer::new(Decomposer::default())
    }
}

impl<'r> Normalizer<'r> {
    pub fn new(decomposer: Decomposer) -> Self {
        Normalizer {
            decomposer,
            reference: None,
        }
    }

    /// Slide beyond REF using the contig sequence. Records whose REF does not
    /// match the contig fall back to REF alone.
    pub fn with_reference(mut self, reference: &'r (dyn ReferenceSource + Sync)) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn decomposer(&self) -> &Decomposer {
        &self.decomposer
    }

    /// The canonical form of `variant`. Records with a symbolic ALT, or none,
    /// are returned unchanged.
    pub fn normalize(&self, variant: &Variant) -> Result<Variant, Error> {
        if variant.alt_alleles().is_empty() || variant.has_symbolic_alt() {
            debug!(
                "{}:{} left as is: no literal ALT to normalize",
                variant.chrom(),
                variant.pos()
            );
            return Ok(variant.clone());
        }
        let window = self.window(variant);
        let decomposed = self.decomposer.decompose_variant(variant)?;
        let mut spans = Vec::with_capacity(decomposed.len());
        for alleles in decomposed.values() {
            spans.push(self.canonical_span(variant, &window, alleles)?);
        }

        let start = spans.iter().map(|s| s.start).min().unwrap_or(0);
        let end = spans.iter().map(|s| s.end).max().unwrap_or(window.bases.len());
        let reference = window.bases[start..end].to_vec();
        let alternates = spans
            .iter()
            .map(|s| {
                let mut alt = window.bases[start..s.start].to_vec();
                alt.extend_from_slice(&s.alternate);
                alt.extend_from_slice(&window.bases[s.end..end]);
                alt
            })
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        if alternates.iter().any(|a| !seen.insert(a) || *a == reference) {
            warn!(
                "{}:{} left as is: ALTs collapse to the same allele once normalized",
                variant.chrom(),
                variant.pos()
            );
            return Ok(variant.clone());
        }

        let mut normalized = variant.clone();
        normalized.set_pos(window.start + start as u64);
        normalized.set_ref_allele(&String::from_utf8_lossy(&reference));
        normalized.set_alt_alleles(
            alternates
                .iter()
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .collect(),
        );
        if normalized.pos() != variant.pos() || normalized.ref_allele() != variant.ref_allele() {
            debug!(
                "{}:{} {} -> {}:{} {}",
                variant.chrom(),
                variant.pos(),
                variant.ref_allele(),
                normalized.chrom(),
                normalized.pos(),
                normalized.ref_allele()
            );
        }
        Ok(normalized)
    }

    fn window<'v>(&'v self, variant: &'v Variant) -> Window<'v> {
        let ref_only = Window {
            bases: variant.ref_allele().as_bytes(),
            start: variant.pos(),
        };
        let contig = match self.reference.and_then(|r| r.sequence(variant.chrom())) {
            Some(contig) => contig,
            None => return ref_only,
        };
        let begin = (variant.pos() - 1) as usize;
        let end = begin + variant.ref_allele().len();
        match contig.get(begin..end) {
            Some(bases)
                if bases
                    .iter()
                    .zip(variant.ref_allele().as_bytes())
                    .all(|(&a, &b)| bases_match(a, b)) =>
            {
                Window {
                    bases: &contig[..end],
                    start: 1,
                }
            }
            _ => {
                warn!(
                    "{}:{} REF {} does not match the reference, using REF only",
                    variant.chrom(),
                    variant.pos(),
                    variant.ref_allele()
                );
                ref_only
            }
        }
    }

    fn canonical_span(
        &self,
        variant: &Variant,
        window: &Window,
        alleles: &[VariantAllele],
    ) -> Result<Span, Error> {
        let base = (variant.pos() - window.start) as usize;
        let ref_len = variant.ref_allele().len();
        let whole = Span {
            start: base,
            end: base + ref_len,
            alternate: alleles
                .iter()
                .flat_map(|a| a.alternate.bytes())
                .collect(),
        };
        let edits = alleles
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kind() != AlleleKind::Identity)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let (first, last) = match (edits.first(), edits.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Ok(whole),
        };
        let offset = |a: &VariantAllele| base + (a.position - variant.pos()) as usize;

        let edit = &alleles[first];
        let is_indel = first == last && (edit.reference.is_empty() || edit.alternate.is_empty());
        if !is_indel {
            let mut start = offset(&alleles[first]);
            let mut end = offset(&alleles[last]) + alleles[last].reference.len();
            let mut alternate: Vec<u8> = alleles[first..=last]
                .iter()
                .flat_map(|a| a.alternate.bytes())
                .collect();
            // edits at the span ends may still share bases with REF; both
            // sides keep at least one base so the result needs no anchor
            while end - start > 1
                && alternate.len() > 1
                && alternate.last() == Some(&window.bases[end - 1])
            {
                end -= 1;
                alternate.pop();
            }
            while end - start > 1 && alternate.len() > 1 && window.bases[start] == alternate[0] {
                start += 1;
                alternate.remove(0);
            }
            return Ok(Span {
                start,
                end,
                alternate,
            });
        }

        let bases = window.bases;
        let floor = window.floor();
        let mut off = offset(edit);
        let (deleted, mut inserted) = (edit.reference.len(), edit.alternate.clone().into_bytes());
        if off < floor {
            off = if deleted > 0 {
                slide_deletion_right(bases, off, deleted, floor)
            } else {
                slide_insertion_right(bases, off, &mut inserted, floor)
            };
            if off < floor {
                warn!(
                    "{}:{} {}>{} has no anchor base inside REF, left as is",
                    variant.chrom(),
                    variant.pos(),
                    variant.ref_allele(),
                    String::from_utf8_lossy(&whole.alternate)
                );
                return Ok(whole);
            }
        }
        off = if deleted > 0 {
            slide_deletion_left(bases, off, deleted, floor)
        } else {
            slide_insertion_left(bases, off, &mut inserted, floor)
        };
        if off == 0 {
            return Err(Error::at_variant(
                variant.chrom(),
                variant.pos(),
                AnchorUnderflowError {
                    chrom: variant.chrom().to_owned(),
                    pos: variant.pos(),
                },
            ));
        }
        let mut alternate = vec![bases[off - 1]];
        alternate.extend_from_slice(&inserted);
        Ok(Span {
            start: off - 1,
            end: off + deleted,
            alternate,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::Header;

    fn variant(pos: u64, reference: &str, alts: &[&str]) -> Variant {
        Variant::new(Arc::new(Header::new()), "chr1", pos, reference, alts)
    }

    fn alleles(v: &Variant) -> (u64, &str, Vec<&str>) {
        (
            v.pos(),
            v.ref_allele(),
            v.alt_alleles().iter().map(String::as_str).collect(),
        )
    }

    #[test]
    fn test_insertion_in_homopolymer() {
        let normalized = Normalizer::default()
            .normalize(&variant(100, "CAAAT", &["CAAAAT"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (100, "C", vec!["CA"]));
    }

    #[test]
    fn test_deletion_trimmed_to_anchor() {
        let normalized = Normalizer::default()
            .normalize(&variant(50, "GATTACA", &["GACA"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (50, "GATT", vec!["G"]));
    }

    #[test]
    fn test_snp_and_mnp_trimmed() {
        let normalized = Normalizer::default()
            .normalize(&variant(10, "ACGT", &["AGGT"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (11, "C", vec!["G"]));
        let normalized = Normalizer::default()
            .normalize(&variant(10, "ACGTA", &["ATGCA"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (11, "CGT", vec!["TGC"]));
    }

    #[test]
    fn test_multiple_alts_share_span() {
        let normalized = Normalizer::default()
            .normalize(&variant(100, "CAAAT", &["CAAAAT", "CAGAT"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (100, "CAA", vec!["CAAA", "CAG"]));
    }

    #[test]
    fn test_slides_beyond_ref_with_reference() {
        let mut contigs = HashMap::new();
        contigs.insert("chr1".to_string(), b"GGCACACACAT".to_vec());
        // deletion of one CA written at the end of the run
        let v = variant(7, "CACAT", &["CAT"]);
        let normalized = Normalizer::default()
            .with_reference(&contigs)
            .normalize(&v)
            .unwrap();
        assert_eq!(alleles(&normalized), (2, "GCA", vec!["G"]));

        let ref_only = Normalizer::default().normalize(&v).unwrap();
        assert_eq!(alleles(&ref_only), (7, "CAC", vec!["C"]));
    }

    #[test]
    fn test_mismatching_reference_falls_back_to_ref() {
        let mut contigs = HashMap::new();
        contigs.insert("chr1".to_string(), b"TTTTTTTTTTTT".to_vec());
        let normalized = Normalizer::default()
            .with_reference(&contigs)
            .normalize(&variant(3, "CAAAT", &["CAAAAT"]))
            .unwrap();
        assert_eq!(alleles(&normalized), (3, "C", vec!["CA"]));
    }

    #[test]
    fn test_anchor_underflow() {
        let mut contigs = HashMap::new();
        contigs.insert("chr1".to_string(), b"AAAACGT".to_vec());
        let err = Normalizer::default()
            .with_reference(&contigs)
            .normalize(&variant(3, "AAC", &["AC"]))
            .unwrap_err();
        assert!(matches!(err.kind(), Error::AnchorUnderflow(_)));
    }

    #[test]
    fn test_no_anchor_in_ref_left_as_is() {
        let v = variant(10, "A", &["TA"]);
        let normalized = Normalizer::default().normalize(&v).unwrap();
        assert_eq!(normalized, v);
    }

    #[test]
    fn test_symbolic_untouched() {
        let v = variant(10, "ACGT", &["<DEL>"]);
        assert_eq!(Normalizer::default().normalize(&v).unwrap(), v);
    }

    #[test]
    fn test_idempotent() {
        let normalizer = Normalizer::default();
        for v in [
            variant(100, "CAAAT", &["CAAAAT"]),
            variant(50, "GATTACA", &["GACA", "GATTTACA"]),
            variant(10, "ACGTA", &["ATGCA", "A"]),
            variant(5, "TTTTTG", &["TTTTG", "TTTTTTG"]),
        ] {
            let once = normalizer.normalize(&v).unwrap();
            let twice = normalizer.normalize(&once).unwrap();
            assert_eq!(once, twice);
        }
    }
}
