//! Pairwise alignment of a REF allele against an ALT allele.
//!
//! Two backends sit behind the [`Aligner`] trait: a Gotoh local aligner for
//! the short alleles that make up nearly all of a call set, and a gap-affine
//! wavefront aligner that keeps memory bounded for long indels. Both are
//! stateless; the scoring is passed in and never mutated, so a single
//! [`AlignerSelector`] can be shared between worker threads.

pub mod affine;
pub mod wavefront;

pub use bio::alignment::AlignmentOperation;
use getset::CopyGetters;
use log::trace;

pub use affine::AffineAligner;
pub use wavefront::WavefrontAligner;

use crate::error::AlignmentError;

/// Hard ceiling on either input, bounding the quadratic DP.
pub const MAX_ALIGNMENT_LENGTH: usize = 10_000;

/// Alleles at least this long go to the wavefront backend by default.
pub const DEFAULT_WAVEFRONT_THRESHOLD: usize = 200;

/// Match score and the three penalties of a gap-affine model.
/// A gap of length `l` costs `gap_open + l * gap_extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Scoring {
    match_score: i32,
    mismatch: i32,
    gap_open: i32,
    gap_extend: i32,
}

impl Scoring {
    pub fn new(match_score: i32, mismatch: i32, gap_open: i32, gap_extend: i32) -> Self {
        Scoring {
            match_score,
            mismatch,
            gap_open,
            gap_extend,
        }
    }

    pub fn with_match_score(mut self, match_score: i32) -> Self {
        self.match_score = match_score;
        self
    }

    pub fn with_mismatch(mut self, mismatch: i32) -> Self {
        self.mismatch = mismatch;
        self
    }

    pub fn with_gap_open(mut self, gap_open: i32) -> Self {
        self.gap_open = gap_open;
        self
    }

    pub fn with_gap_extend(mut self, gap_extend: i32) -> Self {
        self.gap_extend = gap_extend;
        self
    }

    /// Every score and penalty must be non-negative.
    pub fn validate(&self) -> Result<(), AlignmentError> {
        for (name, value) in [
            ("match", self.match_score),
            ("mismatch", self.mismatch),
            ("gap open", self.gap_open),
            ("gap extend", self.gap_extend),
        ] {
            if value < 0 {
                return Err(AlignmentError::InvalidScoring(format!(
                    "{} is {}, expected a value >= 0",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn substitution(&self, a: u8, b: u8) -> i32 {
        if bases_match(a, b) {
            self.match_score
        } else {
            -self.mismatch
        }
    }
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring::new(10, 9, 15, 6)
    }
}

#[inline]
pub(crate) fn bases_match(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}


/// Result of aligning `reference` against `alternate`.
///
/// `Ins` consumes ALT only and `Del` consumes REF only. Neither backend emits
/// clip operations; unaligned flanks are described by the start/end offsets.
/// `operations` covers `reference[ref_start..ref_end]` and
/// `alternate[alt_start..alt_end]`; a local alignment may leave flanks
/// outside those ranges unaligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub score: i32,
    pub ref_start: usize,
    pub ref_end: usize,
    pub alt_start: usize,
    pub alt_end: usize,
    pub ref_len: usize,
    pub alt_len: usize,
    pub operations: Vec<AlignmentOperation>,
}

pub trait Aligner {
    fn align(
        &self,
        reference: &[u8],
        alternate: &[u8],
        scoring: &Scoring,
    ) -> Result<Alignment, AlignmentError>;
}

pub(crate) fn check_inputs(
    reference: &[u8],
    alternate: &[u8],
    scoring: &Scoring,
) -> Result<(), AlignmentError> {
    scoring.validate()?;
    if reference.is_empty() || alternate.is_empty() {
        return Err(AlignmentError::EmptyInput);
    }
    let length = reference.len().max(alternate.len());
    if length > MAX_ALIGNMENT_LENGTH {
        return Err(AlignmentError::TooLong {
            length,
            max: MAX_ALIGNMENT_LENGTH,
        });
    }
    Ok(())
}

/// Picks a backend by input length. Selection never changes which edit script
/// invariants hold, only the time/memory profile.
pub struct AlignerSelector {
    threshold: usize,
    short: Box<dyn Aligner + Send + Sync>,
    long: Box<dyn Aligner + Send + Sync>,
}

impl AlignerSelector {
    pub fn new(
        threshold: usize,
        short: Box<dyn Aligner + Send + Sync>,
        long: Box<dyn Aligner + Send + Sync>,
    ) -> Self {
        AlignerSelector {
            threshold,
            short,
            long,
        }
    }

    pub fn with_threshold(threshold: usize) -> Self {
        AlignerSelector::new(
            threshold,
            Box::new(AffineAligner),
            Box::new(WavefrontAligner),
        )
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn select(&self, ref_len: usize, alt_len: usize) -> &dyn Aligner {
        if ref_len.max(alt_len) >= self.threshold {
            trace!("wavefront backend for {}x{} alignment", ref_len, alt_len);
            self.long.as_ref()
        } else {
            self.short.as_ref()
        }
    }

    pub fn align(
        &self,
        reference: &[u8],
        alternate: &[u8],
        scoring: &Scoring,
    ) -> Result<Alignment, AlignmentError> {
        self.select(reference.len(), alternate.len())
            .align(reference, alternate, scoring)
    }
}

impl Default for AlignerSelector {
    fn default() -> Self {
        AlignerSelector::with_threshold(DEFAULT_WAVEFRONT_THRESHOLD)
    }
}

impl std::fmt::Debug for AlignerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignerSelector")
            .field("threshold", &self.threshold)
            .finish()
    }
}
