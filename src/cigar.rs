//! Run-length edit scripts (CIGAR-like) between a REF and an ALT allele.

use std::convert::TryFrom;
use std::fmt;

use itertools::Itertools;
use num_enum::TryFromPrimitive;

use crate::align::{bases_match, Alignment, AlignmentOperation};
use crate::allele::VariantAllele;
use crate::error::{IllegalEditScriptError, MalformedCigarError};
use crate::parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum EditOp {
    // 'M'
    Match = 77,
    // 'X'
    Mismatch = 88,
    // 'I'
    Insertion = 73,
    // 'D'
    Deletion = 68,
}

impl EditOp {
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    pub fn consumes_reference(self) -> bool {
        !matches!(self, EditOp::Insertion)
    }

    pub fn consumes_alternate(self) -> bool {
        !matches!(self, EditOp::Deletion)
    }
}

impl EditOp {
    /// The column an alignment operation stands for; clips have none.
    pub fn from_alignment_op(op: AlignmentOperation) -> Option<EditOp> {
        match op {
            AlignmentOperation::Match => Some(EditOp::Match),
            AlignmentOperation::Subst => Some(EditOp::Mismatch),
            AlignmentOperation::Ins => Some(EditOp::Insertion),
            AlignmentOperation::Del => Some(EditOp::Deletion),
            AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarElement {
    pub len: u32,
    pub op: EditOp,
}

impl CigarElement {
    pub fn new(len: u32, op: EditOp) -> Self {
        CigarElement { len, op }
    }
}

/// Ordered `(length, operation)` runs.
///
/// Scripts built by this crate are clean: no zero-length runs and no two
/// neighbouring runs with the same operation. Scripts parsed from text keep
/// the runs as written until [`EditScript::clean`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EditScript(Vec<CigarElement>);

impl EditScript {
    pub fn new() -> Self {
        EditScript(Vec::new())
    }

    pub fn elements(&self) -> &[CigarElement] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a run, extending the last one if the operation is the same.
    pub fn push(&mut self, len: u32, op: EditOp) {
        if len == 0 {
            return;
        }
        match self.0.last_mut() {
            Some(last) if last.op == op => last.len += len,
            _ => self.0.push(CigarElement::new(len, op)),
        }
    }

    /// Convert an alignment path into a script covering the *whole* REF and
    /// ALT: flanks a local alignment left out are closed with a gap for the
    /// length difference followed by paired columns.
    pub fn from_alignment(
        alignment: &Alignment,
        reference: &[u8],
        alternate: &[u8],
    ) -> EditScript {
        let mut script = EditScript::new();
        script.push_flank(
            &reference[..alignment.ref_start],
            &alternate[..alignment.alt_start],
        );
        for &op in &alignment.operations {
            if let Some(op) = EditOp::from_alignment_op(op) {
                script.push(1, op);
            }
        }
        script.push_flank(
            &reference[alignment.ref_end..],
            &alternate[alignment.alt_end..],
        );
        script
    }

    fn push_flank(&mut self, reference: &[u8], alternate: &[u8]) {
        let paired = reference.len().min(alternate.len());
        let gap = (reference.len() - paired) as u32;
        self.push(gap, EditOp::Deletion);
        self.push((alternate.len() - paired) as u32, EditOp::Insertion);
        let (reference, alternate) = (
            &reference[reference.len() - paired..],
            &alternate[alternate.len() - paired..],
        );
        for (&r, &a) in reference.iter().zip(alternate) {
            let op = if bases_match(r, a) {
                EditOp::Match
            } else {
                EditOp::Mismatch
            };
            self.push(1, op);
        }
    }

    /// Parse the run-length notation, e.g. `3M1I2D`. Runs are kept exactly as
    /// written.
    pub fn from_compact(text: &str) -> Result<EditScript, MalformedCigarError> {
        let mut elements = Vec::new();
        let mut input = text;
        while !input.is_empty() {
            let (rest, (len, op)) = parser::cigar_run(input).map_err(|_| MalformedCigarError {
                text: text.to_owned(),
                offset: text.len() - input.len(),
            })?;
            // the parser only accepts the four operation letters
            let op = EditOp::try_from(op as u8).map_err(|_| MalformedCigarError {
                text: text.to_owned(),
                offset: text.len() - input.len(),
            })?;
            elements.push(CigarElement::new(len, op));
            input = rest;
        }
        Ok(EditScript(elements))
    }

    /// Parse one letter per column, e.g. `MMMIIMD`.
    pub fn from_unpacked(text: &str) -> Result<EditScript, MalformedCigarError> {
        let mut script = EditScript::new();
        for (offset, c) in text.char_indices() {
            let op = u8::try_from(c)
                .ok()
                .and_then(|b| EditOp::try_from(b).ok())
                .ok_or_else(|| MalformedCigarError {
                    text: text.to_owned(),
                    offset,
                })?;
            script.push(1, op);
        }
        Ok(script)
    }

    /// Build from signed lengths, rejecting negative ones.
    pub fn from_pairs<I>(pairs: I) -> Result<EditScript, IllegalEditScriptError>
    where
        I: IntoIterator<Item = (i64, EditOp)>,
    {
        let mut elements = Vec::new();
        for (length, op) in pairs {
            let len = u32::try_from(length).map_err(|_| IllegalEditScriptError::NegativeLength {
                length,
                op: op.as_char(),
            })?;
            elements.push(CigarElement::new(len, op));
        }
        Ok(EditScript(elements))
    }

    /// Render a decomposition. Identity entries become matches; an entry
    /// changing `r` reference bases into `a` alternate bases becomes
    /// `min(r, a)` paired columns plus a gap for the difference.
    pub fn from_variant_alleles(alleles: &[VariantAllele], x_for_mismatch: bool) -> EditScript {
        let paired = if x_for_mismatch {
            EditOp::Mismatch
        } else {
            EditOp::Match
        };
        let mut script = EditScript::new();
        for allele in alleles {
            let (r, a) = (allele.reference.len() as u32, allele.alternate.len() as u32);
            if allele.reference == allele.alternate {
                script.push(r, EditOp::Match);
                continue;
            }
            script.push(r.min(a), paired);
            if r > a {
                script.push(r - a, EditOp::Deletion);
            } else {
                script.push(a - r, EditOp::Insertion);
            }
        }
        script
    }

    /// Run-length text. With `distinguish_mismatch` unset, mismatches are
    /// written as `M` and merged with neighbouring matches.
    pub fn to_compact(&self, distinguish_mismatch: bool) -> String {
        self.0
            .iter()
            .map(|e| {
                let op = match e.op {
                    EditOp::Mismatch if !distinguish_mismatch => EditOp::Match,
                    op => op,
                };
                (e.len, op)
            })
            .coalesce(|(l1, o1), (l2, o2)| {
                if o1 == o2 {
                    Ok((l1 + l2, o1))
                } else {
                    Err(((l1, o1), (l2, o2)))
                }
            })
            .map(|(len, op)| format!("{}{}", len, op.as_char()))
            .join("")
    }

    /// Concatenate scripts of adjacent regions, joining the boundary runs when
    /// they share an operation.
    pub fn merge(a: &EditScript, b: &EditScript) -> EditScript {
        let mut merged = a.clone();
        let mut rest = b.0.iter();
        if let (Some(last), Some(first)) = (merged.0.last_mut(), b.0.first()) {
            if last.op == first.op {
                last.len += first.len;
                rest.next();
            }
        }
        merged.0.extend(rest);
        merged
    }

    /// [`EditScript::merge`] for scripts anchored at reference offsets, which
    /// must abut.
    pub fn merge_at(
        a: &EditScript,
        a_start: u64,
        b: &EditScript,
        b_start: u64,
    ) -> Result<EditScript, IllegalEditScriptError> {
        let end = a_start + a.reference_span();
        if end != b_start {
            return Err(IllegalEditScriptError::NotAdjacent {
                end,
                start: b_start,
            });
        }
        Ok(EditScript::merge(a, b))
    }

    /// Drop zero-length runs and join neighbours with equal operations.
    pub fn clean(&self) -> EditScript {
        let mut cleaned = EditScript::new();
        for e in &self.0 {
            cleaned.push(e.len, e.op);
        }
        cleaned
    }

    /// Bases of REF consumed (`M`, `X`, `D`).
    pub fn reference_span(&self) -> u64 {
        self.0
            .iter()
            .filter(|e| e.op.consumes_reference())
            .map(|e| e.len as u64)
            .sum()
    }

    /// Bases of ALT consumed (`M`, `X`, `I`).
    pub fn alt_span(&self) -> u64 {
        self.0
            .iter()
            .filter(|e| e.op.consumes_alternate())
            .map(|e| e.len as u64)
            .sum()
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact(true))
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a CigarElement;
    type IntoIter = std::slice::Iter<'a, CigarElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
