//! Gotoh local alignment with affine gaps and a full traceback matrix.

use std::mem::swap;

use super::{bases_match, check_inputs, Aligner, Alignment, AlignmentOperation, Scoring};
use crate::error::AlignmentError;

const NEG_INF: i32 = i32::MIN / 2;

// low two bits: where H came from
const H_STOP: u8 = 0;
const H_DIAG: u8 = 1;
const H_INS: u8 = 2;
const H_DEL: u8 = 3;
const H_MASK: u8 = 0b11;
// E (insertion) / F (deletion) extended an open gap rather than opening one
const E_EXTEND: u8 = 0b0100;
const F_EXTEND: u8 = 0b1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct AffineAligner;

#[derive(Clone, Copy)]
enum State {
    H,
    E,
    F,
}

impl Aligner for AffineAligner {
    fn align(
        &self,
        reference: &[u8],
        alternate: &[u8],
        scoring: &Scoring,
    ) -> Result<Alignment, AlignmentError> {
        check_inputs(reference, alternate, scoring)?;
        let (n, m) = (reference.len(), alternate.len());
        let cols = m + 1;
        let open = scoring.gap_open() + scoring.gap_extend();
        let extend = scoring.gap_extend();

        let mut h_prev = vec![0i32; cols];
        let mut h_cur = vec![0i32; cols];
        let mut f_prev = vec![NEG_INF; cols];
        let mut f_cur = vec![NEG_INF; cols];
        let mut trace = vec![H_STOP; (n + 1) * cols];
        let (mut best, mut best_i, mut best_j) = (0, 0, 0);

        for i in 1..=n {
            h_cur[0] = 0;
            f_cur[0] = NEG_INF;
            let mut e = NEG_INF;
            for j in 1..=m {
                let mut flags = 0u8;

                let e_open = h_cur[j - 1] - open;
                let e_extend = e - extend;
                e = if e_extend >= e_open {
                    flags |= E_EXTEND;
                    e_extend
                } else {
                    e_open
                };

                let f_open = h_prev[j] - open;
                let f_extend = f_prev[j] - extend;
                let f = if f_extend >= f_open {
                    flags |= F_EXTEND;
                    f_extend
                } else {
                    f_open
                };
                f_cur[j] = f;

                let diag = h_prev[j - 1] + scoring.substitution(reference[i - 1], alternate[j - 1]);
                let max = diag.max(e).max(f);
                // the diagonal wins ties, which leaves gaps at their leftmost placement
                let (h, source) = if max <= 0 {
                    (0, H_STOP)
                } else if diag == max {
                    (diag, H_DIAG)
                } else if e == max {
                    (e, H_INS)
                } else {
                    (f, H_DEL)
                };
                h_cur[j] = h;
                trace[i * cols + j] = flags | source;

                if h > 0 && h >= best {
                    best = h;
                    best_i = i;
                    best_j = j;
                }
            }
            swap(&mut h_prev, &mut h_cur);
            swap(&mut f_prev, &mut f_cur);
        }

        let mut operations = Vec::with_capacity(best_i.max(best_j));
        let (mut i, mut j) = (best_i, best_j);
        let mut state = State::H;
        loop {
            let t = trace[i * cols + j];
            match state {
                State::H => match t & H_MASK {
                    H_DIAG => {
                        operations.push(if bases_match(reference[i - 1], alternate[j - 1]) {
                            AlignmentOperation::Match
                        } else {
                            AlignmentOperation::Subst
                        });
                        i -= 1;
                        j -= 1;
                    }
                    H_INS => state = State::E,
                    H_DEL => state = State::F,
                    _ => break,
                },
                State::E => {
                    operations.push(AlignmentOperation::Ins);
                    if t & E_EXTEND == 0 {
                        state = State::H;
                    }
                    j -= 1;
                }
                State::F => {
                    operations.push(AlignmentOperation::Del);
                    if t & F_EXTEND == 0 {
                        state = State::H;
                    }
                    i -= 1;
                }
            }
        }
        operations.reverse();

        Ok(Alignment {
            score: best,
            ref_start: i,
            ref_end: best_i,
            alt_start: j,
            alt_end: best_j,
            ref_len: n,
            alt_len: m,
            operations,
        })
    }
}
