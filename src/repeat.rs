//! Tandem repeats and the rules for sliding an indel along them.
//!
//! Offsets are 0-based into a sequence window. An indel at offset `off`
//! deletes `window[off..off + len]` or inserts its bases before `window[off]`.

use crate::align::bases_match;

/// Longest repeat unit considered (hexanucleotide microsatellites).
pub const MAX_REPEAT_PERIOD: usize = 6;

/// The shortest unit `u` such that `seq` is `u` repeated a whole number of
/// times, provided `u` is at most `max_period` long.
pub fn repeat_unit(seq: &[u8], max_period: usize) -> Option<&[u8]> {
    if seq.is_empty() {
        return None;
    }
    (1..=max_period.min(seq.len()))
        .filter(|p| seq.len() % p == 0)
        .find(|&p| seq.chunks(p).all(|chunk| chunk == &seq[..p]))
        .map(|p| &seq[..p])
}

/// Whole copies of `unit` in `seq` immediately before `end`.
pub fn copies_before(seq: &[u8], end: usize, unit: &[u8]) -> usize {
    let p = unit.len();
    let mut copies = 0;
    let mut end = end;
    while end >= p && &seq[end - p..end] == unit {
        copies += 1;
        end -= p;
    }
    copies
}

/// Whole copies of `unit` in `seq` starting at `start`.
pub fn copies_after(seq: &[u8], start: usize, unit: &[u8]) -> usize {
    let p = unit.len();
    let mut copies = 0;
    let mut start = start;
    while start + p <= seq.len() && &seq[start..start + p] == unit {
        copies += 1;
        start += p;
    }
    copies
}

/// Move a deletion of `len` bases left one base at a time while the base
/// entering the deletion equals the one leaving it. Stops at `floor`.
pub fn slide_deletion_left(window: &[u8], mut off: usize, len: usize, floor: usize) -> usize {
    while off > floor && bases_match(window[off - 1], window[off + len - 1]) {
        off -= 1;
    }
    off
}

/// Move an insertion left, rotating its bases so the inserted sequence stays
/// equivalent. Stops at `floor`.
pub fn slide_insertion_left(
    window: &[u8],
    mut off: usize,
    inserted: &mut [u8],
    floor: usize,
) -> usize {
    while off > floor {
        match inserted.last() {
            Some(&last) if bases_match(window[off - 1], last) => {
                inserted.rotate_right(1);
                off -= 1;
            }
            _ => break,
        }
    }
    off
}

/// Move a deletion right until it starts at `target`, if the window allows.
pub fn slide_deletion_right(window: &[u8], mut off: usize, len: usize, target: usize) -> usize {
    while off < target && off + len < window.len() && bases_match(window[off], window[off + len]) {
        off += 1;
    }
    off
}

/// Move an insertion right until it sits at `target`, if the window allows.
pub fn slide_insertion_right(
    window: &[u8],
    mut off: usize,
    inserted: &mut [u8],
    target: usize,
) -> usize {
    while off < target && off < window.len() {
        match inserted.first() {
            Some(&first) if bases_match(window[off], first) => {
                inserted.rotate_left(1);
                off += 1;
            }
            _ => break,
        }
    }
    off
}
