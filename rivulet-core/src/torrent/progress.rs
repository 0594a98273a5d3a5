//! Aggregate completion over the whole torrent.
//!
//! Progress is the share of present pieces. Per-file progress is not computed.

use super::Bitfield;

/// Completion ratio in `[0.0, 1.0]` of a live bitfield.
pub fn progress(bitfield: &Bitfield) -> f64 {
    ratio(bitfield.present_count(), bitfield.len())
}

/// Completion ratio of plain presence flags.
pub fn progress_of(bits: &[bool]) -> f64 {
    let present = bits.iter().filter(|present| **present).count();
    ratio_usize(present, bits.len())
}

fn ratio(present: u32, total: u32) -> f64 {
    ratio_usize(present as usize, total as usize)
}

fn ratio_usize(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64
    }
}
