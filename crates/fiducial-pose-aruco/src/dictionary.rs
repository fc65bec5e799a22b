//! Dictionary metadata and packed marker codes.

use crate::matcher::rotate_code_u64;

/// A fixed square-marker dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Human-readable name (for debugging/logging).
    pub name: &'static str,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Declared minimum Hamming distance between any two codewords, taking
    /// all four rotations into account.
    pub min_distance: u8,
    /// Maximum error-correcting Hamming distance: `(min_distance - 1) / 2`.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bits are stored in row-major order with **black = 1**.
    pub codes: &'static [u64],
}

impl Dictionary {
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Code for `id`, if it exists.
    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Smallest Hamming distance actually realised by the codes.
    ///
    /// Considers every pair of codewords under all four relative rotations and
    /// each codeword against its own non-trivial rotations, so a marker can
    /// never be confused with a rotated copy of itself or another marker.
    /// Returns `u32::MAX` for a dictionary without any constraint to check.
    pub fn measured_min_distance(&self) -> u32 {
        let n = self.marker_size;
        let mut best = u32::MAX;
        for (i, &a) in self.codes.iter().enumerate() {
            for rot in 1..4u8 {
                best = best.min((a ^ rotate_code_u64(a, n, rot)).count_ones());
            }
            for &b in &self.codes[i + 1..] {
                for rot in 0..4u8 {
                    best = best.min((a ^ rotate_code_u64(b, n, rot)).count_ones());
                }
            }
        }
        best
    }
}
