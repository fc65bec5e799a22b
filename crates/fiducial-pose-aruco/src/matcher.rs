//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that: `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Why an observed code did not match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchFailure {
    /// The nearest codeword is farther than the correction bound.
    TooFar { nearest: u8 },
    /// Two codewords (or orientations) are equally near.
    Ambiguous { hamming: u8 },
}

/// Bounded-distance matcher for a fixed dictionary.
///
/// Brute-force search over all ids and rotations; dictionaries of a few
/// hundred codes decode well under a microsecond per candidate.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher accepting codes at most `max_hamming` bits away.
    ///
    /// The bound is clamped to the dictionary's `max_correction_bits`; a
    /// larger bound could map one observation to two different codewords.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&base| std::array::from_fn(|r| rotate_code_u64(base, n, r as u8)))
            .collect();

        Self {
            dict,
            max_hamming: max_hamming.min(dict.max_correction_bits),
            rotated,
        }
    }

    /// Matcher using the dictionary's full correction capability.
    pub fn with_full_correction(dict: Dictionary) -> Self {
        Self::new(dict, dict.max_correction_bits)
    }

    /// Dictionary used by this matcher.
    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    /// Maximum Hamming distance allowed for matches.
    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the unique nearest codeword within `max_hamming`.
    pub fn match_code(&self, observed: u64) -> Result<Match, MatchFailure> {
        let mut best: Option<Match> = None;
        let mut tied = false;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                let m = Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                };
                match best {
                    Some(prev) if h > prev.hamming => {}
                    Some(prev) if h == prev.hamming => tied = true,
                    _ => {
                        best = Some(m);
                        tied = false;
                    }
                }
            }
        }

        let best = best.ok_or(MatchFailure::TooFar { nearest: u8::MAX })?;
        if best.hamming > self.max_hamming {
            return Err(MatchFailure::TooFar {
                nearest: best.hamming,
            });
        }
        if tied {
            return Err(MatchFailure::Ambiguous {
                hamming: best.hamming,
            });
        }
        Ok(best)
    }
}

/// Rotate a code stored in row-major bits: `idx = y * N + x`.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= ((code >> (sy * n + sx)) & 1) << (y * n + x);
        }
    }
    out
}
