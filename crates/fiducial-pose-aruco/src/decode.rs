//! Reading and matching the bit grid inside a candidate quad.

use crate::matcher::MatchFailure;
use crate::threshold::otsu_threshold_from_samples;
use crate::{Dictionary, Matcher};
use fiducial_pose_core::{homography_from_4pt, sample_bilinear, GrayImageView, Homography, Quad};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Sub-samples per cell side when averaging a cell.
const CELL_SUBDIV: usize = 3;
/// Threshold samples per cell side.
const THRESH_SUBDIV: usize = 3;

/// Marker decoding parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderParams {
    /// Marker border width in cells (OpenCV typically uses 1).
    pub border_bits: usize,
    /// Fraction of each cell side ignored at both edges when averaging.
    pub cell_margin_rate: f32,
    /// Border cells allowed to read white before the candidate is rejected.
    pub max_erroneous_border_bits: usize,
    /// Candidates whose intensity spread is below this are rejected.
    pub min_std_dev: f32,
    /// Correction bound; `None` uses the dictionary's full capability.
    pub max_hamming: Option<u8>,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            border_bits: 1,
            cell_margin_rate: 0.13,
            max_erroneous_border_bits: 0,
            min_std_dev: 5.0,
            max_hamming: None,
        }
    }
}

/// Why a candidate did not decode. Rejections are expected and silent.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum CandidateRejected {
    #[error("candidate quad does not define a homography")]
    DegenerateQuad,
    #[error("sample grid leaves the image")]
    OutOfImage,
    #[error("contrast too low (std dev {std_dev:.1})")]
    LowContrast { std_dev: f32 },
    #[error("{white_cells} border cells read white")]
    BorderNotBlack { white_cells: usize },
    #[error("nearest codeword is {nearest} bits away")]
    DistanceOverThreshold { nearest: u8 },
    #[error("{hamming}-bit match is not unique")]
    AmbiguousCodeword { hamming: u8 },
}

impl From<MatchFailure> for CandidateRejected {
    fn from(f: MatchFailure) -> Self {
        match f {
            MatchFailure::TooFar { nearest } => Self::DistanceOverThreshold { nearest },
            MatchFailure::Ambiguous { hamming } => Self::AmbiguousCodeword { hamming },
        }
    }
}

/// A candidate that decoded to a dictionary id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedMarker {
    pub id: u32,
    /// Corners re-ordered so corner 0 is the marker's top-left, clockwise.
    pub corners: Quad,
    /// Quarter turns between the candidate's corner order and the marker's.
    pub rotation: u8,
    /// Bits corrected to reach the codeword.
    pub hamming: u8,
    /// Observed inner bits (row-major, black = 1) in candidate order.
    pub code: u64,
}

/// Decodes candidate quads against one dictionary.
#[derive(Clone, Debug)]
pub struct SymbolDecoder {
    matcher: Matcher,
    params: DecoderParams,
    cells: usize,
    // Unit-square coordinates, grouped per cell in row-major order.
    cell_points: Vec<Point2<f32>>,
    threshold_points: Vec<Point2<f32>>,
}

impl SymbolDecoder {
    pub fn new(dict: Dictionary, params: DecoderParams) -> Self {
        let max_hamming = params.max_hamming.unwrap_or(dict.max_correction_bits);
        let matcher = Matcher::new(dict, max_hamming);
        let cells = dict.marker_size + 2 * params.border_bits;
        let cell_points = build_cell_points(cells, params.cell_margin_rate);
        let threshold_points = build_threshold_points(cells);
        Self {
            matcher,
            params,
            cells,
            cell_points,
            threshold_points,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    #[inline]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[inline]
    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    /// Decode the marker whose outer border is `quad`.
    pub fn decode(
        &self,
        img: &GrayImageView<'_>,
        quad: &Quad,
    ) -> Result<DecodedMarker, CandidateRejected> {
        let h = homography_from_4pt(&unit_square(), &quad.corners)
            .ok_or(CandidateRejected::DegenerateQuad)?;

        let thr_samples = self.sample_points(img, &h, &self.threshold_points)?;
        let std_dev = std_dev(&thr_samples);
        if std_dev < self.params.min_std_dev {
            return Err(CandidateRejected::LowContrast { std_dev });
        }
        let thr = otsu_threshold_from_samples(&thr_samples) as f32 + 0.5;

        let per_cell = CELL_SUBDIV * CELL_SUBDIV;
        let cell_samples = self.sample_points(img, &h, &self.cell_points)?;
        let black: Vec<bool> = cell_samples
            .chunks_exact(per_cell)
            .map(|c| {
                let mean = c.iter().map(|&v| v as f32).sum::<f32>() / per_cell as f32;
                mean < thr
            })
            .collect();

        let (code, white_border) = self.read_bits(&black);
        if white_border > self.params.max_erroneous_border_bits {
            return Err(CandidateRejected::BorderNotBlack {
                white_cells: white_border,
            });
        }

        let m = self.matcher.match_code(code)?;
        Ok(DecodedMarker {
            id: m.id,
            corners: quad.rotated(m.rotation as usize),
            rotation: m.rotation,
            hamming: m.hamming,
            code,
        })
    }

    fn sample_points(
        &self,
        img: &GrayImageView<'_>,
        h: &Homography,
        points: &[Point2<f32>],
    ) -> Result<Vec<u8>, CandidateRejected> {
        points
            .iter()
            .map(|&p| {
                let q = h.apply(p);
                if !img.contains(q.x, q.y) {
                    return Err(CandidateRejected::OutOfImage);
                }
                Ok(sample_bilinear(img, q.x, q.y).round().clamp(0.0, 255.0) as u8)
            })
            .collect()
    }

    /// Pack inner cells row-major (black = 1) and count white border cells.
    fn read_bits(&self, black: &[bool]) -> (u64, usize) {
        let border = self.params.border_bits;
        let bits = self.dictionary().marker_size;
        let cells = self.cells;
        let mut code = 0u64;
        let mut white_border = 0usize;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = black[cy * cells + cx];
                let in_border = cx < border
                    || cy < border
                    || cx >= cells - border
                    || cy >= cells - border;
                if in_border {
                    white_border += usize::from(!is_black);
                } else if is_black {
                    code |= 1u64 << ((cy - border) * bits + (cx - border));
                }
            }
        }
        (code, white_border)
    }
}

fn unit_square() -> [Point2<f32>; 4] {
    [
        Point2::new(0.0, 0.0),
        Point2::new(1.0, 0.0),
        Point2::new(1.0, 1.0),
        Point2::new(0.0, 1.0),
    ]
}

fn build_cell_points(cells: usize, margin_rate: f32) -> Vec<Point2<f32>> {
    let margin = margin_rate.clamp(0.0, 0.45);
    let step = 1.0 / cells as f32;
    let inner = step * (1.0 - 2.0 * margin);
    let mut points = Vec::with_capacity(cells * cells * CELL_SUBDIV * CELL_SUBDIV);
    for cy in 0..cells {
        for cx in 0..cells {
            let x0 = cx as f32 * step + margin * step;
            let y0 = cy as f32 * step + margin * step;
            for sy in 0..CELL_SUBDIV {
                for sx in 0..CELL_SUBDIV {
                    points.push(Point2::new(
                        x0 + (sx as f32 + 0.5) / CELL_SUBDIV as f32 * inner,
                        y0 + (sy as f32 + 0.5) / CELL_SUBDIV as f32 * inner,
                    ));
                }
            }
        }
    }
    points
}

fn build_threshold_points(cells: usize) -> Vec<Point2<f32>> {
    let grid = cells * THRESH_SUBDIV;
    let step = 1.0 / grid as f32;
    let mut points = Vec::with_capacity(grid * grid);
    for ty in 0..grid {
        for tx in 0..grid {
            points.push(Point2::new(
                (tx as f32 + 0.5) * step,
                (ty as f32 + 0.5) * step,
            ));
        }
    }
    points
}

fn std_dev(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f32;
    let mean = samples.iter().map(|&v| v as f32).sum::<f32>() / n;
    let var = samples
        .iter()
        .map(|&v| (v as f32 - mean).powi(2))
        .sum::<f32>()
        / n;
    var.sqrt()
}
