//! Quadrilateral marker candidates from a grayscale image.

use crate::contour::{approx_closed_polygon, closed_length, outer_contours};
use crate::threshold::{adaptive_threshold_inv, IntegralImage};
use fiducial_pose_core::{GrayImageView, Quad};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters of the candidate search.
///
/// Rates are relative to either the larger image dimension (perimeter
/// bounds) or to the candidate's own perimeter (everything else).
///
/// Unknown fields are rejected when deserializing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CandidateParams {
    /// Box sizes of the adaptive threshold; each one is a separate scan.
    pub adaptive_thresh_win_sizes: Vec<usize>,
    /// A pixel must be this much darker than its local mean to be foreground.
    pub adaptive_thresh_constant: f32,
    /// Minimum contour length, relative to `max(width, height)`.
    ///
    /// Never (de)serialized: configuration files carry a single top-level
    /// `min_marker_perimeter_rate`, and naming it here is an unknown field.
    #[serde(skip)]
    pub min_marker_perimeter_rate: f32,
    /// Maximum contour length, relative to `max(width, height)`.
    pub max_marker_perimeter_rate: f32,
    /// Douglas–Peucker tolerance, relative to the contour length.
    pub polygonal_approx_accuracy_rate: f32,
    /// Shortest allowed side, relative to the quad perimeter.
    pub min_corner_distance_rate: f32,
    /// Corners closer than this (pixels) to the image edge are rejected.
    pub min_distance_to_border: usize,
    /// Quads whose mean corner distance to an earlier one is below this
    /// fraction of its perimeter are dropped as duplicates.
    pub min_marker_distance_rate: f32,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            adaptive_thresh_win_sizes: vec![3, 13, 23],
            adaptive_thresh_constant: 7.0,
            min_marker_perimeter_rate: 0.03,
            max_marker_perimeter_rate: 4.0,
            polygonal_approx_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            min_marker_distance_rate: 0.05,
        }
    }
}

/// Finds convex quadrilateral contours that may be marker borders.
#[derive(Clone, Debug, Default)]
pub struct CandidateExtractor {
    params: CandidateParams,
}

impl CandidateExtractor {
    pub fn new(params: CandidateParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &CandidateParams {
        &self.params
    }

    /// Lazily yield candidates, one threshold scale at a time.
    ///
    /// Emission order is unspecified. Quads are clockwise on screen.
    pub fn candidates<'a>(&'a self, img: GrayImageView<'a>) -> Candidates<'a> {
        let max_dim = img.width.max(img.height) as f32;
        Candidates {
            params: &self.params,
            integral: IntegralImage::new(&img),
            img,
            next_window: 0,
            pending: Vec::new().into_iter(),
            emitted: Vec::new(),
            min_perimeter: self.params.min_marker_perimeter_rate * max_dim,
            max_perimeter: self.params.max_marker_perimeter_rate * max_dim,
        }
    }

    /// Collect all candidates of `img`.
    pub fn extract(&self, img: GrayImageView<'_>) -> Vec<Quad> {
        self.candidates(img).collect()
    }
}

/// Iterator returned by [`CandidateExtractor::candidates`].
pub struct Candidates<'a> {
    params: &'a CandidateParams,
    img: GrayImageView<'a>,
    integral: IntegralImage,
    next_window: usize,
    pending: std::vec::IntoIter<Quad>,
    emitted: Vec<Quad>,
    min_perimeter: f32,
    max_perimeter: f32,
}

impl Candidates<'_> {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(width = self.img.width, height = self.img.height))
    )]
    fn scan_window(&self, window: usize) -> Vec<Quad> {
        let window = window.max(3) | 1;
        let bin = adaptive_threshold_inv(
            &self.img,
            &self.integral,
            window,
            self.params.adaptive_thresh_constant,
        );

        let quads: Vec<Quad> = outer_contours(&bin)
            .iter()
            .filter_map(|contour| self.contour_to_quad(contour))
            .collect();
        log::trace!("window {window}: {} quads", quads.len());
        quads
    }

    fn contour_to_quad(&self, contour: &[Point2<i32>]) -> Option<Quad> {
        if contour.len() < 4 {
            return None;
        }
        let length = closed_length(contour);
        if length < self.min_perimeter || length > self.max_perimeter {
            return None;
        }

        let poly = approx_closed_polygon(
            contour,
            self.params.polygonal_approx_accuracy_rate * length,
        );
        if poly.len() != 4 {
            return None;
        }

        let quad = Quad::new([0, 1, 2, 3].map(|i| Point2::new(poly[i].x as f32, poly[i].y as f32)));
        if !quad.is_convex() {
            return None;
        }
        if quad.min_side() < self.params.min_corner_distance_rate * quad.perimeter() {
            return None;
        }

        let margin = self.params.min_distance_to_border as f32;
        let max_x = self.img.width as f32 - 1.0 - margin;
        let max_y = self.img.height as f32 - 1.0 - margin;
        let inside = quad
            .corners
            .iter()
            .all(|p| p.x >= margin && p.y >= margin && p.x <= max_x && p.y <= max_y);
        if !inside {
            return None;
        }

        Some(quad.to_clockwise())
    }

    fn is_duplicate(&self, quad: &Quad) -> bool {
        let limit = self.params.min_marker_distance_rate * quad.perimeter();
        self.emitted
            .iter()
            .any(|prev| prev.mean_corner_distance(quad) < limit)
    }
}

impl Iterator for Candidates<'_> {
    type Item = Quad;

    fn next(&mut self) -> Option<Quad> {
        loop {
            if let Some(quad) = self.pending.next() {
                if self.is_duplicate(&quad) {
                    continue;
                }
                self.emitted.push(quad);
                return Some(quad);
            }

            let window = *self.params.adaptive_thresh_win_sizes.get(self.next_window)?;
            self.next_window += 1;
            self.pending = self.scan_window(window).into_iter();
        }
    }
}
