//! Sub-pixel corner refinement.
//!
//! For a true corner `q`, every image gradient `g` at a point `p` nearby is
//! orthogonal to `p - q`: either `p` lies in a flat region (`g = 0`) or on an
//! edge through `q` (`g ⟂ edge`). Summing `g gᵀ (p - q) = 0` over a window
//! yields the normal equations `G q = b` with `G = Σ w g gᵀ` and
//! `b = Σ w g gᵀ p`, iterated until the update becomes small.

use fiducial_pose_core::{sample_bilinear_clamped, GrayImageView, Quad};
use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Half size of the search window in pixels.
    pub win_size: usize,
    pub max_iterations: usize,
    /// Stop once a step moves the corner less than this (pixels).
    pub epsilon: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            win_size: 5,
            max_iterations: 30,
            epsilon: 0.1,
        }
    }
}

/// Moves quad corners to sub-pixel gradient corners.
#[derive(Clone, Debug)]
pub struct CornerRefiner {
    params: RefineParams,
    enabled: bool,
}

impl Default for CornerRefiner {
    fn default() -> Self {
        Self::new(RefineParams::default())
    }
}

impl CornerRefiner {
    pub fn new(params: RefineParams) -> Self {
        Self {
            params,
            enabled: true,
        }
    }

    /// A refiner that returns its input unchanged.
    pub fn disabled() -> Self {
        Self {
            params: RefineParams::default(),
            enabled: false,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn params(&self) -> &RefineParams {
        &self.params
    }

    /// Refine every corner of `quad`; corner order is preserved.
    ///
    /// A corner whose iteration does not converge, hits a singular system or
    /// leaves its search window keeps its input position.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, img)))]
    pub fn refine(&self, img: &GrayImageView<'_>, quad: &Quad) -> Quad {
        if !self.enabled {
            return *quad;
        }
        // Keep the window inside the marker's black border.
        let win = (self.params.win_size as f32)
            .min(quad.min_side() / 4.0)
            .floor()
            .max(2.0) as i32;
        quad.map(|c| self.refine_corner(img, c, win).unwrap_or(c))
    }

    fn refine_corner(
        &self,
        img: &GrayImageView<'_>,
        start: Point2<f32>,
        win: i32,
    ) -> Option<Point2<f32>> {
        let weights: Vec<f64> = (-win..=win)
            .map(|i| {
                let t = i as f64 / win as f64;
                (-t * t).exp()
            })
            .collect();
        let eps2 = (self.params.epsilon as f64).powi(2);
        let start = Vector2::new(start.x as f64, start.y as f64);
        let mut c = start;

        for _ in 0..self.params.max_iterations.max(1) {
            let mut g = Matrix2::<f64>::zeros();
            let mut b = Vector2::<f64>::zeros();

            for (iy, wy) in (-win..=win).zip(&weights) {
                for (ix, wx) in (-win..=win).zip(&weights) {
                    let rel = Vector2::new(ix as f64, iy as f64);
                    let (px, py) = ((c.x + rel.x) as f32, (c.y + rel.y) as f32);
                    let gx = 0.5
                        * (sample_bilinear_clamped(img, px + 1.0, py)
                            - sample_bilinear_clamped(img, px - 1.0, py))
                            as f64;
                    let gy = 0.5
                        * (sample_bilinear_clamped(img, px, py + 1.0)
                            - sample_bilinear_clamped(img, px, py - 1.0))
                            as f64;
                    let w = wx * wy;
                    let grad = Vector2::new(gx, gy);
                    let ggt = grad * grad.transpose() * w;
                    g += ggt;
                    b += ggt * rel;
                }
            }

            // Solve in window-relative coordinates, then shift.
            let step = g.try_inverse()? * b;
            if !step.iter().all(|v| v.is_finite()) {
                return None;
            }
            c += step;

            if (c - start).abs().max() > win as f64 {
                return None;
            }
            if step.norm_squared() <= eps2 {
                return Some(Point2::new(c.x as f32, c.y as f32));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_pose_core::GrayImage;

    /// Anti-aliased dark square with its corner at a sub-pixel location.
    fn soft_square(width: usize, x0: f32, y0: f32, side: f32) -> GrayImage {
        let mut img = GrayImage::filled(width, width, 255);
        const SS: usize = 8;
        for y in 0..width {
            for x in 0..width {
                let mut dark = 0usize;
                for sy in 0..SS {
                    for sx in 0..SS {
                        // Pixel (x, y) spans [x - 0.5, x + 0.5].
                        let fx = x as f32 - 0.5 + (sx as f32 + 0.5) / SS as f32;
                        let fy = y as f32 - 0.5 + (sy as f32 + 0.5) / SS as f32;
                        if fx >= x0 && fx <= x0 + side && fy >= y0 && fy <= y0 + side {
                            dark += 1;
                        }
                    }
                }
                let frac = dark as f32 / (SS * SS) as f32;
                img.set(x, y, (255.0 * (1.0 - frac)).round() as u8);
            }
        }
        img
    }

    fn square_quad(x0: f32, y0: f32, side: f32) -> Quad {
        Quad::new([
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ])
    }

    #[test]
    fn corners_move_to_subpixel_truth() {
        let (x0, y0, side) = (12.3f32, 14.6f32, 30.0f32);
        let img = soft_square(60, x0, y0, side);
        let truth = square_quad(x0, y0, side);
        let rough = truth.map(|p| Point2::new(p.x.round() + 0.5, p.y.round() - 0.5));

        let refined = CornerRefiner::new(RefineParams::default()).refine(&img.view(), &rough);
        for (r, t) in refined.corners.iter().zip(truth.corners.iter()) {
            assert!((r - t).norm() < 0.25, "refined {r:?} truth {t:?}");
        }
    }

    #[test]
    fn disabled_refiner_is_identity() {
        let img = soft_square(40, 10.2, 10.7, 15.0);
        let quad = square_quad(10.0, 11.0, 15.0);
        assert_eq!(CornerRefiner::disabled().refine(&img.view(), &quad), quad);
    }

    #[test]
    fn flat_region_keeps_input() {
        let img = GrayImage::filled(30, 30, 128);
        let quad = square_quad(5.0, 5.0, 15.0);
        let refined = CornerRefiner::new(RefineParams::default()).refine(&img.view(), &quad);
        assert_eq!(refined, quad);
    }
}
