//! Four-corner polygons handed between detection stages.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A quadrilateral in image pixel coordinates.
///
/// Detection stages keep corners clockwise on screen (positive shoelace sum
/// with y pointing down). After decoding, corner 0 is the marker's top-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Shoelace sum over the corners, halved.
    ///
    /// Positive when the corners run clockwise on screen.
    pub fn signed_area(&self) -> f32 {
        let c = &self.corners;
        let mut acc = 0.0f32;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        0.5 * acc
    }

    #[inline]
    pub fn is_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Same corners, reversed if needed so they run clockwise.
    pub fn to_clockwise(self) -> Self {
        if self.is_clockwise() {
            return self;
        }
        let [a, b, c, d] = self.corners;
        Self::new([a, d, c, b])
    }

    /// True when every turn has the same non-zero sign.
    ///
    /// Self-intersecting (bow-tie) quads always fail this test.
    pub fn is_convex(&self) -> bool {
        let c = &self.corners;
        let mut sign = 0.0f32;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let d = c[(i + 2) % 4];
            let cross = (b.x - a.x) * (d.y - b.y) - (b.y - a.y) * (d.x - b.x);
            if cross.abs() <= f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    pub fn side_lengths(&self) -> [f32; 4] {
        let c = &self.corners;
        std::array::from_fn(|i| (c[(i + 1) % 4] - c[i]).norm())
    }

    pub fn perimeter(&self) -> f32 {
        self.side_lengths().iter().sum()
    }

    pub fn min_side(&self) -> f32 {
        self.side_lengths().into_iter().fold(f32::INFINITY, f32::min)
    }

    /// Cyclic shift: `out[k] = corners[(k + shift) % 4]`.
    pub fn rotated(&self, shift: usize) -> Self {
        Self::new(std::array::from_fn(|k| self.corners[(k + shift) % 4]))
    }

    pub fn map(&self, f: impl Fn(Point2<f32>) -> Point2<f32>) -> Self {
        Self::new(self.corners.map(f))
    }

    /// Map corners found on an image shrunk by `factor` back to the source.
    ///
    /// With pixel centers at integer coordinates a downscaled pixel `i`
    /// covers source pixels `factor*i ..= factor*i + factor - 1`.
    pub fn upscaled(&self, factor: usize) -> Self {
        if factor <= 1 {
            return *self;
        }
        let d = factor as f32;
        let offset = 0.5 * (d - 1.0);
        self.map(|p| Point2::new(p.x * d + offset, p.y * d + offset))
    }

    /// Mean corner distance to `other` under the best cyclic alignment.
    pub fn mean_corner_distance(&self, other: &Quad) -> f32 {
        (0..4)
            .map(|shift| {
                let o = other.rotated(shift);
                self.corners
                    .iter()
                    .zip(o.corners.iter())
                    .map(|(a, b)| (a - b).norm())
                    .sum::<f32>()
                    / 4.0
            })
            .fold(f32::INFINITY, f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f32, y0: f32, side: f32) -> Quad {
        Quad::new([
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ])
    }

    #[test]
    fn screen_clockwise_square_has_positive_area() {
        let q = square(2.0, 3.0, 10.0);
        assert!(q.is_clockwise());
        assert_relative_eq!(q.signed_area(), 100.0);
        assert_relative_eq!(q.perimeter(), 40.0);
        assert!(q.is_convex());
    }

    #[test]
    fn counter_clockwise_input_is_reversed() {
        let q = square(0.0, 0.0, 4.0);
        let [a, b, c, d] = q.corners;
        let ccw = Quad::new([a, d, c, b]);
        assert!(!ccw.is_clockwise());
        let fixed = ccw.to_clockwise();
        assert!(fixed.is_clockwise());
        assert_eq!(fixed.corners[0], a);
    }

    #[test]
    fn bow_tie_is_not_convex() {
        let q = Quad::new([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ]);
        assert!(!q.is_convex());
    }

    #[test]
    fn distance_ignores_starting_corner() {
        let q = square(5.0, 5.0, 20.0);
        assert_relative_eq!(q.mean_corner_distance(&q.rotated(3)), 0.0);
        let shifted = q.map(|p| Point2::new(p.x + 1.0, p.y));
        assert_relative_eq!(q.mean_corner_distance(&shifted), 1.0);
    }

    #[test]
    fn upscaled_accounts_for_pixel_centers() {
        let q = square(0.0, 0.0, 10.0).upscaled(2);
        assert_relative_eq!(q.corners[0].x, 0.5);
        assert_relative_eq!(q.corners[2].y, 20.5);
        assert_eq!(square(1.0, 1.0, 1.0).upscaled(1), square(1.0, 1.0, 1.0));
    }
}
