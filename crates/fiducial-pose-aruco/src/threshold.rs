//! Thresholding utilities for candidate extraction and marker decoding.

use fiducial_pose_core::GrayImageView;

/// Binary mask, row-major, `1` = foreground.
#[derive(Clone, Debug)]
pub(crate) struct BinaryImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl BinaryImage {
    #[inline]
    pub fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.data[y as usize * self.width + x as usize] != 0
    }
}

/// Summed-area table with a zero row/column in front.
pub(crate) struct IntegralImage {
    stride: usize,
    sums: Vec<u64>,
}

impl IntegralImage {
    pub fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sums = vec![0u64; stride * (img.height + 1)];
        for y in 0..img.height {
            let mut row = 0u64;
            for x in 0..img.width {
                row += img.data[y * img.width + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over the inclusive pixel rectangle `[x0, x1] × [y0, y1]`.
    #[inline]
    pub fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[(y1 + 1) * s + x1 + 1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1 + 1]
            - self.sums[(y1 + 1) * s + x0]
    }
}

/// Inverted adaptive mean threshold.
///
/// A pixel is foreground when it is at least `c` darker than the mean of the
/// `window × window` box around it (box clipped at the image edge). Flat
/// regions, however bright or dark, stay background.
pub(crate) fn adaptive_threshold_inv(
    img: &GrayImageView<'_>,
    integral: &IntegralImage,
    window: usize,
    c: f32,
) -> BinaryImage {
    let half = window / 2;
    let (w, h) = (img.width, img.height);
    let mut data = vec![0u8; w * h];

    for y in 0..h {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half).min(w - 1);
            let count = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f32;
            let mean = integral.sum(x0, y0, x1, y1) as f32 / count;
            if (img.data[y * w + x] as f32) <= mean - c {
                data[y * w + x] = 1;
            }
        }
    }

    BinaryImage {
        width: w,
        height: h,
        data,
    }
}

/// Compute Otsu threshold from a set of sample intensities.
///
/// Samples `<=` the returned value belong to the dark class.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}
