//! 8-bit grayscale buffers and sub-pixel sampling.
//!
//! Pixel `(x, y)` has its center at integer coordinates `(x, y)`; bilinear
//! sampling at `(x, y)` therefore returns the stored value exactly.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image dimensions must be positive (got {width}x{height})")]
    EmptyImage { width: usize, height: usize },
    #[error("buffer holds {actual} bytes, {width}x{height} needs {expected}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Image of the given size with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap a row-major buffer, checking that its length matches the size.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage { width, height });
        }
        let expected = width * height;
        if data.len() != expected {
            return Err(ImageError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= (self.width - 1) as f32 && y <= (self.height - 1) as f32
    }

    pub fn to_owned_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Pixel value at integer coordinates; `0` outside the image.
#[inline]
pub fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
fn get_gray_clamped(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, src.width as i32 - 1);
    let y = y.clamp(0, src.height as i32 - 1);
    src.data[y as usize * src.width + x as usize]
}

#[inline]
fn bilinear(p00: f32, p10: f32, p01: f32, p11: f32, fx: f32, fy: f32) -> f32 {
    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear sample; pixels outside the image read as black.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    bilinear(
        get_gray(src, x0, y0) as f32,
        get_gray(src, x0 + 1, y0) as f32,
        get_gray(src, x0, y0 + 1) as f32,
        get_gray(src, x0 + 1, y0 + 1) as f32,
        fx,
        fy,
    )
}

/// Bilinear sample with edge pixels replicated outside the image.
#[inline]
pub fn sample_bilinear_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    bilinear(
        get_gray_clamped(src, x0, y0) as f32,
        get_gray_clamped(src, x0 + 1, y0) as f32,
        get_gray_clamped(src, x0, y0 + 1) as f32,
        get_gray_clamped(src, x0 + 1, y0 + 1) as f32,
        fx,
        fy,
    )
}

/// Shrink by an integer factor, averaging each `factor × factor` block.
///
/// Trailing rows/columns that do not fill a whole block are dropped. Output
/// pixel `(i, j)` covers source pixels `factor*i .. factor*i + factor - 1`, so
/// its center sits at `factor*i + (factor - 1) / 2` in source coordinates.
pub fn downscale_area(src: &GrayImageView<'_>, factor: usize) -> GrayImage {
    if factor <= 1 {
        return src.to_owned_image();
    }

    let out_w = src.width / factor;
    let out_h = src.height / factor;
    let area = (factor * factor) as u32;
    let mut out = vec![0u8; out_w * out_h];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum = 0u32;
            for dy in 0..factor {
                let row = (oy * factor + dy) * src.width + ox * factor;
                for &v in &src.data[row..row + factor] {
                    sum += v as u32;
                }
            }
            out[oy * out_w + ox] = ((sum + area / 2) / area) as u8;
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}
