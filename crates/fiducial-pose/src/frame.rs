//! Raw camera frames and their conversion to grayscale.

use crate::io::FrameError;
use fiducial_pose_core::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel layout of raw frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// One byte per pixel.
    #[default]
    Gray8,
    /// Full-resolution Y plane followed by interleaved half-resolution UV.
    Nv12,
}

impl ImageFormat {
    /// Byte length of one `width × height` frame.
    pub fn frame_len(self, width: usize, height: usize) -> usize {
        match self {
            Self::Gray8 => width * height,
            Self::Nv12 => width * height + 2 * width.div_ceil(2) * height.div_ceil(2),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Gray8 => "gray8",
            Self::Nv12 => "nv12",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gray8" => Ok(Self::Gray8),
            "nv12" => Ok(Self::Nv12),
            _ => Err(FrameError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// One grayscale frame with its capture time.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub image: GrayImage,
    pub timestamp_ns: u64,
}

impl Frame {
    pub fn new(image: GrayImage, timestamp_ns: u64) -> Self {
        Self {
            image,
            timestamp_ns,
        }
    }

    /// Convert a raw buffer to grayscale. NV12 keeps only its Y plane.
    pub fn from_raw(
        format: ImageFormat,
        width: usize,
        height: usize,
        data: &[u8],
        timestamp_ns: u64,
    ) -> Result<Self, FrameError> {
        let expected = format.frame_len(width, height);
        if data.len() != expected {
            return Err(FrameError::Malformed {
                expected,
                actual: data.len(),
            });
        }
        let luma = &data[..width * height];
        let image = GrayImage::from_raw(width, height, luma.to_vec())?;
        Ok(Self::new(image, timestamp_ns))
    }
}
