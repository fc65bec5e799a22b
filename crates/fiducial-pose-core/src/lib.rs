//! Core types and utilities for fiducial marker pose estimation.
//!
//! This crate is small and purely geometric: 8-bit grayscale image buffers
//! with sub-pixel sampling, 4-point homographies and the clockwise [`Quad`]
//! used to hand marker candidates between pipeline stages. It knows nothing
//! about marker dictionaries or cameras.

mod homography;
mod image;
mod logger;
mod quad;

pub use homography::{homography_from_4pt, homography_from_4pt_f64, Homography};
pub use image::{
    downscale_area, get_gray, sample_bilinear, sample_bilinear_clamped, GrayImage, GrayImageView,
    ImageError,
};
pub use quad::Quad;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env, LOG_LEVEL_ENV};
