//! Square fiducial marker dictionaries, candidate search and decoding.
//!
//! This crate covers the image side of marker detection:
//! - embedded built-in dictionaries (compiled into the binary),
//! - [`CandidateExtractor`]: adaptive threshold, contour tracing and
//!   polygon approximation down to convex quads,
//! - [`SymbolDecoder`]: bit-grid sampling through a homography and
//!   bounded-distance matching with rotation recovery,
//! - [`CornerRefiner`]: iterative sub-pixel corner refinement.
//!
//! It does **not** estimate poses; see `fiducial-pose-pnp` for that.
//!
//! ```
//! use fiducial_pose_aruco::{builtins, draw_marker, CandidateExtractor, DecoderParams, SymbolDecoder};
//! use fiducial_pose_core::GrayImage;
//!
//! let dict = builtins::DICT_4X4_50;
//! let marker = draw_marker(&dict, 7, 6).unwrap();
//! let mut img = GrayImage::filled(64, 64, 255);
//! for y in 0..marker.height {
//!     for x in 0..marker.width {
//!         img.set(x + 14, y + 14, marker.get(x, y));
//!     }
//! }
//!
//! let decoder = SymbolDecoder::new(dict, DecoderParams::default());
//! let ids: Vec<u32> = CandidateExtractor::default()
//!     .candidates(img.view())
//!     .filter_map(|quad| decoder.decode(&img.view(), &quad).ok())
//!     .map(|m| m.id)
//!     .collect();
//! assert_eq!(ids, vec![7]);
//! ```

pub mod builtins;
mod candidates;
mod contour;
mod decode;
mod dictionary;
mod draw;
mod matcher;
mod refine;
mod threshold;

pub use candidates::{CandidateExtractor, CandidateParams, Candidates};
pub use decode::{CandidateRejected, DecodedMarker, DecoderParams, SymbolDecoder};
pub use dictionary::Dictionary;
pub use draw::{draw_marker, marker_cells};
pub use matcher::{rotate_code_u64, Match, MatchFailure, Matcher};
pub use refine::{CornerRefiner, RefineParams};
