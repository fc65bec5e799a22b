//! Embedded built-in dictionaries.
//!
//! The source of truth lives in `fiducial-pose-aruco/data/*_CODES.json`; the
//! build script turns each file into a `const Dictionary` named after it.

#![allow(clippy::unreadable_literal, non_upper_case_globals)]

include!(concat!(env!("OUT_DIR"), "/builtins.rs"));
