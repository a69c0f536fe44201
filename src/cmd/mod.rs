//! Command-line entry points.

pub mod batch;
pub mod ocr;
