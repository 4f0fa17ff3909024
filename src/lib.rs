//! `rdmeter` computes objective fidelity metrics between a reference and a
//! distorted raw video sequence. Metrics are evaluated on the luma plane of
//! planar YUV 4:2:0 frames.

#![allow(clippy::cast_lossless)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::unreadable_literal)]
#![deny(missing_docs)]

#[macro_use]
extern crate itertools;
#[macro_use]
extern crate log;
#[macro_use]
extern crate thiserror;

pub mod video;

/// Possible errors that may occur during processing of a metric.
///
/// A caller iterating over a sequence should stop on `DecodeFailed`
/// and skip the current frame on `InvalidInput`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    /// Indicates a frame could not be read in full from an input stream.
    #[error("Could not read input frame: {reason}")]
    DecodeFailed {
        #[doc(hidden)]
        reason: &'static str,
    },
    /// Indicates the inputs to a metric were malformed, mismatched, or too small.
    #[error("Invalid metric input: {reason}")]
    InvalidInput {
        #[doc(hidden)]
        reason: &'static str,
    },
}

#[cfg(test)]
pub(crate) fn assert_metric_eq(expected: f64, value: f64) {
    assert!(
        (expected - value).abs() < 0.01,
        "Expected {}, got {}",
        expected,
        value
    );
}
