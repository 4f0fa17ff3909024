//! Peak Signal-to-Noise Ratio metric.
//!
//! PSNR is most easily defined via the mean squared error between two images.
//!
//! See https://en.wikipedia.org/wiki/Peak_signal-to-noise_ratio for more details.

use crate::video::decode::Decoder;
use crate::video::{Frame, PlaneData, SequenceMetrics, VideoMetric};
use crate::MetricsError;

/// The PSNR reported for bit-identical planes, in place of infinity.
pub const PSNR_IDENTICAL: f64 = 100.0;

const SAMPLE_MAX: f64 = 255.0;

/// Calculates the average luma PSNR for two videos. Higher is better.
///
/// Frames are compared until `frame_limit` is reached or either video ends.
/// PSNR is capped at 100 in order to avoid skewed statistics
/// from e.g. all black frames, which would
/// otherwise show a PSNR of infinity.
#[inline]
pub fn calculate_video_psnr<D: Decoder, F: Fn(usize)>(
    decoder1: &mut D,
    decoder2: &mut D,
    frame_limit: Option<usize>,
    progress_callback: F,
) -> Result<SequenceMetrics, MetricsError> {
    Psnr.process_video(decoder1, decoder2, frame_limit, progress_callback)
}

/// Calculates the luma PSNR for two video frames. Higher is better.
#[inline]
pub fn calculate_frame_psnr(frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
    Psnr.process_frame(frame1, frame2)
}

/// Calculates the PSNR between two planes of the same size, in dB.
///
/// Returns [`PSNR_IDENTICAL`] when the planes are bit-identical.
pub fn calculate_plane_psnr(plane1: &PlaneData, plane2: &PlaneData) -> Result<f64, MetricsError> {
    plane1.can_compare(plane2)?;
    Ok(calculate_psnr(calculate_plane_mse(plane1, plane2)))
}

struct Psnr;

impl VideoMetric for Psnr {
    fn process_frame(&self, frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
        calculate_plane_psnr(frame1.luma(), frame2.luma())
    }
}

fn calculate_plane_mse(plane1: &PlaneData, plane2: &PlaneData) -> f64 {
    let sq_err = plane1
        .data
        .iter()
        .zip(plane2.data.iter())
        .map(|(&a, &b)| a as f64 - b as f64)
        .map(|err| err * err)
        .sum::<f64>();
    sq_err / plane1.data.len() as f64
}

fn calculate_psnr(mse: f64) -> f64 {
    if mse == 0.0 {
        return PSNR_IDENTICAL;
    }
    20.0 * (SAMPLE_MAX / mse.sqrt()).log10()
}
