//! Structural Similarity index.
//!
//! The SSIM index is a full reference metric; in other words, the measurement
//! or prediction of image quality is based on an initial uncompressed or
//! distortion-free image as reference. SSIM is designed to improve on
//! traditional methods such as peak signal-to-noise ratio (PSNR) and mean
//! squared error (MSE).
//!
//! Local means, variances and covariance are taken from an 11-tap Gaussian
//! window (sigma 1.5), the SSIM formula is evaluated at every pixel, and the
//! resulting map is averaged.
//!
//! See https://en.wikipedia.org/wiki/Structural_similarity for more details.

use crate::video::blur::{build_gaussian_kernel, filter_separable};
use crate::video::decode::Decoder;
use crate::video::pyramid::build_pyramid;
use crate::video::{Frame, PlaneData, SequenceMetrics, VideoMetric};
use crate::MetricsError;

const SAMPLE_MAX: f64 = 255.0;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const KERNEL_SIZE: usize = 11;
const KERNEL_SIGMA: f64 = 1.5;

// These come from the original MS-SSIM implementation paper:
// https://ece.uwaterloo.ca/~z70wang/publications/msssim.pdf
// They don't add up to 1 due to rounding done in the paper.
const MS_WEIGHT: [f64; 5] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];
const MSSSIM_MIN_DIMENSION: usize = 1 << MS_WEIGHT.len();

/// Calculates the average luma SSIM score between two videos. Higher is better.
#[inline]
pub fn calculate_video_ssim<D: Decoder, F: Fn(usize)>(
    decoder1: &mut D,
    decoder2: &mut D,
    frame_limit: Option<usize>,
    progress_callback: F,
) -> Result<SequenceMetrics, MetricsError> {
    Ssim.process_video(decoder1, decoder2, frame_limit, progress_callback)
}

/// Calculates the luma SSIM score between two video frames. Higher is better.
#[inline]
pub fn calculate_frame_ssim(frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
    Ssim.process_frame(frame1, frame2)
}

/// Calculates the SSIM score between two planes of the same size.
///
/// Identical planes score exactly 1. The score is nominally in `[-1, 1]`.
pub fn calculate_plane_ssim(plane1: &PlaneData, plane2: &PlaneData) -> Result<f64, MetricsError> {
    plane1.can_compare(plane2)?;
    let kernel = build_gaussian_kernel(KERNEL_SIZE, KERNEL_SIGMA)?;
    Ok(calculate_plane_ssim_internal(plane1, plane2, &kernel))
}

struct Ssim;

impl VideoMetric for Ssim {
    fn process_frame(&self, frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
        calculate_plane_ssim(frame1.luma(), frame2.luma())
    }
}

/// Calculates the average luma MSSSIM score between two videos. Higher is better.
///
/// MSSSIM is a variant of SSIM computed over subsampled versions
/// of an image. It is designed to be a more accurate metric
/// than SSIM.
#[inline]
pub fn calculate_video_msssim<D: Decoder, F: Fn(usize)>(
    decoder1: &mut D,
    decoder2: &mut D,
    frame_limit: Option<usize>,
    progress_callback: F,
) -> Result<SequenceMetrics, MetricsError> {
    MsSsim.process_video(decoder1, decoder2, frame_limit, progress_callback)
}

/// Calculates the luma MSSSIM score between two video frames. Higher is better.
#[inline]
pub fn calculate_frame_msssim(frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
    MsSsim.process_frame(frame1, frame2)
}

/// Calculates the MSSSIM score between two planes of the same size.
///
/// Both dimensions must be at least 32, so that all five scales are non-empty.
/// The score is in `[0, 1]`; if any scale has a non-positive SSIM the result is 0.
pub fn calculate_plane_msssim(plane1: &PlaneData, plane2: &PlaneData) -> Result<f64, MetricsError> {
    plane1.can_compare(plane2)?;
    if plane1.width < MSSSIM_MIN_DIMENSION || plane1.height < MSSSIM_MIN_DIMENSION {
        return Err(MetricsError::InvalidInput {
            reason: "Image too small for MS-SSIM",
        });
    }

    let kernel = build_gaussian_kernel(KERNEL_SIZE, KERNEL_SIGMA)?;
    let (pyramid1, pyramid2) = rayon::join(
        || build_pyramid(plane1, MS_WEIGHT.len()),
        || build_pyramid(plane2, MS_WEIGHT.len()),
    );
    let (pyramid1, pyramid2) = (pyramid1?, pyramid2?);

    let mut msssim = 1.0;
    for (level1, level2, weight) in izip!(&pyramid1, &pyramid2, &MS_WEIGHT) {
        let ssim = calculate_plane_ssim_internal(level1, level2, &kernel);
        if ssim <= 0.0 {
            return Ok(0.0);
        }
        msssim *= ssim.powf(*weight);
    }
    Ok(msssim)
}

struct MsSsim;

impl VideoMetric for MsSsim {
    fn process_frame(&self, frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError> {
        calculate_plane_msssim(frame1.luma(), frame2.luma())
    }
}

/// Expects two validated planes of equal size.
fn calculate_plane_ssim_internal(plane1: &PlaneData, plane2: &PlaneData, kernel: &[f64]) -> f64 {
    let width = plane1.width;
    let height = plane1.height;

    let x2 = plane1.data.iter().map(|&x| square(x)).collect::<Vec<_>>();
    let y2 = plane2.data.iter().map(|&y| square(y)).collect::<Vec<_>>();
    let xy = plane1
        .data
        .iter()
        .zip(plane2.data.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .collect::<Vec<_>>();

    let mu1 = filter_separable(&plane1.data, width, height, kernel);
    let mu2 = filter_separable(&plane2.data, width, height, kernel);
    let x2 = filter_separable(&x2, width, height, kernel);
    let y2 = filter_separable(&y2, width, height, kernel);
    let xy = filter_separable(&xy, width, height, kernel);

    let c1 = (SSIM_K1 * SAMPLE_MAX).powi(2);
    let c2 = (SSIM_K2 * SAMPLE_MAX).powi(2);
    let ssim_sum = izip!(&mu1, &mu2, &x2, &y2, &xy)
        .map(|(&mu1, &mu2, &x2, &y2, &xy)| {
            let mu1_sq = mu1 * mu1;
            let mu2_sq = mu2 * mu2;
            let mu12 = mu1 * mu2;
            let sigma1_sq = x2 - mu1_sq;
            let sigma2_sq = y2 - mu2_sq;
            let sigma12 = xy - mu12;
            ((2.0 * mu12 + c1) * (2.0 * sigma12 + c2))
                / ((mu1_sq + mu2_sq + c1) * (sigma1_sq + sigma2_sq + c2))
        })
        .sum::<f64>();

    ssim_sum / (width * height) as f64
}

#[inline(always)]
fn square(pix: u8) -> f64 {
    let pix = pix as f64;
    pix * pix
}
