//! Contains metrics related to video/image quality.
//!
//! All metrics operate on the luma plane of 8-bit 4:2:0 frames.

pub mod blur;
pub mod decode;
pub mod psnr;
pub mod pyramid;
pub mod ssim;

use crate::MetricsError;
use rayon::prelude::*;

pub use decode::*;

/// A container holding the data for one 4:2:0 video frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// A container holding three planes worth of video data.
    /// The indices in the array correspond to the following planes:
    ///
    /// - 0 - Y/Luma plane
    /// - 1 - U/Cb plane
    /// - 2 - V/Cr plane
    pub planes: [PlaneData; 3],
}

impl Frame {
    /// The luma plane, which is the plane every metric in this crate is computed on.
    #[inline]
    pub fn luma(&self) -> &PlaneData {
        &self.planes[0]
    }
}

/// Contains the data for one plane in a video frame. Chroma planes are stored at
/// their subsampled resolution, i.e. half the luma resolution in each dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneData {
    /// The width, in pixels, of this plane.
    pub width: usize,
    /// The height, in pixels, of this plane.
    pub height: usize,
    /// A plane's pixels are contained in this `Vec`, in row-major order.
    pub data: Vec<u8>,
}

impl PlaneData {
    /// Creates a plane of the given size with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        PlaneData {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub(crate) fn validate(&self) -> Result<(), MetricsError> {
        if self.width == 0 || self.height == 0 {
            return Err(MetricsError::InvalidInput {
                reason: "Plane dimensions must be positive",
            });
        }
        if self.data.len() != self.width * self.height {
            return Err(MetricsError::InvalidInput {
                reason: "Plane size does not match its dimensions",
            });
        }

        Ok(())
    }

    pub(crate) fn can_compare(&self, other: &Self) -> Result<(), MetricsError> {
        self.validate()?;
        other.validate()?;
        if self.width != other.width || self.height != other.height {
            return Err(MetricsError::InvalidInput {
                reason: "Plane resolutions do not match",
            });
        }

        Ok(())
    }
}

/// The per-sequence result of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SequenceMetrics {
    /// Number of frame pairs read from the inputs.
    pub frames: usize,
    /// Number of frame pairs the metric could be computed for.
    pub valid_frames: usize,
    /// Mean of the per-frame values over the valid frames, or 0 if there were none.
    pub average: f64,
}

trait VideoMetric: Sync {
    /// Computes the metric for one pair of frames.
    fn process_frame(&self, frame1: &Frame, frame2: &Frame) -> Result<f64, MetricsError>;

    /// Generic method for internal use that processes multiple frames from a video
    /// into an aggregate metric.
    ///
    /// Frames are read until `frame_limit` pairs have been read or either decoder
    /// fails, then scored in parallel. A limit of zero reads nothing and yields an
    /// empty result.
    fn process_video<D: Decoder, F: Fn(usize)>(
        &self,
        decoder1: &mut D,
        decoder2: &mut D,
        frame_limit: Option<usize>,
        progress_callback: F,
    ) -> Result<SequenceMetrics, MetricsError> {
        let mut pairs = Vec::new();
        let mut read_failed = false;
        while frame_limit.map(|limit| limit > pairs.len()).unwrap_or(true) {
            let frames = decoder1
                .read_video_frame()
                .and_then(|frame1| decoder2.read_video_frame().map(|frame2| (frame1, frame2)));
            match frames {
                Ok(frames) => {
                    pairs.push(frames);
                    progress_callback(pairs.len());
                }
                Err(err) => {
                    debug!("Stopped reading after {} frames: {}", pairs.len(), err);
                    read_failed = true;
                    break;
                }
            }
        }
        if pairs.is_empty() && read_failed {
            return Err(MetricsError::DecodeFailed {
                reason: "No readable frames found in one or more input files",
            });
        }

        let results = pairs
            .par_iter()
            .map(|(frame1, frame2)| self.process_frame(frame1, frame2))
            .collect::<Vec<_>>();

        Ok(aggregate_frame_results(&results))
    }
}

fn aggregate_frame_results(results: &[Result<f64, MetricsError>]) -> SequenceMetrics {
    let mut total = 0.0;
    let mut valid_frames = 0;
    for (frameno, result) in results.iter().enumerate() {
        match result {
            Ok(value) => {
                total += value;
                valid_frames += 1;
            }
            Err(err) => info!("Skipping frame {}: {}", frameno, err),
        }
    }
    debug!("Scored {} of {} frames", valid_frames, results.len());

    SequenceMetrics {
        frames: results.len(),
        valid_frames,
        average: if valid_frames > 0 {
            total / valid_frames as f64
        } else {
            0.0
        },
    }
}
