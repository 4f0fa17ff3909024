//! Contains a trait and utilities for implementing decoders.

use crate::video::Frame;
use crate::MetricsError;

mod yuv;

pub use self::yuv::*;

/// A trait for allowing metrics to decode generic raw video sources.
///
/// Raw planar 4:2:0 decoding is provided by [`YuvDecoder`]. This trait is
/// extensible so users may implement their own decoders.
pub trait Decoder {
    /// Read the next frame from the input video.
    ///
    /// Expected to return `Err(MetricsError::DecodeFailed)` if the end of the
    /// video is reached or a frame could not be read in full. The decoder
    /// should not be read from again after an error.
    fn read_video_frame(&mut self) -> Result<Frame, MetricsError>;
    /// Get the Video Details
    fn get_video_details(&self) -> VideoDetails;
}

/// The geometry of a 4:2:0 video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoDetails {
    /// Luma width in pixels.
    pub width: usize,
    /// Luma height in pixels.
    pub height: usize,
}

impl VideoDetails {
    /// Dimensions of each chroma plane. Odd luma dimensions are rounded down.
    pub fn chroma_dimensions(self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    /// The number of bytes one frame occupies in a raw stream.
    ///
    /// Panics on overflow; use [`checked_frame_size`](Self::checked_frame_size)
    /// for untrusted dimensions.
    pub fn frame_size(self) -> usize {
        let (chroma_width, chroma_height) = self.chroma_dimensions();
        self.width * self.height + 2 * chroma_width * chroma_height
    }

    /// Same as [`frame_size`](Self::frame_size), or `None` if it does not fit in a `usize`.
    pub fn checked_frame_size(self) -> Option<usize> {
        let (chroma_width, chroma_height) = self.chroma_dimensions();
        let luma = self.width.checked_mul(self.height)?;
        let chroma = chroma_width.checked_mul(chroma_height)?.checked_mul(2)?;
        luma.checked_add(chroma)
    }
}
