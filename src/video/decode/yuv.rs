use crate::video::decode::{Decoder, VideoDetails};
use crate::video::{Frame, PlaneData};
use crate::MetricsError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A decoder for headerless planar YUV 4:2:0 streams with 8-bit samples.
///
/// Each frame is stored as the full Y plane followed by the U and V planes,
/// with no padding between planes or frames.
pub struct YuvDecoder<R: Read> {
    inner: R,
    details: VideoDetails,
}

impl<R: Read> YuvDecoder<R> {
    /// Wraps a reader positioned at the start of a frame.
    pub fn new(inner: R, width: usize, height: usize) -> Result<Self, MetricsError> {
        if width == 0 || height == 0 {
            return Err(MetricsError::InvalidInput {
                reason: "Width and height must be positive",
            });
        }
        let details = VideoDetails { width, height };
        if details.checked_frame_size().is_none() {
            return Err(MetricsError::InvalidInput {
                reason: "Frame dimensions are too large",
            });
        }

        Ok(Self { inner, details })
    }

    /// The number of bytes consumed by each successfully decoded frame.
    pub fn frame_size(&self) -> usize {
        self.details.frame_size()
    }

    /// Unwraps this decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl YuvDecoder<BufReader<File>> {
    /// Initialize a new decoder for a given input file
    pub fn open<P: AsRef<Path>>(input: P, width: usize, height: usize) -> Result<Self, String> {
        let file = File::open(input).map_err(|e| e.to_string())?;
        Self::new(BufReader::new(file), width, height).map_err(|e| e.to_string())
    }

    /// The number of whole frames in the underlying file, counted from its start.
    pub fn count_frames(&self) -> Result<usize, String> {
        let len = self
            .inner
            .get_ref()
            .metadata()
            .map_err(|e| e.to_string())?
            .len();
        Ok(len as usize / self.frame_size())
    }
}

impl<R: Read> Decoder for YuvDecoder<R> {
    fn read_video_frame(&mut self) -> Result<Frame, MetricsError> {
        let (chroma_width, chroma_height) = self.details.chroma_dimensions();
        let y = read_plane(&mut self.inner, self.details.width, self.details.height)?;
        let u = read_plane(&mut self.inner, chroma_width, chroma_height)?;
        let v = read_plane(&mut self.inner, chroma_width, chroma_height)?;

        Ok(Frame { planes: [y, u, v] })
    }

    fn get_video_details(&self) -> VideoDetails {
        self.details
    }
}

fn read_plane<R: Read>(
    reader: &mut R,
    width: usize,
    height: usize,
) -> Result<PlaneData, MetricsError> {
    let len = width * height;
    // Only allocates for bytes present in the stream.
    let mut data = Vec::new();
    match reader.by_ref().take(len as u64).read_to_end(&mut data) {
        Ok(read) if read == len => (),
        Ok(read) => {
            debug!("Short read on a {}x{} plane: {} of {} bytes", width, height, read, len);
            return Err(MetricsError::DecodeFailed {
                reason: "frame read failed",
            });
        }
        Err(err) => {
            debug!("Failed reading a {}x{} plane: {}", width, height, err);
            return Err(MetricsError::DecodeFailed {
                reason: "frame read failed",
            });
        }
    }

    Ok(PlaneData {
        width,
        height,
        data,
    })
}
