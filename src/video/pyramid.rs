//! Image pyramids built by repeated 2x2 average pooling.

use crate::video::PlaneData;
use crate::MetricsError;

/// Halves both dimensions of a plane by averaging each 2x2 block.
///
/// Output dimensions are rounded down, so a trailing odd row or column is
/// dropped. Each output sample is the block sum divided by 4, rounded down.
pub fn downsample_2x2(plane: &PlaneData) -> Result<PlaneData, MetricsError> {
    plane.validate()?;
    let output_width = plane.width / 2;
    let output_height = plane.height / 2;
    if output_width == 0 || output_height == 0 {
        return Err(MetricsError::InvalidInput {
            reason: "Image too small to downsample",
        });
    }

    let input = &plane.data;
    let input_width = plane.width;
    let mut output = vec![0; output_width * output_height];
    for j in 0..output_height {
        let j0 = 2 * j;
        let j1 = j0 + 1;
        for i in 0..output_width {
            let i0 = 2 * i;
            let i1 = i0 + 1;
            let sum = input[j0 * input_width + i0] as u32
                + input[j0 * input_width + i1] as u32
                + input[j1 * input_width + i0] as u32
                + input[j1 * input_width + i1] as u32;
            output[j * output_width + i] = (sum / 4) as u8;
        }
    }

    Ok(PlaneData {
        width: output_width,
        height: output_height,
        data: output,
    })
}

/// Builds a pyramid of `levels` planes. Level 0 is a copy of `plane`, and
/// every following level is the 2x2 downsampling of the one before it.
///
/// Fails if any level would have a zero dimension.
pub fn build_pyramid(plane: &PlaneData, levels: usize) -> Result<Vec<PlaneData>, MetricsError> {
    plane.validate()?;
    let mut pyramid = Vec::with_capacity(levels);
    if levels == 0 {
        return Ok(pyramid);
    }

    pyramid.push(plane.clone());
    for level in 1..levels {
        let next = downsample_2x2(&pyramid[level - 1])?;
        pyramid.push(next);
    }
    Ok(pyramid)
}
