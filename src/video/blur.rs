//! Gaussian kernel construction and separable filtering.
//!
//! Planes are extended past their borders by mirroring: an index `i < 0`
//! samples `-i`, and an index `i >= len` samples `2 * len - i - 1`.

use crate::video::PlaneData;
use crate::MetricsError;

/// Builds a normalized 1D Gaussian kernel with `size` taps centered on `size / 2`.
///
/// The weights sum to 1 and are symmetric about the center for odd sizes.
pub fn build_gaussian_kernel(size: usize, sigma: f64) -> Result<Vec<f64>, MetricsError> {
    if size == 0 {
        return Err(MetricsError::InvalidInput {
            reason: "Kernel size must be positive",
        });
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(MetricsError::InvalidInput {
            reason: "Kernel sigma must be a positive number",
        });
    }

    let center = (size / 2) as f64;
    let denom = 2.0 * sigma.powi(2);
    let mut kernel = (0..size)
        .map(|i| {
            let dist = i as f64 - center;
            (-dist * dist / denom).exp()
        })
        .collect::<Vec<_>>();
    let sum = kernel.iter().sum::<f64>();
    for weight in kernel.iter_mut() {
        *weight /= sum;
    }
    Ok(kernel)
}

/// Blurs a plane with `kernel`, first horizontally and then vertically.
///
/// The output has the plane's dimensions and is not rounded or clamped.
pub fn apply_gaussian_filter(plane: &PlaneData, kernel: &[f64]) -> Result<Vec<f64>, MetricsError> {
    plane.validate()?;
    if kernel.is_empty() {
        return Err(MetricsError::InvalidInput {
            reason: "Kernel must not be empty",
        });
    }
    Ok(filter_separable(&plane.data, plane.width, plane.height, kernel))
}

pub(crate) fn filter_separable<T: Copy + Into<f64>>(
    src: &[T],
    width: usize,
    height: usize,
    kernel: &[f64],
) -> Vec<f64> {
    let offset = (kernel.len() / 2) as isize;

    let mut horiz = vec![0.0; width * height];
    for (in_row, out_row) in src.chunks_exact(width).zip(horiz.chunks_exact_mut(width)) {
        for x in 0..width {
            out_row[x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let pix: f64 = in_row[reflect(x as isize + k as isize - offset, width)].into();
                    weight * pix
                })
                .sum();
        }
    }

    let mut output = vec![0.0; width * height];
    for y in 0..height {
        let out_row = &mut output[(y * width)..((y + 1) * width)];
        for (k, weight) in kernel.iter().enumerate() {
            let src_y = reflect(y as isize + k as isize - offset, height);
            let in_row = &horiz[(src_y * width)..((src_y + 1) * width)];
            for (out, &pix) in out_row.iter_mut().zip(in_row.iter()) {
                *out += weight * pix;
            }
        }
    }
    output
}

/// Maps an index outside of `0..len` back inside by mirroring across the borders.
///
/// Kernels wider than the plane are mirrored repeatedly. `len` must be positive.
#[inline]
pub(crate) fn reflect(mut index: isize, len: usize) -> usize {
    let len = len as isize;
    loop {
        if index < 0 {
            index = -index;
        } else if index >= len {
            index = 2 * len - index - 1;
        } else {
            return index as usize;
        }
    }
}
