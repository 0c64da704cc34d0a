//! 2-D plane resampling.
//!
//! Resizing is separable: each output axis gets a table of
//! `(source index, weight)` taps, applied first along columns and then
//! along rows. Tap conventions follow OpenCV's `resize`, so a model trained
//! on `cv2.resize` output sees the same pixel grid.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};

/// Interpolation kernel for slice resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest neighbour, `src = floor(dst * scale)`.
    Nearest,
    /// Bilinear with half-pixel centres and edge clamping.
    #[default]
    Linear,
    /// Pixel-area averaging when shrinking, bilinear when enlarging.
    Area,
}

impl std::str::FromStr for Interpolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" | "bilinear" => Ok(Self::Linear),
            "area" => Ok(Self::Area),
            _ => Err(Error::Configuration(format!(
                "unknown interpolation '{}' (expected nearest, linear or area)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Area => "area",
        })
    }
}

type Taps = Vec<Vec<(usize, f32)>>;

fn linear_taps(src: usize, dst: usize) -> Taps {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let pos = (d as f64 + 0.5) * scale - 0.5;
            let mut i0 = pos.floor();
            let mut frac = pos - i0;
            if i0 < 0.0 {
                i0 = 0.0;
                frac = 0.0;
            }
            let mut i0 = i0 as usize;
            if i0 + 1 >= src {
                i0 = src - 1;
                frac = 0.0;
            }
            if frac == 0.0 {
                vec![(i0, 1.0)]
            } else {
                vec![(i0, (1.0 - frac) as f32), (i0 + 1, frac as f32)]
            }
        })
        .collect()
}

fn nearest_taps(src: usize, dst: usize) -> Taps {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| vec![(((d as f64 * scale).floor() as usize).min(src - 1), 1.0)])
        .collect()
}

fn area_taps(src: usize, dst: usize) -> Taps {
    if dst > src {
        return linear_taps(src, dst);
    }
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src);
            (first..last)
                .filter_map(|i| {
                    let overlap = end.min(i as f64 + 1.0) - start.max(i as f64);
                    (overlap > 1e-9).then(|| (i, (overlap / scale) as f32))
                })
                .collect()
        })
        .collect()
}

fn taps(src: usize, dst: usize, method: Interpolation) -> Taps {
    match method {
        Interpolation::Nearest => nearest_taps(src, dst),
        Interpolation::Linear => linear_taps(src, dst),
        Interpolation::Area => area_taps(src, dst),
    }
}

/// Resize a 2-D plane to `(rows, cols)`.
///
/// Rows of the output correspond to the first axis of `plane`.
pub fn resize_slice(
    plane: ArrayView2<'_, f32>,
    (rows, cols): (usize, usize),
    method: Interpolation,
) -> Result<Array2<f32>> {
    let (src_rows, src_cols) = plane.dim();
    if src_rows == 0 || src_cols == 0 || rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions(format!(
            "cannot resize {}x{} plane to {}x{}",
            src_rows, src_cols, rows, cols
        )));
    }

    let col_taps = taps(src_cols, cols, method);
    let row_taps = taps(src_rows, rows, method);

    // columns first: (src_rows, cols)
    let mut partial = Array2::<f32>::zeros((src_rows, cols));
    for (src_row, mut out_row) in plane.axis_iter(Axis(0)).zip(partial.axis_iter_mut(Axis(0))) {
        for (out, tap) in out_row.iter_mut().zip(&col_taps) {
            *out = tap.iter().map(|&(i, w)| src_row[i] * w).sum();
        }
    }

    let mut output = Array2::<f32>::zeros((rows, cols));
    for (mut out_row, tap) in output.axis_iter_mut(Axis(0)).zip(&row_taps) {
        for &(i, w) in tap {
            out_row.scaled_add(w, &partial.row(i));
        }
    }
    Ok(output)
}
