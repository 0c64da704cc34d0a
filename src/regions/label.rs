//! Connected-component labeling of binary masks.

use crate::error::{Error, Result};
use ndarray::{Array, ArrayView, Dimension};
use std::collections::VecDeque;

/// Which neighbours join two foreground pixels into one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Neighbours sharing a face: 4 in 2-D, 6 in 3-D.
    Face,
    /// Every touching neighbour: 8 in 2-D, 26 in 3-D.
    #[default]
    Full,
}

impl std::str::FromStr for Connectivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "face" | "4" | "6" => Ok(Self::Face),
            "full" | "8" | "26" => Ok(Self::Full),
            _ => Err(Error::Configuration(format!(
                "unknown connectivity '{}' (expected face or full)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Face => "face",
            Self::Full => "full",
        })
    }
}

/// Neighbour offsets for `ndim` axes, excluding the origin.
fn neighbour_offsets(ndim: usize, connectivity: Connectivity) -> Vec<Vec<isize>> {
    let total = 3usize.pow(ndim as u32);
    (0..total)
        .map(|mut code| {
            let mut offset = vec![0isize; ndim];
            for axis in (0..ndim).rev() {
                offset[axis] = (code % 3) as isize - 1;
                code /= 3;
            }
            offset
        })
        .filter(|offset| {
            let moved = offset.iter().filter(|&&d| d != 0).count();
            match connectivity {
                Connectivity::Face => moved == 1,
                Connectivity::Full => moved > 0,
            }
        })
        .collect()
}

/// Label the connected components of `mask`.
///
/// Returns the label image (0 for background, components numbered from 1)
/// and the number of components. Components are numbered in raster order of
/// their first pixel. The fill is breadth-first with an explicit queue, so
/// large components cannot exhaust the stack.
pub fn label_components<D: Dimension>(
    mask: ArrayView<'_, bool, D>,
    connectivity: Connectivity,
) -> (Array<u32, D>, usize) {
    let shape = mask.shape().to_vec();
    let ndim = shape.len();
    let flat: Vec<bool> = mask.iter().copied().collect();

    let mut strides = vec![1usize; ndim];
    for axis in (0..ndim.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    let offsets = neighbour_offsets(ndim, connectivity);

    let mut labels = vec![0u32; flat.len()];
    let mut queue = VecDeque::new();
    let mut coord = vec![0usize; ndim];
    let mut count = 0u32;

    for seed in 0..flat.len() {
        if !flat[seed] || labels[seed] != 0 {
            continue;
        }
        count += 1;
        labels[seed] = count;
        queue.push_back(seed);

        while let Some(index) = queue.pop_front() {
            let mut rest = index;
            for axis in 0..ndim {
                coord[axis] = rest / strides[axis];
                rest %= strides[axis];
            }

            'neighbours: for offset in &offsets {
                let mut neighbour = 0usize;
                for axis in 0..ndim {
                    let c = coord[axis] as isize + offset[axis];
                    if c < 0 || c >= shape[axis] as isize {
                        continue 'neighbours;
                    }
                    neighbour += c as usize * strides[axis];
                }
                if flat[neighbour] && labels[neighbour] == 0 {
                    labels[neighbour] = count;
                    queue.push_back(neighbour);
                }
            }
        }
    }

    let mut image = Array::<u32, D>::zeros(mask.raw_dim());
    for (dst, label) in image.iter_mut().zip(labels) {
        *dst = label;
    }
    (image, count as usize)
}
