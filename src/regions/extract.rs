//! Thresholding and per-slice region statistics.

use super::label::{label_components, Connectivity};
use crate::error::{Error, Result};
use crate::transforms::NUM_CLASSES;
use ndarray::{s, Array2, Array4, ArrayView3, Axis};
use rayon::prelude::*;
use serde::Serialize;

/// How tumor class channels are combined before labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// One 2-D mask per slice: a pixel is tumor if any tumor class exceeds
    /// the threshold.
    #[default]
    Union,
    /// One 3-D `(row, col, class)` mask per slice over the tumor channels,
    /// labeled in three dimensions.
    PerClass,
}

impl std::str::FromStr for MaskMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "union" => Ok(Self::Union),
            "per-class" | "perclass" => Ok(Self::PerClass),
            _ => Err(Error::Configuration(format!(
                "unknown mask mode '{}' (expected union or per-class)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for MaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Union => "union",
            Self::PerClass => "per-class",
        })
    }
}

/// Region extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Probabilities strictly above this are foreground.
    pub threshold: f32,
    pub connectivity: Connectivity,
    pub mask_mode: MaskMode,
    /// Components with fewer pixels are dropped. 0 keeps everything.
    pub min_area: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            connectivity: Connectivity::default(),
            mask_mode: MaskMode::default(),
            min_area: 0,
        }
    }
}

impl ExtractorConfig {
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn mask_mode(mut self, mask_mode: MaskMode) -> Self {
        self.mask_mode = mask_mode;
        self
    }

    pub fn min_area(mut self, min_area: usize) -> Self {
        self.min_area = min_area;
        self
    }
}

/// One connected tumor component on one slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TumorRegion {
    pub slice_index: usize,
    /// Minimum coordinates followed by exclusive maximum coordinates:
    /// `[min_row, min_col, max_row, max_col]` for 2-D masks, with a class
    /// axis after each column coordinate for 3-D masks.
    pub bounding_box: Vec<usize>,
    /// Pixel (or voxel) count.
    #[serde(rename = "size")]
    pub area: usize,
    /// Centroid as `(row, col)`.
    pub center: [f64; 2],
    pub width: usize,
    pub height: usize,
}

/// Running statistics of one component.
struct Accumulator {
    area: usize,
    min: Vec<usize>,
    max: Vec<usize>,
    sum: Vec<f64>,
}

impl Accumulator {
    fn new(ndim: usize) -> Self {
        Self {
            area: 0,
            min: vec![usize::MAX; ndim],
            max: vec![0; ndim],
            sum: vec![0.0; ndim],
        }
    }

    fn add(&mut self, coord: &[usize]) {
        self.area += 1;
        for (axis, &c) in coord.iter().enumerate() {
            self.min[axis] = self.min[axis].min(c);
            self.max[axis] = self.max[axis].max(c);
            self.sum[axis] += c as f64;
        }
    }

    fn into_region(self, slice_index: usize) -> TumorRegion {
        let n = self.area as f64;
        let mut bounding_box = self.min.clone();
        bounding_box.extend(self.max.iter().map(|&m| m + 1));
        TumorRegion {
            slice_index,
            bounding_box,
            area: self.area,
            center: [self.sum[0] / n, self.sum[1] / n],
            width: self.max[1] + 1 - self.min[1],
            height: self.max[0] + 1 - self.min[0],
        }
    }
}

/// Turns class probabilities into [`TumorRegion`] records.
#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    config: ExtractorConfig,
}

impl RegionExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract regions from a `(slices, rows, cols, 4)` prediction.
    ///
    /// Records are ordered by slice, then by the raster position of each
    /// component's first pixel.
    pub fn extract(&self, prediction: &Array4<f32>) -> Result<Vec<TumorRegion>> {
        if prediction.len_of(Axis(3)) != NUM_CLASSES {
            return Err(Error::ShapeMismatch(format!(
                "prediction must have {} class channels, got {}",
                NUM_CLASSES,
                prediction.len_of(Axis(3))
            )));
        }

        let per_slice: Vec<Vec<TumorRegion>> = prediction
            .axis_iter(Axis(0))
            .into_par_iter()
            .enumerate()
            .map(|(index, slice)| self.extract_slice(index, slice))
            .collect();
        Ok(per_slice.into_iter().flatten().collect())
    }

    /// Regions of a single `(rows, cols, 4)` slice.
    pub fn extract_slice(&self, slice_index: usize, slice: ArrayView3<'_, f32>) -> Vec<TumorRegion> {
        let threshold = self.config.threshold;
        let tumor = slice.slice(s![.., .., 1..]);

        let accumulators = match self.config.mask_mode {
            MaskMode::Union => {
                let mask = Array2::from_shape_fn((slice.dim().0, slice.dim().1), |(r, c)| {
                    tumor.slice(s![r, c, ..]).iter().any(|&p| p > threshold)
                });
                let (labels, count) = label_components(mask.view(), self.config.connectivity);
                collect(labels.indexed_iter().map(|((r, c), &l)| ([r, c, 0], l)), 2, count)
            }
            MaskMode::PerClass => {
                let mask = tumor.mapv(|p| p > threshold);
                let (labels, count) = label_components(mask.view(), self.config.connectivity);
                collect(labels.indexed_iter().map(|((r, c, k), &l)| ([r, c, k], l)), 3, count)
            }
        };

        accumulators
            .into_iter()
            .filter(|acc| acc.area >= self.config.min_area)
            .map(|acc| acc.into_region(slice_index))
            .collect()
    }
}

fn collect(
    labelled: impl Iterator<Item = ([usize; 3], u32)>,
    ndim: usize,
    count: usize,
) -> Vec<Accumulator> {
    let mut accumulators: Vec<Accumulator> = (0..count).map(|_| Accumulator::new(ndim)).collect();
    for (coord, label) in labelled {
        if label > 0 {
            accumulators[label as usize - 1].add(&coord[..ndim]);
        }
    }
    accumulators
}
