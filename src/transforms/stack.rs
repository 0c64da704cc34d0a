//! Volume stacking: slices from each modality resized and packed into the
//! model's channels-last input tensor.

use super::resample::{resize_slice, Interpolation};
use crate::error::{Error, Result};
use crate::nifti::NiftiVolume;
use ndarray::{s, Array3, Array4, Axis};
use rayon::prelude::*;

/// Number of axial slices fed to the model.
pub const VOLUME_SLICES: usize = 155;
/// Side length of each resized slice.
pub const IMG_SIZE: usize = 128;
/// First source slice used.
pub const VOLUME_START_AT: usize = 0;
/// Output classes of the segmentation model.
pub const NUM_CLASSES: usize = 4;

/// Where and how slices are taken from the source volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleConfig {
    /// Number of slices stacked.
    pub slices: usize,
    /// Index of the first source slice.
    pub start_slice: usize,
    /// Output side length (slices are square).
    pub size: usize,
    /// Kernel used for intensity volumes. Label volumes always use nearest.
    pub interpolation: Interpolation,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            slices: VOLUME_SLICES,
            start_slice: VOLUME_START_AT,
            size: IMG_SIZE,
            interpolation: Interpolation::default(),
        }
    }
}

impl ResampleConfig {
    /// Set the number of stacked slices.
    pub fn slices(mut self, slices: usize) -> Self {
        self.slices = slices;
        self
    }

    /// Set the first source slice.
    pub fn start_slice(mut self, start: usize) -> Self {
        self.start_slice = start;
        self
    }

    /// Set the output side length.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the intensity interpolation kernel.
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Builds model input tensors from decoded volumes.
#[derive(Debug, Clone, Default)]
pub struct VolumeResampler {
    config: ResampleConfig,
}

impl VolumeResampler {
    /// Create a resampler for the given configuration.
    pub fn new(config: ResampleConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    fn check_slices(&self, volume: &NiftiVolume, what: &str) -> Result<()> {
        let needed = self.config.start_slice + self.config.slices;
        if volume.num_slices() < needed {
            return Err(Error::ShapeMismatch(format!(
                "{} volume has {} slices, need at least {}",
                what,
                volume.num_slices(),
                needed
            )));
        }
        Ok(())
    }

    /// Resize every used slice of `volume`, giving `(slices, size, size)`.
    pub fn resample_volume(
        &self,
        volume: &NiftiVolume,
        method: Interpolation,
    ) -> Result<Array3<f32>> {
        let ResampleConfig {
            slices,
            start_slice,
            size,
            ..
        } = self.config;

        let planes = (0..slices)
            .into_par_iter()
            .map(|j| resize_slice(volume.slice(start_slice + j)?, (size, size), method))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array3::<f32>::zeros((slices, size, size));
        for (mut dst, plane) in out.axis_iter_mut(Axis(0)).zip(planes) {
            dst.assign(&plane);
        }
        Ok(out)
    }

    /// Stack FLAIR and T1ce into the `(slices, size, size, 2)` input tensor.
    ///
    /// Values are raw intensities; see [`normalize_by_max`].
    pub fn build_input(&self, flair: &NiftiVolume, t1ce: &NiftiVolume) -> Result<Array4<f32>> {
        self.check_slices(flair, "flair")?;
        self.check_slices(t1ce, "t1ce")?;

        let method = self.config.interpolation;
        let (flair, t1ce) = rayon::join(
            || self.resample_volume(flair, method),
            || self.resample_volume(t1ce, method),
        );
        let (flair, t1ce) = (flair?, t1ce?);

        let (slices, size) = (self.config.slices, self.config.size);
        let mut input = Array4::<f32>::zeros((slices, size, size, 2));
        input.slice_mut(s![.., .., .., 0]).assign(&flair);
        input.slice_mut(s![.., .., .., 1]).assign(&t1ce);
        Ok(input)
    }

    /// One-hot encode a ground-truth segmentation to `(slices, size, size, 4)`.
    ///
    /// BraTS label 4 (enhancing) maps to class 3; label 3 is accepted as
    /// class 3 as well.
    pub fn label_tensor(&self, seg: &NiftiVolume) -> Result<Array4<f32>> {
        self.check_slices(seg, "seg")?;
        let labels = self.resample_volume(seg, Interpolation::Nearest)?;

        let (slices, size) = (self.config.slices, self.config.size);
        let mut onehot = Array4::<f32>::zeros((slices, size, size, NUM_CLASSES));
        for ((s, r, c), &label) in labels.indexed_iter() {
            let class = match label.round() as i64 {
                0 => 0,
                1 => 1,
                2 => 2,
                3 | 4 => 3,
                _ => return Err(Error::InvalidLabel { label }),
            };
            onehot[[s, r, c, class]] = 1.0;
        }
        Ok(onehot)
    }
}

/// Divide `tensor` in place by its global maximum and return that maximum.
///
/// A maximum that is zero, negative or not finite cannot produce a
/// `[0, 1]` tensor and is reported as [`Error::DegenerateIntensity`].
pub fn normalize_by_max(tensor: &mut Array4<f32>) -> Result<f32> {
    let max = tensor
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |acc, v| if v > acc || v.is_nan() { v } else { acc });
    if !max.is_finite() || max <= 0.0 {
        return Err(Error::DegenerateIntensity { max });
    }
    tensor.par_mapv_inplace(|v| v / max);
    Ok(max)
}
