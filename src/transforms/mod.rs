//! Preprocessing from decoded volumes to the model input tensor.
//!
//! - [`resize_slice`]: 2-D resampling with OpenCV-compatible taps
//! - [`VolumeResampler`]: per-slice resampling and channel stacking
//! - [`normalize_by_max`]: global-maximum scaling into `[0, 1]`

pub mod resample;
pub mod stack;

pub use resample::{resize_slice, Interpolation};
pub use stack::{
    normalize_by_max, ResampleConfig, VolumeResampler, IMG_SIZE, NUM_CLASSES, VOLUME_SLICES,
    VOLUME_START_AT,
};
