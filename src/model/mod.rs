//! Segmentation model boundary.
//!
//! The network is opaque to the rest of the crate: it maps the
//! `(slices, 128, 128, 2)` input tensor to `(slices, 128, 128, 4)` class
//! probabilities ordered background, necrotic, edema, enhancing.

pub mod metrics;
pub mod onnx;

pub use metrics::{evaluate, SegmentationMetrics, METRIC_NAMES};
pub use onnx::OnnxSegmenter;

use crate::error::Result;
use ndarray::Array4;

/// A loaded, read-only segmentation network.
pub trait SegmentationModel: Send + Sync {
    /// Per-voxel class probabilities for a normalized input tensor.
    fn predict(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Short identifier reported by the health endpoint.
    fn name(&self) -> &str;
}
