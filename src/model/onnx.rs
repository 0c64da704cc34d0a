//! ONNX segmentation network executed with tract.

use super::SegmentationModel;
use crate::error::{Error, Result};
use crate::transforms::{IMG_SIZE, NUM_CLASSES};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

type Plan = TypedRunnableModel<TypedModel>;

fn inference_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Inference(format!("{context}: {err:#}"))
}

/// Segmentation network loaded from an ONNX file.
///
/// The graph is typed and optimized once for a fixed
/// `(slices, 128, 128, 2)` input, then shared read-only between requests.
pub struct OnnxSegmenter {
    plan: Plan,
    path: PathBuf,
    name: String,
    slices: usize,
}

impl std::fmt::Debug for OnnxSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSegmenter")
            .field("path", &self.path)
            .field("slices", &self.slices)
            .finish_non_exhaustive()
    }
}

impl OnnxSegmenter {
    /// Load and optimize the network at `path` for `slices` axial slices.
    pub fn load<P: AsRef<Path>>(path: P, slices: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Inference(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| inference_error("failed to read ONNX model", e))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(slices, IMG_SIZE, IMG_SIZE, 2)),
            )
            .map_err(|e| inference_error("input fact rejected", e))?
            .into_optimized()
            .map_err(|e| inference_error("graph optimization failed", e))?
            .into_runnable()
            .map_err(|e| inference_error("failed to build execution plan", e))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_owned());
        tracing::info!(model = %name, path = %path.display(), slices, "loaded segmentation model");

        Ok(Self {
            plan,
            path: path.to_path_buf(),
            name,
            slices,
        })
    }

    /// File the network was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn predict(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let expected = (self.slices, IMG_SIZE, IMG_SIZE, 2);
        if input.dim() != expected {
            return Err(Error::ShapeMismatch(format!(
                "model input must be {:?}, got {:?}",
                expected,
                input.dim()
            )));
        }

        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| Error::Inference("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| inference_error("failed to build input tensor", e))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| inference_error("inference failed", e))?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::Inference("model produced no outputs".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| inference_error("model output is not f32", e))?;

        let want = [self.slices, IMG_SIZE, IMG_SIZE, NUM_CLASSES];
        if view.shape() != want {
            return Err(Error::Inference(format!(
                "model output must be {:?}, got {:?}",
                want,
                view.shape()
            )));
        }

        Array4::from_shape_vec(
            (self.slices, IMG_SIZE, IMG_SIZE, NUM_CLASSES),
            view.iter().copied().collect(),
        )
        .map_err(|e| inference_error("output reshape failed", e))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
