//! # tumorseg
//!
//! Brain-tumor segmentation as an HTTP service.
//!
//! A client uploads a zip holding the FLAIR and T1ce NIfTI volumes of one
//! case. The service stacks 155 axial slices resized to 128x128, runs a
//! segmentation network over them, turns the per-voxel class probabilities
//! into connected tumor regions, and returns the region statistics, a text
//! prompt summarizing them, and a PNG overlay of one slice.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tumorseg::{OnnxSegmenter, Pipeline, PipelineConfig};
//!
//! # fn main() -> tumorseg::Result<()> {
//! let model = OnnxSegmenter::load("model/model_2019_350.onnx", 155)?;
//! let pipeline = Pipeline::new(Arc::new(model), PipelineConfig::default());
//!
//! let bytes = std::fs::read("BraTS20_Training_001.zip")?;
//! let analysis = pipeline.analyze("BraTS20_Training_001", &bytes)?;
//! println!("{} regions", analysis.regions.len());
//! println!("{}", analysis.prompt);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`nifti`]: NIfTI-1/2 header parsing and volume decoding
//! - [`archive`]: case zip layout and entry lookup
//! - [`transforms`]: slice resampling and input tensor construction
//! - [`model`]: the network boundary and evaluation metrics
//! - [`regions`]: thresholding, labeling and region statistics
//! - [`render`]: overlay figure and PNG encoding
//! - [`pipeline`]: the request flow tying these together
//! - [`server`]: axum routes

pub mod archive;
pub mod config;
pub mod error;
pub mod model;
pub mod nifti;
pub mod pipeline;
pub mod regions;
pub mod render;
pub mod server;
pub mod transforms;

pub use error::{Error, Result};
pub use model::{OnnxSegmenter, SegmentationMetrics, SegmentationModel};
pub use nifti::NiftiVolume;
pub use pipeline::{Analysis, Pipeline, PipelineConfig, PredictResponse};
pub use regions::{ExtractorConfig, RegionSummary, TumorRegion};
