//! End-to-end analysis of one uploaded case.
//!
//! ```text
//! zip bytes -> CaseArchive -> NiftiVolume x2 -> input tensor -> model
//!           -> TumorRegion records -> summary + prompt -> overlay PNG
//! ```
//!
//! Every stage runs synchronously on the calling thread (resampling and
//! region extraction fan out over rayon). The server calls
//! [`Pipeline::analyze`] from a blocking task.

use crate::archive::{CaseArchive, Modality};
use crate::error::{Error, Result};
use crate::model::{evaluate, SegmentationMetrics, SegmentationModel};
use crate::nifti::NiftiVolume;
use crate::regions::{
    build_prompt, summarize, ExtractorConfig, RegionExtractor, RegionSummary, TumorRegion,
};
use crate::render::{OverlayRenderer, PANEL_SIZE};
use crate::transforms::{normalize_by_max, ResampleConfig, VolumeResampler, NUM_CLASSES};
use base64::Engine as _;
use ndarray::{s, Array4, Axis};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Slice shown in the overlay figure.
pub const OVERLAY_SLICE: usize = 60;

/// Settings for every pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub resample: ResampleConfig,
    pub extractor: ExtractorConfig,
    /// Index into the stacked slices, not the source volume.
    pub overlay_slice: usize,
    pub panel_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resample: ResampleConfig::default(),
            extractor: ExtractorConfig::default(),
            overlay_slice: OVERLAY_SLICE,
            panel_size: PANEL_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn resample(mut self, resample: ResampleConfig) -> Self {
        self.resample = resample;
        self
    }

    pub fn extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn overlay_slice(mut self, slice: usize) -> Self {
        self.overlay_slice = slice;
        self
    }

    pub fn panel_size(mut self, size: usize) -> Self {
        self.panel_size = size;
        self
    }

    /// Reject settings that would fail on every request.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.extractor.threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(Error::Configuration(format!(
                "threshold must be in [0, 1), got {}",
                threshold
            )));
        }
        if self.overlay_slice >= self.resample.slices {
            return Err(Error::Configuration(format!(
                "overlay slice {} is outside the {} stacked slices",
                self.overlay_slice, self.resample.slices
            )));
        }
        if self.resample.slices == 0 || self.resample.size == 0 || self.panel_size == 0 {
            return Err(Error::Configuration(
                "slice count, slice size and panel size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Result of analysing one case.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub case: String,
    /// PNG-encoded overlay figure.
    pub image_png: Vec<u8>,
    pub regions: Vec<TumorRegion>,
    pub summary: Option<RegionSummary>,
    pub prompt: String,
    /// Present when the archive carried a ground-truth segmentation.
    pub evaluation: Option<SegmentationMetrics>,
}

/// JSON body of a successful prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    /// Base64 (standard alphabet, padded) PNG.
    pub image: String,
    pub tumor_properties: Vec<TumorRegion>,
    pub gpt3_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<SegmentationMetrics>,
}

impl Analysis {
    pub fn to_response(&self) -> PredictResponse {
        PredictResponse {
            image: base64::engine::general_purpose::STANDARD.encode(&self.image_png),
            tumor_properties: self.regions.clone(),
            gpt3_prompt: self.prompt.clone(),
            evaluation: self.evaluation.clone(),
        }
    }
}

/// The configured request flow around a shared model.
pub struct Pipeline {
    model: Arc<dyn SegmentationModel>,
    config: PipelineConfig,
    resampler: VolumeResampler,
    extractor: RegionExtractor,
    renderer: OverlayRenderer,
}

impl Pipeline {
    pub fn new(model: Arc<dyn SegmentationModel>, config: PipelineConfig) -> Self {
        Self {
            model,
            resampler: VolumeResampler::new(config.resample.clone()),
            extractor: RegionExtractor::new(config.extractor.clone()),
            renderer: OverlayRenderer::new(config.panel_size),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Build the normalized `(slices, size, size, 2)` model input from an archive.
    ///
    /// Required entries are checked before anything is decoded. The optional
    /// ground-truth volume is returned alongside when present.
    pub fn load_input(
        &self,
        archive: &mut CaseArchive<'_>,
    ) -> Result<(Array4<f32>, Option<NiftiVolume>)> {
        archive.require(&Modality::INPUTS)?;
        let flair = archive.read_volume(Modality::Flair)?;
        let t1ce = archive.read_volume(Modality::T1ce)?;
        let seg = archive.read_optional(Modality::Seg)?;

        let mut input = self.resampler.build_input(&flair, &t1ce)?;
        let max = normalize_by_max(&mut input)?;
        tracing::debug!(case = archive.case(), max, "normalized input tensor");
        Ok((input, seg))
    }

    /// Run the model and check the output shape.
    pub fn predict(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let prediction = self.model.predict(input)?;
        let (slices, rows, cols, _) = input.dim();
        let expected = (slices, rows, cols, NUM_CLASSES);
        if prediction.dim() != expected {
            return Err(Error::Inference(format!(
                "model returned {:?}, expected {:?}",
                prediction.dim(),
                expected
            )));
        }
        Ok(prediction)
    }

    /// Analyse the zip archive `bytes` for case `case`.
    pub fn analyze(&self, case: &str, bytes: &[u8]) -> Result<Analysis> {
        let started = Instant::now();
        let mut archive = CaseArchive::open(bytes, case)?;

        let stage = Instant::now();
        let (input, seg) = self.load_input(&mut archive)?;
        tracing::debug!(case, elapsed_ms = stage.elapsed().as_millis() as u64, "preprocessed");

        let stage = Instant::now();
        let prediction = self.predict(&input)?;
        tracing::debug!(
            case,
            model = self.model.name(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "inference done"
        );

        let stage = Instant::now();
        let regions = self.extractor.extract(&prediction)?;
        let summary = summarize(&regions);
        let prompt = build_prompt(summary.as_ref());
        tracing::debug!(
            case,
            regions = regions.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "regions extracted"
        );

        let stage = Instant::now();
        let slice = self.config.overlay_slice;
        if slice >= prediction.len_of(Axis(0)) {
            return Err(Error::Configuration(format!(
                "overlay slice {} is outside the {} stacked slices",
                slice,
                prediction.len_of(Axis(0))
            )));
        }
        let image_png = self.renderer.render_png(
            input.slice(s![slice, .., .., 0]),
            prediction.slice(s![slice, .., .., ..]),
        )?;
        tracing::debug!(
            case,
            bytes = image_png.len(),
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "overlay rendered"
        );

        let evaluation = match seg {
            Some(seg) => {
                let truth = self.resampler.label_tensor(&seg)?;
                Some(evaluate(truth.view(), prediction.view())?)
            }
            None => None,
        };

        tracing::info!(
            case,
            regions = regions.len(),
            evaluated = evaluation.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "case analysed"
        );

        Ok(Analysis {
            case: case.to_owned(),
            image_png,
            regions,
            summary,
            prompt,
            evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overlay_slice, 60);
        assert_eq!(config.extractor.threshold, 0.5);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = PipelineConfig::default()
            .extractor(ExtractorConfig::default().threshold(1.0));
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_overlay_outside_stack() {
        let config = PipelineConfig::default().overlay_slice(155);
        assert!(config.validate().is_err());
        let config = PipelineConfig::default()
            .resample(ResampleConfig::default().slices(10))
            .overlay_slice(9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_response_encodes_image() {
        let analysis = Analysis {
            case: "c".into(),
            image_png: vec![1, 2, 3],
            regions: Vec::new(),
            summary: None,
            prompt: "p".into(),
            evaluation: None,
        };
        let json = serde_json::to_value(analysis.to_response()).unwrap();
        assert_eq!(json["image"], "AQID");
        assert_eq!(json["tumor_properties"], serde_json::json!([]));
        assert_eq!(json["gpt3_prompt"], "p");
        assert!(json.get("evaluation").is_none());
    }
}
