//! Command-line and environment configuration.

use crate::error::Result;
use crate::pipeline::{PipelineConfig, OVERLAY_SLICE};
use crate::regions::{Connectivity, ExtractorConfig, MaskMode};
use crate::transforms::{Interpolation, ResampleConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Brain-tumor segmentation service.
#[derive(Debug, Clone, Parser)]
#[command(name = "tumorseg", version, about)]
pub struct Cli {
    /// ONNX export of the segmentation network.
    #[arg(long, env = "TUMORSEG_MODEL", default_value = "model/model_2019_350.onnx")]
    pub model: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "TUMORSEG_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "TUMORSEG_MAX_UPLOAD_MB", default_value_t = 512)]
    pub max_upload_mb: usize,

    /// Probability a voxel must exceed to count as tumor.
    #[arg(long, env = "TUMORSEG_THRESHOLD", default_value_t = 0.5)]
    pub threshold: f32,

    /// Component connectivity: `face` or `full`.
    #[arg(long, env = "TUMORSEG_CONNECTIVITY", default_value_t = Connectivity::Full)]
    pub connectivity: Connectivity,

    /// Mask construction: `union` or `per-class`.
    #[arg(long, env = "TUMORSEG_MASK_MODE", default_value_t = MaskMode::Union)]
    pub mask_mode: MaskMode,

    /// Drop components smaller than this many pixels.
    #[arg(long, env = "TUMORSEG_MIN_AREA", default_value_t = 0)]
    pub min_area: usize,

    /// Slice resize kernel: `nearest`, `linear` or `area`.
    #[arg(long, env = "TUMORSEG_INTERPOLATION", default_value_t = Interpolation::Linear)]
    pub interpolation: Interpolation,

    /// Stacked slice drawn in the overlay image.
    #[arg(long, env = "TUMORSEG_OVERLAY_SLICE", default_value_t = OVERLAY_SLICE)]
    pub overlay_slice: usize,
}

impl Cli {
    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Validated pipeline settings.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig::default()
            .resample(ResampleConfig::default().interpolation(self.interpolation))
            .extractor(
                ExtractorConfig::default()
                    .threshold(self.threshold)
                    .connectivity(self.connectivity)
                    .mask_mode(self.mask_mode)
                    .min_area(self.min_area),
            )
            .overlay_slice(self.overlay_slice);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tumorseg"]).unwrap();
        assert_eq!(cli.bind.port(), 5000);
        assert_eq!(cli.max_upload_bytes(), 512 * 1024 * 1024);
        let config = cli.pipeline_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_reach_pipeline_config() {
        let cli = Cli::try_parse_from([
            "tumorseg",
            "--threshold",
            "0.7",
            "--connectivity",
            "face",
            "--mask-mode",
            "per-class",
            "--min-area",
            "5",
            "--interpolation",
            "area",
            "--overlay-slice",
            "10",
        ])
        .unwrap();
        let config = cli.pipeline_config().unwrap();
        assert_eq!(config.extractor.threshold, 0.7);
        assert_eq!(config.extractor.connectivity, Connectivity::Face);
        assert_eq!(config.extractor.mask_mode, MaskMode::PerClass);
        assert_eq!(config.extractor.min_area, 5);
        assert_eq!(config.resample.interpolation, Interpolation::Area);
        assert_eq!(config.overlay_slice, 10);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Cli::try_parse_from(["tumorseg", "--connectivity", "diagonal"]).is_err());

        let cli = Cli::try_parse_from(["tumorseg", "--threshold", "1.5"]).unwrap();
        assert!(matches!(cli.pipeline_config(), Err(Error::Configuration(_))));

        let cli = Cli::try_parse_from(["tumorseg", "--overlay-slice", "155"]).unwrap();
        assert!(cli.pipeline_config().is_err());
    }
}
