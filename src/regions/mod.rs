//! Tumor regions from class probabilities.
//!
//! Probabilities are thresholded per slice, the mask is split into
//! connected components, and each component becomes a [`TumorRegion`].
//! [`summarize`] and [`build_prompt`] reduce the records to the text sent
//! with the response.

pub mod extract;
pub mod label;
pub mod summary;

pub use extract::{ExtractorConfig, MaskMode, RegionExtractor, TumorRegion};
pub use label::{label_components, Connectivity};
pub use summary::{build_prompt, summarize, RegionSummary};
