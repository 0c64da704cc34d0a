//! Aggregate statistics and prompt text.

use super::extract::TumorRegion;
use serde::Serialize;

/// Mean statistics over a set of regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionSummary {
    pub center_row: f64,
    pub center_col: f64,
    pub size: f64,
    pub width: f64,
    pub height: f64,
}

/// Average the records, or `None` when there are none.
pub fn summarize(regions: &[TumorRegion]) -> Option<RegionSummary> {
    if regions.is_empty() {
        return None;
    }
    let n = regions.len() as f64;
    let mean = |f: fn(&TumorRegion) -> f64| regions.iter().map(f).sum::<f64>() / n;
    Some(RegionSummary {
        center_row: mean(|r| r.center[0]),
        center_col: mean(|r| r.center[1]),
        size: mean(|r| r.area as f64),
        width: mean(|r| r.width as f64),
        height: mean(|r| r.height as f64),
    })
}

const PREAMBLE: &str = "Hello GPT-3, I have some data about brain tumor detection and I would \
like to get information about what this data means. ";

/// Fill the fixed prompt template from a summary.
pub fn build_prompt(summary: Option<&RegionSummary>) -> String {
    match summary {
        Some(s) => format!(
            "{PREAMBLE}Provide information about the brain tumor detected in the MR image: \
             The tumor is located at coordinates {:.2} x {:.2}. \
             The size of the tumor is approximately {:.2} pixels square, {:.2} pixels wide \
             and {:.2} pixels high. Based on your medical knowledge, what kind of tumor could \
             this be and what dangers could it pose? Please provide detailed information.",
            s.center_row, s.center_col, s.size, s.width, s.height
        ),
        None => format!(
            "{PREAMBLE}The segmentation model found no tumor regions in the MR image. \
             Based on your medical knowledge, what could explain a scan with no detected \
             tumor, and what follow-up would you recommend? Please provide detailed information."
        ),
    }
}
