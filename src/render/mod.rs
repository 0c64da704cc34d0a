//! Overlay figure for one axial slice.
//!
//! The figure has four titled panels side by side, each showing the FLAIR
//! slice in grayscale with a probability map blended on top:
//!
//! | panel | title | overlay | colormap |
//! |---|---|---|---|
//! | 0 | All Classes | sum of the three tumor classes | [`Colormap::Reds`] |
//! | 1 | necrotic Predicted | necrotic core | [`Colormap::OrRd`] |
//! | 2 | edema Predicted | edema | [`Colormap::OrRd`] |
//! | 3 | enhancing Predicted | enhancing tumor | [`Colormap::OrRd`] |
//!
//! Both layers are autoscaled to their own value range. The figure is drawn
//! with `plotters` into an in-memory RGB buffer and encoded as PNG.

pub mod colormap;

pub use colormap::{Colormap, Scale};

use crate::error::{Error, Result};
use crate::transforms::NUM_CLASSES;
use image::{ImageFormat, RgbImage};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use plotters::prelude::*;
use std::io::Cursor;

/// Default side length of one panel in output pixels.
pub const PANEL_SIZE: usize = 256;

/// Opacity of the probability layer.
const ALPHA: f32 = 0.3;

/// Panel titles, left to right.
pub const PANEL_TITLES: [&str; 4] = [
    "All Classes",
    "necrotic Predicted",
    "edema Predicted",
    "enhancing Predicted",
];

/// Renders overlay figures.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRenderer {
    panel_size: usize,
    gutter: usize,
    title_band: usize,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(PANEL_SIZE)
    }
}

impl OverlayRenderer {
    /// Renderer with square panels of `panel_size` pixels.
    pub fn new(panel_size: usize) -> Self {
        Self {
            panel_size,
            gutter: (panel_size / 16).max(1),
            title_band: (panel_size / 8).max(16),
        }
    }

    /// Height of the title strip above the panels.
    pub fn title_band(&self) -> usize {
        self.title_band
    }

    /// Top-left pixel of panel `index` in the output image.
    pub fn panel_origin(&self, index: usize) -> (u32, u32) {
        let cell = self.panel_size + 2 * self.gutter;
        (
            (index * cell + self.gutter) as u32,
            (self.title_band + self.gutter) as u32,
        )
    }

    /// Output `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        let cell = self.panel_size + 2 * self.gutter;
        ((4 * cell) as u32, (self.title_band + cell) as u32)
    }

    /// Compose the four panels.
    ///
    /// `background` is the resampled FLAIR slice `(rows, cols)`;
    /// `probabilities` is the matching prediction slice `(rows, cols, 4)`.
    pub fn render(
        &self,
        background: ArrayView2<'_, f32>,
        probabilities: ArrayView3<'_, f32>,
    ) -> Result<RgbImage> {
        let (rows, cols, classes) = probabilities.dim();
        if classes != NUM_CLASSES || background.dim() != (rows, cols) {
            return Err(Error::Render(format!(
                "background {:?} does not match probabilities {:?}",
                background.dim(),
                probabilities.dim()
            )));
        }
        if rows == 0 || cols == 0 || self.panel_size == 0 {
            return Err(Error::Render("cannot render an empty slice".into()));
        }

        let tumor_sum = probabilities
            .slice(ndarray::s![.., .., 1..])
            .sum_axis(Axis(2));
        let layers: [(Array2<f32>, Colormap); 4] = [
            (tumor_sum, Colormap::Reds),
            (probabilities.index_axis(Axis(2), 1).to_owned(), Colormap::OrRd),
            (probabilities.index_axis(Axis(2), 2).to_owned(), Colormap::OrRd),
            (probabilities.index_axis(Axis(2), 3).to_owned(), Colormap::OrRd),
        ];

        let (width, height) = self.dimensions();
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;

            let gray = Scale::fit(background.iter());
            let gutter = self.gutter as i32;
            let font_px = (self.title_band * 5 / 8).max(10) as f64;
            let cells = root.split_evenly((1, 4));

            for ((cell, title), (layer, colormap)) in
                cells.iter().zip(PANEL_TITLES).zip(layers.iter())
            {
                let (head, body) = cell.split_vertically(self.title_band as i32);
                head.titled(title, ("sans-serif", font_px).into_font().color(&BLACK))
                    .map_err(render_error)?;
                let panel = body.margin(gutter, gutter, gutter, gutter);

                let overlay = Scale::fit(layer.iter());
                for py in 0..self.panel_size {
                    let r = py * rows / self.panel_size;
                    for px in 0..self.panel_size {
                        let c = px * cols / self.panel_size;
                        let base = Colormap::Gray.sample(gray.apply(background[[r, c]]));
                        let top = colormap.sample(overlay.apply(layer[[r, c]]));
                        let [red, green, blue] = [0, 1, 2].map(|i| {
                            let v = (1.0 - ALPHA) * base[i] + ALPHA * top[i];
                            v.round().clamp(0.0, 255.0) as u8
                        });
                        panel
                            .draw_pixel((px as i32, py as i32), &RGBColor(red, green, blue))
                            .map_err(render_error)?;
                    }
                }
            }
            root.present().map_err(render_error)?;
        }

        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| Error::Render("figure buffer has the wrong size".into()))
    }

    /// [`render`](Self::render) and encode as PNG.
    pub fn render_png(
        &self,
        background: ArrayView2<'_, f32>,
        probabilities: ArrayView3<'_, f32>,
    ) -> Result<Vec<u8>> {
        encode_png(&self.render(background, probabilities)?)
    }
}

fn render_error(err: impl std::fmt::Display) -> Error {
    Error::Render(err.to_string())
}

/// Encode an image as PNG into a fresh buffer.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
