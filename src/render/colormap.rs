//! Sequential colormaps and value scaling.

/// A colormap defined by evenly spaced RGB stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Gray,
    /// White through red to dark red.
    Reds,
    /// Cream through orange to dark red.
    OrRd,
}

const REDS: [[u8; 3]; 9] = [
    [0xff, 0xf5, 0xf0],
    [0xfe, 0xe0, 0xd2],
    [0xfc, 0xbb, 0xa1],
    [0xfc, 0x92, 0x72],
    [0xfb, 0x6a, 0x4a],
    [0xef, 0x3b, 0x2c],
    [0xcb, 0x18, 0x1d],
    [0xa5, 0x0f, 0x15],
    [0x67, 0x00, 0x0d],
];

const OR_RD: [[u8; 3]; 9] = [
    [0xff, 0xf7, 0xec],
    [0xfe, 0xe8, 0xc8],
    [0xfd, 0xd4, 0x9e],
    [0xfd, 0xbb, 0x84],
    [0xfc, 0x8d, 0x59],
    [0xef, 0x65, 0x48],
    [0xd7, 0x30, 0x1f],
    [0xb3, 0x00, 0x00],
    [0x7f, 0x00, 0x00],
];

const GRAY: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

impl Colormap {
    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            Self::Gray => &GRAY,
            Self::Reds => &REDS,
            Self::OrRd => &OR_RD,
        }
    }

    /// Colour for `t` in `[0, 1]`, linearly interpolated between stops.
    pub fn sample(self, t: f32) -> [f32; 3] {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = t * (stops.len() - 1) as f32;
        let lo = (pos.floor() as usize).min(stops.len() - 2);
        let frac = pos - lo as f32;
        let (a, b) = (stops[lo], stops[lo + 1]);
        [0, 1, 2].map(|i| f32::from(a[i]) + (f32::from(b[i]) - f32::from(a[i])) * frac)
    }
}

/// Linear map onto `[0, 1]` from an observed value range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    lo: f32,
    span: f32,
}

impl Scale {
    /// Scale spanning the finite minimum and maximum of `values`.
    ///
    /// A constant (or empty) input maps everything to zero.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a f32>) -> Self {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self { lo, span: hi - lo }
    }

    pub fn apply(&self, v: f32) -> f32 {
        if self.span > 0.0 && self.span.is_finite() {
            ((v - self.lo) / self.span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
