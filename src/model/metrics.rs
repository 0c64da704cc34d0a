//! Segmentation quality metrics.
//!
//! These are the named metrics the checkpoint was trained and saved with.
//! They score a prediction against a one-hot ground truth laid out as
//! `(slices, rows, cols, classes)`.

use crate::error::{Error, Result};
use ndarray::{ArrayView4, Axis, Zip};
use serde::Serialize;

/// Metric names, in the order they are reported.
pub const METRIC_NAMES: [&str; 8] = [
    "dice_coef",
    "dice_coef_necrotic",
    "dice_coef_edema",
    "dice_coef_enhancing",
    "precision",
    "sensitivity",
    "specificity",
    "accuracy",
];

const KERAS_EPSILON: f64 = 1e-7;
const DICE_EPSILON: f64 = 1e-6;

/// Scores of one prediction against its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationMetrics {
    pub dice_coef: f64,
    pub dice_coef_necrotic: f64,
    pub dice_coef_edema: f64,
    pub dice_coef_enhancing: f64,
    pub precision: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    /// Mean intersection-over-union of the argmax labels.
    pub accuracy: f64,
}

impl SegmentationMetrics {
    /// `(name, value)` pairs in [`METRIC_NAMES`] order.
    pub fn entries(&self) -> [(&'static str, f64); 8] {
        [
            (METRIC_NAMES[0], self.dice_coef),
            (METRIC_NAMES[1], self.dice_coef_necrotic),
            (METRIC_NAMES[2], self.dice_coef_edema),
            (METRIC_NAMES[3], self.dice_coef_enhancing),
            (METRIC_NAMES[4], self.precision),
            (METRIC_NAMES[5], self.sensitivity),
            (METRIC_NAMES[6], self.specificity),
            (METRIC_NAMES[7], self.accuracy),
        ]
    }
}

fn sum_pairs(
    y_true: ArrayView4<'_, f32>,
    y_pred: ArrayView4<'_, f32>,
    f: impl Fn(f64, f64) -> f64,
) -> f64 {
    let mut acc = 0.0;
    Zip::from(&y_true).and(&y_pred).for_each(|&t, &p| {
        acc += f(f64::from(t), f64::from(p));
    });
    acc
}

fn binarize(v: f64) -> f64 {
    v.clamp(0.0, 1.0).round_ties_even()
}

/// Smoothed soft Dice averaged over every class channel.
pub fn dice_coef(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    const SMOOTH: f64 = 1.0;
    let classes = y_true.len_of(Axis(3));
    let total: f64 = (0..classes)
        .map(|c| {
            let t = y_true.index_axis(Axis(3), c);
            let p = y_pred.index_axis(Axis(3), c);
            let mut inter = 0.0;
            let mut sums = 0.0;
            Zip::from(&t).and(&p).for_each(|&t, &p| {
                inter += f64::from(t) * f64::from(p);
                sums += f64::from(t) + f64::from(p);
            });
            (2.0 * inter + SMOOTH) / (sums + SMOOTH)
        })
        .sum();
    total / classes as f64
}

/// Squared-denominator Dice for a single class channel.
pub fn class_dice(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>, class: usize) -> f64 {
    let t = y_true.index_axis(Axis(3), class);
    let p = y_pred.index_axis(Axis(3), class);
    let (mut inter, mut t2, mut p2) = (0.0, 0.0, 0.0);
    Zip::from(&t).and(&p).for_each(|&t, &p| {
        let (t, p) = (f64::from(t), f64::from(p));
        inter += (t * p).abs();
        t2 += t * t;
        p2 += p * p;
    });
    2.0 * inter / (t2 + p2 + DICE_EPSILON)
}

/// Dice of the necrotic core channel.
pub fn dice_coef_necrotic(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    class_dice(y_true, y_pred, 1)
}

/// Dice of the edema channel.
pub fn dice_coef_edema(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    class_dice(y_true, y_pred, 2)
}

/// Dice of the enhancing tumor channel.
pub fn dice_coef_enhancing(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    class_dice(y_true, y_pred, 3)
}

/// Rounded true positives over rounded predicted positives.
pub fn precision(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    let tp = sum_pairs(y_true, y_pred, |t, p| binarize(t * p));
    let predicted = sum_pairs(y_true, y_pred, |_, p| binarize(p));
    tp / (predicted + KERAS_EPSILON)
}

/// Rounded true positives over rounded actual positives.
pub fn sensitivity(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    let tp = sum_pairs(y_true, y_pred, |t, p| binarize(t * p));
    let actual = sum_pairs(y_true, y_pred, |t, _| binarize(t));
    tp / (actual + KERAS_EPSILON)
}

/// Rounded true negatives over rounded actual negatives.
pub fn specificity(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    let tn = sum_pairs(y_true, y_pred, |t, p| binarize((1.0 - t) * (1.0 - p)));
    let negatives = sum_pairs(y_true, y_pred, |t, _| binarize(1.0 - t));
    tn / (negatives + KERAS_EPSILON)
}

fn argmax(lane: ndarray::ArrayView1<'_, f32>) -> usize {
    lane.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

/// Mean IoU of the argmax class maps, over classes that occur in either map.
pub fn mean_iou(y_true: ArrayView4<'_, f32>, y_pred: ArrayView4<'_, f32>) -> f64 {
    let classes = y_true.len_of(Axis(3));
    let mut confusion = vec![0u64; classes * classes];
    for (t, p) in y_true.lanes(Axis(3)).into_iter().zip(y_pred.lanes(Axis(3))) {
        confusion[argmax(t) * classes + argmax(p)] += 1;
    }

    let mut total = 0.0;
    let mut present = 0usize;
    for c in 0..classes {
        let tp = confusion[c * classes + c];
        let row: u64 = confusion[c * classes..(c + 1) * classes].iter().sum();
        let col: u64 = (0..classes).map(|r| confusion[r * classes + c]).sum();
        let union = row + col - tp;
        if union > 0 {
            total += tp as f64 / union as f64;
            present += 1;
        }
    }
    if present == 0 {
        0.0
    } else {
        total / present as f64
    }
}

/// Compute every metric in [`METRIC_NAMES`].
pub fn evaluate(
    y_true: ArrayView4<'_, f32>,
    y_pred: ArrayView4<'_, f32>,
) -> Result<SegmentationMetrics> {
    if y_true.shape() != y_pred.shape() {
        return Err(Error::ShapeMismatch(format!(
            "ground truth {:?} vs prediction {:?}",
            y_true.shape(),
            y_pred.shape()
        )));
    }
    if y_true.len_of(Axis(3)) != crate::transforms::NUM_CLASSES {
        return Err(Error::ShapeMismatch(format!(
            "expected {} class channels, got {}",
            crate::transforms::NUM_CLASSES,
            y_true.len_of(Axis(3))
        )));
    }

    Ok(SegmentationMetrics {
        dice_coef: dice_coef(y_true, y_pred),
        dice_coef_necrotic: dice_coef_necrotic(y_true, y_pred),
        dice_coef_edema: dice_coef_edema(y_true, y_pred),
        dice_coef_enhancing: dice_coef_enhancing(y_true, y_pred),
        precision: precision(y_true, y_pred),
        sensitivity: sensitivity(y_true, y_pred),
        specificity: specificity(y_true, y_pred),
        accuracy: mean_iou(y_true, y_pred),
    })
}
