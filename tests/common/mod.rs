//! Shared fixtures for integration tests.
#![allow(dead_code)]

use ndarray::{Array3, Array4, Axis};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tumorseg::{NiftiVolume, Pipeline, PipelineConfig, SegmentationModel};
use zip::write::SimpleFileOptions;

pub const CASE: &str = "BraTS20_Training_001";

/// In-plane size of fixture volumes. Slices are upsampled to 128x128.
pub const SIDE: usize = 32;
pub const SLICES: usize = 155;

/// Marks voxels whose FLAIR intensity is near the maximum as edema.
pub struct BrightSpotModel;

impl SegmentationModel for BrightSpotModel {
    fn predict(&self, input: &Array4<f32>) -> tumorseg::Result<Array4<f32>> {
        let (s, r, c, _) = input.dim();
        let mut out = Array4::<f32>::zeros((s, r, c, 4));
        for (mut probs, lane) in out
            .lanes_mut(Axis(3))
            .into_iter()
            .zip(input.lanes(Axis(3)))
        {
            if lane[0] > 0.8 {
                probs[2] = 0.9;
                probs[0] = 0.1;
            } else {
                probs[0] = 1.0;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "bright-spot"
    }
}

/// Returns a fixed wrong-shaped output.
pub struct BrokenModel;

impl SegmentationModel for BrokenModel {
    fn predict(&self, _input: &Array4<f32>) -> tumorseg::Result<Array4<f32>> {
        Ok(Array4::zeros((1, 1, 1, 4)))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

pub fn volume_bytes(f: impl Fn(usize, usize, usize) -> f32) -> Vec<u8> {
    let data = Array3::from_shape_fn((SIDE, SIDE, SLICES), |(x, y, z)| f(x, y, z));
    NiftiVolume::from_array(data).to_bytes()
}

/// True inside the bright blob: rows/cols 10..14 on slices 50..70.
pub fn in_blob(x: usize, y: usize, z: usize) -> bool {
    (10..14).contains(&x) && (10..14).contains(&y) && (50..70).contains(&z)
}

pub fn flair_bytes() -> Vec<u8> {
    volume_bytes(|x, y, z| if in_blob(x, y, z) { 100.0 } else { 10.0 })
}

pub fn t1ce_bytes() -> Vec<u8> {
    volume_bytes(|x, y, _| 20.0 + ((x + y) % 3) as f32)
}

pub fn seg_bytes() -> Vec<u8> {
    volume_bytes(|x, y, z| if in_blob(x, y, z) { 2.0 } else { 0.0 })
}

/// Zip `entries` as `(path, bytes)` pairs.
pub fn zip_of(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(
                name.as_str(),
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn entry(case: &str, suffix: &str) -> String {
    format!("{case}/{case}_{suffix}")
}

/// Archive with FLAIR and T1ce for [`CASE`].
pub fn case_zip() -> Vec<u8> {
    zip_of(&[
        (entry(CASE, "flair.nii"), flair_bytes()),
        (entry(CASE, "t1ce.nii"), t1ce_bytes()),
    ])
}

pub fn pipeline() -> Pipeline {
    Pipeline::new(Arc::new(BrightSpotModel), PipelineConfig::default())
}
