//! Tests for in-memory NIfTI decoding of uploaded volumes.
//!
//! Covers header corruption, payload truncation, scaling, integer
//! datatypes and gzipped payloads.

use byteorder::{ByteOrder, LittleEndian};
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array3;
use std::io::Write;
use tumorseg::nifti::{DataType, NiftiVolume};
use tumorseg::Error;

/// Small volume whose value encodes its position.
fn test_volume() -> NiftiVolume {
    NiftiVolume::from_array(Array3::from_shape_fn((3, 4, 5), |(x, y, z)| {
        (x * 100 + y * 10 + z) as f32
    }))
}

#[test]
fn test_load_invalid_magic_bytes() {
    let mut bytes = test_volume().to_bytes();
    bytes[344..348].copy_from_slice(b"BAD!");

    let err = NiftiVolume::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic(_)));
    assert!(err.to_string().contains("invalid NIfTI magic"));
}

#[test]
fn test_load_unsupported_data_type() {
    let mut bytes = test_volume().to_bytes();
    bytes[70..72].copy_from_slice(&9999i16.to_le_bytes());

    match NiftiVolume::from_bytes(&bytes) {
        Err(Error::UnsupportedDataType(code)) => assert_eq!(code, 9999),
        other => panic!("expected unsupported data type, got {other:?}"),
    }
}

#[test]
fn test_roundtrip_preserves_values() {
    let volume = test_volume();
    let decoded = NiftiVolume::from_bytes(&volume.to_bytes()).unwrap();

    assert_eq!(decoded.shape(), (3, 4, 5));
    assert_eq!(decoded.header().datatype, DataType::Float32);
    assert_eq!(decoded.data(), volume.data());
    assert_eq!(decoded.slice(2).unwrap()[[1, 3]], 132.0);
}

#[test]
fn test_truncated_payload() {
    let bytes = test_volume().to_bytes();
    let err = NiftiVolume::from_bytes(&bytes[..bytes.len() - 7]).unwrap_err();
    assert!(err.to_string().contains("truncated"));
}

#[test]
fn test_header_only_is_rejected() {
    let bytes = test_volume().to_bytes();
    assert!(NiftiVolume::from_bytes(&bytes[..100]).is_err());
    assert!(NiftiVolume::from_bytes(&[]).is_err());
}

#[test]
fn test_scaling_applied() {
    let mut bytes = test_volume().to_bytes();
    LittleEndian::write_f32(&mut bytes[112..116], 2.0);
    LittleEndian::write_f32(&mut bytes[116..120], 1.0);

    let decoded = NiftiVolume::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.data()[[0, 0, 0]], 1.0);
    assert_eq!(decoded.data()[[2, 3, 4]], 234.0 * 2.0 + 1.0);
}

#[test]
fn test_int16_payload() {
    // rewrite the float payload as int16 with matching datatype and bitpix
    let volume = test_volume();
    let mut bytes = volume.to_bytes();
    bytes[70..72].copy_from_slice(&4i16.to_le_bytes());
    bytes[72..74].copy_from_slice(&16i16.to_le_bytes());
    bytes.truncate(352);
    for &v in volume.data().t().iter() {
        bytes.extend_from_slice(&(v as i16).to_le_bytes());
    }

    let decoded = NiftiVolume::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.header().datatype, DataType::Int16);
    assert_eq!(decoded.data(), volume.data());
}

#[test]
fn test_gzipped_volume() {
    let volume = test_volume();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&volume.to_bytes()).unwrap();
    let gz = encoder.finish().unwrap();

    let decoded = NiftiVolume::from_bytes(&gz).unwrap();
    assert_eq!(decoded.data(), volume.data());
}

#[test]
fn test_slice_out_of_range() {
    assert!(test_volume().slice(5).is_err());
}
