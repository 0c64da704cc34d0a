//! In-memory NIfTI volume decoding.

use super::header::{DataType, NiftiHeader};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::MultiGzDecoder;
use half::{bf16, f16};
use ndarray::{Array3, ArrayView2, Axis, ShapeBuilder};
use rayon::prelude::*;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest decoded volume accepted, in bytes.
///
/// A BraTS float64 volume is about 71 MB, so 1 GiB leaves ample headroom
/// while keeping a hostile size field from exhausting memory.
pub const MAX_VOLUME_BYTES: u64 = 1 << 30;

/// A decoded 3-D scalar volume with its header.
///
/// Voxels are held as `f32` in Fortran order, matching the on-disk layout,
/// and indexed `[x, y, z]` with `z` the slice axis.
#[derive(Debug, Clone)]
pub struct NiftiVolume {
    header: NiftiHeader,
    data: Array3<f32>,
}

impl NiftiVolume {
    /// Decode a volume from raw `.nii` bytes or gzipped `.nii.gz` bytes.
    ///
    /// Scaling from `scl_slope`/`scl_inter` is applied. A 4-D volume is
    /// accepted only when its fourth axis has length one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&GZIP_MAGIC) {
            let inflated = inflate(bytes)?;
            return Self::from_uncompressed(&inflated);
        }
        Self::from_uncompressed(bytes)
    }

    fn from_uncompressed(bytes: &[u8]) -> Result<Self> {
        let header = NiftiHeader::from_bytes(bytes)?;
        let (nx, ny, nz) = spatial_shape(&header)?;

        let offset = usize::try_from(header.vox_offset)
            .ok()
            .filter(|&offset| offset <= bytes.len())
            .ok_or_else(|| {
                Error::InvalidDimensions(format!(
                    "vox_offset {} lies beyond the {}-byte file",
                    header.vox_offset,
                    bytes.len()
                ))
            })?;
        let end = offset
            .checked_add(header.data_size())
            .ok_or_else(|| Error::InvalidDimensions("payload end overflows".into()))?;
        check_extensions(bytes, &header, offset)?;
        if bytes.len() < end {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "volume truncated: {} bytes, payload needs {}",
                    bytes.len(),
                    end
                ),
            )));
        }

        let mut values = decode_payload(&bytes[offset..end], header.datatype, header.little_endian);
        if header.has_scaling() {
            let (slope, inter) = (header.scl_slope as f32, header.scl_inter as f32);
            values.par_iter_mut().for_each(|v| *v = *v * slope + inter);
        }

        let data = Array3::from_shape_vec((nx, ny, nz).f(), values)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        Ok(Self { header, data })
    }

    /// Wrap an array as a float32 volume with unit spacing.
    pub fn from_array(data: Array3<f32>) -> Self {
        let (nx, ny, nz) = data.dim();
        let header = NiftiHeader {
            ndim: 3,
            dim: [nx as i64, ny as i64, nz as i64, 1, 1, 1, 1],
            datatype: DataType::Float32,
            ..NiftiHeader::default()
        };
        Self { header, data }
    }

    /// Encode as an uncompressed little-endian NIfTI-1 float32 file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = self.header.clone();
        header.datatype = DataType::Float32;
        header.vox_offset = 352;
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;

        let mut out = header.to_bytes();
        // empty extension block
        out.extend_from_slice(&[0u8; 4]);
        out.reserve(self.data.len() * 4);
        let mut word = [0u8; 4];
        // transposed logical order walks x fastest, i.e. Fortran order
        for &v in self.data.t().iter() {
            LittleEndian::write_f32(&mut word, v);
            out.extend_from_slice(&word);
        }
        out
    }

    /// Header the volume was decoded from.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Voxel data indexed `[x, y, z]`.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Shape as `(x, y, z)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of slices along the third axis.
    pub fn num_slices(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// The 2-D plane at slice `z`, rows along `x`, columns along `y`.
    pub fn slice(&self, z: usize) -> Result<ArrayView2<'_, f32>> {
        if z >= self.num_slices() {
            return Err(Error::ShapeMismatch(format!(
                "slice {} out of range for {} slices",
                z,
                self.num_slices()
            )));
        }
        Ok(self.data.index_axis(Axis(2), z))
    }
}

/// Read `reader` to the end, giving up once more than `limit` bytes arrive.
///
/// Returns `Ok(None)` when the limit is exceeded.
pub(crate) fn read_limited<R: Read>(reader: R, limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut out = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut out)?;
    Ok((out.len() as u64 <= limit).then_some(out))
}

fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    read_limited(MultiGzDecoder::new(compressed), MAX_VOLUME_BYTES)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?
        .ok_or_else(|| {
            Error::Decompression(format!(
                "gzip stream inflates past {MAX_VOLUME_BYTES} bytes"
            ))
        })
}

/// Walk the extension chain between the header and the voxel data.
///
/// Each extension starts with `esize` and `ecode`; `esize` covers the whole
/// extension and must keep the chain short of `vox_offset`.
fn check_extensions(bytes: &[u8], header: &NiftiHeader, vox_offset: usize) -> Result<()> {
    let flag_at = header.version.header_size();
    if vox_offset < flag_at + 4 || bytes.get(flag_at).copied().unwrap_or(0) == 0 {
        return Ok(());
    }

    let mut pos = flag_at + 4;
    while pos + 8 <= vox_offset {
        let raw = bytes.get(pos..pos + 4).ok_or_else(|| {
            Error::InvalidFileFormat(format!("extension at byte {pos} is truncated"))
        })?;
        let esize = if header.little_endian {
            LittleEndian::read_i32(raw)
        } else {
            BigEndian::read_i32(raw)
        };
        if esize < 8 {
            return Err(Error::InvalidFileFormat(format!(
                "extension at byte {pos} has size {esize}"
            )));
        }
        pos += esize as usize;
        if pos > vox_offset {
            return Err(Error::InvalidFileFormat(format!(
                "extension ending at byte {pos} overlaps voxel data at {vox_offset}"
            )));
        }
    }
    Ok(())
}

fn spatial_shape(header: &NiftiHeader) -> Result<(usize, usize, usize)> {
    let shape = header.shape();
    match shape.as_slice() {
        [x, y, z] => Ok((*x, *y, *z)),
        [x, y, z, rest @ ..] if rest.iter().all(|&d| d == 1) => Ok((*x, *y, *z)),
        _ => Err(Error::InvalidDimensions(format!(
            "expected a 3-D volume, got shape {:?}",
            shape
        ))),
    }
}

fn decode_payload(raw: &[u8], datatype: DataType, little_endian: bool) -> Vec<f32> {
    if little_endian {
        decode_with::<LittleEndian>(raw, datatype)
    } else {
        decode_with::<BigEndian>(raw, datatype)
    }
}

fn decode_with<E: ByteOrder>(raw: &[u8], datatype: DataType) -> Vec<f32> {
    let convert: fn(&[u8]) -> f32 = match datatype {
        DataType::UInt8 => |b| f32::from(b[0]),
        DataType::Int8 => |b| f32::from(b[0] as i8),
        DataType::Int16 => |b| f32::from(E::read_i16(b)),
        DataType::UInt16 => |b| f32::from(E::read_u16(b)),
        DataType::Int32 => |b| E::read_i32(b) as f32,
        DataType::UInt32 => |b| E::read_u32(b) as f32,
        DataType::Int64 => |b| E::read_i64(b) as f32,
        DataType::UInt64 => |b| E::read_u64(b) as f32,
        DataType::Float16 => |b| f16::from_bits(E::read_u16(b)).to_f32(),
        DataType::BFloat16 => |b| bf16::from_bits(E::read_u16(b)).to_f32(),
        DataType::Float32 => |b| E::read_f32(b),
        DataType::Float64 => |b| E::read_f64(b) as f32,
    };
    raw.par_chunks_exact(datatype.byte_size())
        .map(convert)
        .collect()
}
