//! `NIfTI` header parsing.
//!
//! Both NIfTI-1 (348-byte) and NIfTI-2 (540-byte) headers are recognised,
//! in either byte order. Only the fields needed to locate and decode the
//! voxel payload are kept.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// 348-byte header with 16-bit dimensions.
    #[default]
    Nifti1,
    /// 540-byte header with 64-bit dimensions.
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }
}

/// Byte offsets of the NIfTI-1 fields we read or write.
mod offsets_v1 {
    pub const SIZEOF_HDR: usize = 0;
    pub const DIM: usize = 40;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const SCL_SLOPE: usize = 112;
    pub const SCL_INTER: usize = 116;
    pub const XYZT_UNITS: usize = 123;
    pub const SFORM_CODE: usize = 254;
    pub const SROW_X: usize = 280;
    pub const MAGIC: usize = 344;
}

/// Byte offsets of the NIfTI-2 fields we read.
mod offsets_v2 {
    pub const MAGIC: usize = 4;
    pub const DATATYPE: usize = 12;
    pub const BITPIX: usize = 14;
    pub const DIM: usize = 16;
    pub const PIXDIM: usize = 104;
    pub const VOX_OFFSET: usize = 168;
    pub const SCL_SLOPE: usize = 176;
    pub const SCL_INTER: usize = 184;
}

/// `NIfTI` data type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum DataType {
    /// Unsigned 8-bit integer
    UInt8 = 2,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Signed 32-bit integer
    Int32 = 8,
    /// 32-bit floating point
    Float32 = 16,
    /// 64-bit floating point
    Float64 = 64,
    /// Signed 8-bit integer
    Int8 = 256,
    /// Unsigned 16-bit integer
    UInt16 = 512,
    /// Unsigned 32-bit integer
    UInt32 = 768,
    /// Signed 64-bit integer
    Int64 = 1024,
    /// Unsigned 64-bit integer
    UInt64 = 1280,
    /// IEEE 754 half precision
    Float16 = 16384,
    /// bfloat16
    BFloat16 = 16385,
}

impl DataType {
    /// Parse from a `NIfTI` datatype code.
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(Self::UInt8),
            4 => Ok(Self::Int16),
            8 => Ok(Self::Int32),
            16 => Ok(Self::Float32),
            64 => Ok(Self::Float64),
            256 => Ok(Self::Int8),
            512 => Ok(Self::UInt16),
            768 => Ok(Self::UInt32),
            1024 => Ok(Self::Int64),
            1280 => Ok(Self::UInt64),
            16384 => Ok(Self::Float16),
            16385 => Ok(Self::BFloat16),
            _ => Err(Error::UnsupportedDataType(code)),
        }
    }

    /// Size of each element in bytes.
    pub const fn byte_size(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Rust type name, used in diagnostics.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::UInt8 => "u8",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::UInt16 => "u16",
            Self::Int32 => "i32",
            Self::UInt32 => "u32",
            Self::Int64 => "i64",
            Self::UInt64 => "u64",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Parsed NIfTI header.
///
/// Dimensions are widened to `i64` and floats to `f64` so that one struct
/// covers both format versions.
#[derive(Debug, Clone)]
pub struct NiftiHeader {
    /// Format version the header was read from.
    pub version: NiftiVersion,
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension; entries past `ndim` are ignored.
    pub dim: [i64; 7],
    /// Voxel storage type.
    pub datatype: DataType,
    /// qfac at index 0, voxel sizes at `1..=ndim`.
    pub pixdim: [f64; 8],
    /// Byte offset of the voxel payload.
    pub vox_offset: i64,
    /// Intensity scaling slope (0 disables scaling).
    pub scl_slope: f64,
    /// Intensity scaling intercept.
    pub scl_inter: f64,
    pub(crate) little_endian: bool,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self {
            version: NiftiVersion::Nifti1,
            ndim: 3,
            dim: [1; 7],
            datatype: DataType::Float32,
            pixdim: [1.0; 8],
            vox_offset: 352,
            scl_slope: 1.0,
            scl_inter: 0.0,
            little_endian: true,
        }
    }
}

impl NiftiHeader {
    /// Size of a NIfTI-1 header in bytes.
    pub const SIZE: usize = 348;

    /// Read a header, detecting version and byte order from `sizeof_hdr`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::InvalidFileFormat(format!(
                "{} bytes is too short for a NIfTI header",
                bytes.len()
            )));
        }

        let (version, little_endian) = match (
            LittleEndian::read_i32(&bytes[0..4]),
            BigEndian::read_i32(&bytes[0..4]),
        ) {
            (348, _) => (NiftiVersion::Nifti1, true),
            (_, 348) => (NiftiVersion::Nifti1, false),
            (540, _) => (NiftiVersion::Nifti2, true),
            (_, 540) => (NiftiVersion::Nifti2, false),
            _ => {
                return Err(Error::InvalidMagic([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]))
            }
        };

        if bytes.len() < version.header_size() {
            return Err(Error::InvalidFileFormat(format!(
                "header truncated: got {} bytes, need {} for {:?}",
                bytes.len(),
                version.header_size(),
                version
            )));
        }

        let header = match (version, little_endian) {
            (NiftiVersion::Nifti1, true) => Self::parse_v1::<LittleEndian>(bytes, true)?,
            (NiftiVersion::Nifti1, false) => Self::parse_v1::<BigEndian>(bytes, false)?,
            (NiftiVersion::Nifti2, true) => Self::parse_v2::<LittleEndian>(bytes, true)?,
            (NiftiVersion::Nifti2, false) => Self::parse_v2::<BigEndian>(bytes, false)?,
        };
        header.validate()?;
        Ok(header)
    }

    #[allow(clippy::wildcard_imports)]
    fn parse_v1<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v1::*;

        let magic = &bytes[MAGIC..MAGIC + 4];
        if magic != b"n+1\0" && magic != b"ni1\0" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let ndim = checked_ndim(i64::from(E::read_i16(&bytes[DIM..DIM + 2])))?;
        let mut dim = [0i64; 7];
        for (i, d) in dim.iter_mut().enumerate() {
            let at = DIM + 2 + i * 2;
            *d = i64::from(E::read_i16(&bytes[at..at + 2]));
        }

        let mut pixdim = [0.0f64; 8];
        for (i, p) in pixdim.iter_mut().enumerate() {
            let at = PIXDIM + i * 4;
            *p = f64::from(E::read_f32(&bytes[at..at + 4]));
        }

        let vox_offset = E::read_f32(&bytes[VOX_OFFSET..VOX_OFFSET + 4]);
        if !vox_offset.is_finite() || vox_offset.fract() != 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset must be a finite integer, got {}",
                vox_offset
            )));
        }

        Ok(Self {
            version: NiftiVersion::Nifti1,
            ndim,
            dim,
            datatype: checked_datatype(
                E::read_i16(&bytes[DATATYPE..DATATYPE + 2]),
                E::read_i16(&bytes[BITPIX..BITPIX + 2]),
            )?,
            pixdim,
            vox_offset: vox_offset as i64,
            scl_slope: f64::from(E::read_f32(&bytes[SCL_SLOPE..SCL_SLOPE + 4])),
            scl_inter: f64::from(E::read_f32(&bytes[SCL_INTER..SCL_INTER + 4])),
            little_endian,
        })
    }

    #[allow(clippy::wildcard_imports)]
    fn parse_v2<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v2::*;

        let magic = &bytes[MAGIC..MAGIC + 8];
        if magic != b"n+2\0\r\n\x1a\n" && magic != b"ni2\0\r\n\x1a\n" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let ndim = checked_ndim(E::read_i64(&bytes[DIM..DIM + 8]))?;
        let mut dim = [0i64; 7];
        for (i, d) in dim.iter_mut().enumerate() {
            let at = DIM + 8 + i * 8;
            *d = E::read_i64(&bytes[at..at + 8]);
        }

        let mut pixdim = [0.0f64; 8];
        for (i, p) in pixdim.iter_mut().enumerate() {
            let at = PIXDIM + i * 8;
            *p = E::read_f64(&bytes[at..at + 8]);
        }

        Ok(Self {
            version: NiftiVersion::Nifti2,
            ndim,
            dim,
            datatype: checked_datatype(
                E::read_i16(&bytes[DATATYPE..DATATYPE + 2]),
                E::read_i16(&bytes[BITPIX..BITPIX + 2]),
            )?,
            pixdim,
            vox_offset: E::read_i64(&bytes[VOX_OFFSET..VOX_OFFSET + 8]),
            scl_slope: E::read_f64(&bytes[SCL_SLOPE..SCL_SLOPE + 8]),
            scl_inter: E::read_f64(&bytes[SCL_INTER..SCL_INTER + 8]),
            little_endian,
        })
    }

    /// Serialize as a little-endian NIfTI-1 header (348 bytes).
    ///
    /// Dimensions beyond `i16::MAX` are clamped; callers producing such
    /// volumes need NIfTI-2, which this crate only reads.
    #[allow(clippy::wildcard_imports)]
    pub fn to_bytes(&self) -> Vec<u8> {
        use offsets_v1::*;

        let mut buf = vec![0u8; Self::SIZE];
        LittleEndian::write_i32(&mut buf[SIZEOF_HDR..SIZEOF_HDR + 4], Self::SIZE as i32);

        LittleEndian::write_i16(&mut buf[DIM..DIM + 2], i16::from(self.ndim));
        for (i, &d) in self.dim.iter().enumerate() {
            let at = DIM + 2 + i * 2;
            LittleEndian::write_i16(&mut buf[at..at + 2], d.min(i64::from(i16::MAX)) as i16);
        }

        LittleEndian::write_i16(&mut buf[DATATYPE..DATATYPE + 2], self.datatype as i16);
        LittleEndian::write_i16(
            &mut buf[BITPIX..BITPIX + 2],
            (self.datatype.byte_size() * 8) as i16,
        );
        for (i, &p) in self.pixdim.iter().enumerate() {
            let at = PIXDIM + i * 4;
            LittleEndian::write_f32(&mut buf[at..at + 4], p as f32);
        }

        LittleEndian::write_f32(&mut buf[VOX_OFFSET..VOX_OFFSET + 4], self.vox_offset as f32);
        LittleEndian::write_f32(&mut buf[SCL_SLOPE..SCL_SLOPE + 4], self.scl_slope as f32);
        LittleEndian::write_f32(&mut buf[SCL_INTER..SCL_INTER + 4], self.scl_inter as f32);

        // millimetres, identity sform scaled by pixdim
        buf[XYZT_UNITS] = 2;
        LittleEndian::write_i16(&mut buf[SFORM_CODE..SFORM_CODE + 2], 1);
        for row in 0..3 {
            let at = SROW_X + row * 16 + row * 4;
            LittleEndian::write_f32(&mut buf[at..at + 4], self.pixdim[row + 1] as f32);
        }

        buf[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");
        buf
    }

    /// Shape over the first `ndim` dimensions.
    pub fn shape(&self) -> Vec<usize> {
        self.dim[..usize::from(self.ndim)]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Size of the voxel payload in bytes.
    pub fn data_size(&self) -> usize {
        self.num_voxels() * self.datatype.byte_size()
    }

    /// Returns true if the payload is stored little endian.
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// True when `scl_slope`/`scl_inter` change stored values.
    pub fn has_scaling(&self) -> bool {
        self.scl_slope != 0.0
            && self.scl_slope.is_finite()
            && (self.scl_slope != 1.0 || self.scl_inter != 0.0)
    }

    /// Check the invariants the decoder relies on.
    pub fn validate(&self) -> Result<()> {
        if !(1..=7).contains(&self.ndim) {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                self.ndim
            )));
        }

        let mut voxels: usize = 1;
        for (axis, &d) in self.dim[..usize::from(self.ndim)].iter().enumerate() {
            if d <= 0 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {} must be positive, got {}",
                    axis, d
                )));
            }
            voxels = voxels
                .checked_mul(d as usize)
                .ok_or_else(|| Error::InvalidDimensions("dimension product overflow".into()))?;
        }
        voxels
            .checked_mul(self.datatype.byte_size())
            .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))?;

        if self.vox_offset < self.version.header_size() as i64 {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset {} lies inside the {}-byte header",
                self.vox_offset,
                self.version.header_size()
            )));
        }
        Ok(())
    }
}

fn checked_ndim(raw: i64) -> Result<u8> {
    if (1..=7).contains(&raw) {
        Ok(raw as u8)
    } else {
        Err(Error::InvalidDimensions(format!(
            "ndim must be 1..=7, got {}",
            raw
        )))
    }
}

fn checked_datatype(code: i16, bitpix: i16) -> Result<DataType> {
    let datatype = DataType::from_code(code)?;
    let expected = (datatype.byte_size() * 8) as i16;
    if bitpix != expected {
        return Err(Error::InvalidDimensions(format!(
            "bitpix {} does not match datatype {} (expected {})",
            bitpix, datatype, expected
        )));
    }
    Ok(datatype)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2_header_bytes<E: ByteOrder>(sizeof_hdr_le: bool) -> Vec<u8> {
        let mut b = vec![0u8; 540];
        if sizeof_hdr_le {
            LittleEndian::write_i32(&mut b[0..4], 540);
        } else {
            BigEndian::write_i32(&mut b[0..4], 540);
        }
        b[4..12].copy_from_slice(b"n+2\0\r\n\x1a\n");
        E::write_i16(&mut b[12..14], 4); // Int16
        E::write_i16(&mut b[14..16], 16);
        E::write_i64(&mut b[16..24], 3);
        E::write_i64(&mut b[24..32], 8);
        E::write_i64(&mut b[32..40], 6);
        E::write_i64(&mut b[40..48], 4);
        E::write_f64(&mut b[112..120], 1.0);
        E::write_i64(&mut b[168..176], 544);
        E::write_f64(&mut b[176..184], 2.0);
        E::write_f64(&mut b[184..192], -1.0);
        b
    }

    #[test]
    fn test_nifti1_roundtrip() {
        let mut header = NiftiHeader::default();
        header.dim = [64, 48, 32, 1, 1, 1, 1];
        header.datatype = DataType::Int16;
        header.scl_slope = 0.5;

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 348);

        let parsed = NiftiHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.version, NiftiVersion::Nifti1);
        assert_eq!(parsed.shape(), vec![64, 48, 32]);
        assert_eq!(parsed.datatype, DataType::Int16);
        assert_eq!(parsed.data_size(), 64 * 48 * 32 * 2);
        assert!(parsed.has_scaling());
        assert!(parsed.is_little_endian());
    }

    #[test]
    fn test_nifti2_both_byte_orders() {
        let le = NiftiHeader::from_bytes(&v2_header_bytes::<LittleEndian>(true)).unwrap();
        assert_eq!(le.version, NiftiVersion::Nifti2);
        assert_eq!(le.shape(), vec![8, 6, 4]);
        assert_eq!(le.scl_slope, 2.0);
        assert!(le.is_little_endian());

        let be = NiftiHeader::from_bytes(&v2_header_bytes::<BigEndian>(false)).unwrap();
        assert_eq!(be.version, NiftiVersion::Nifti2);
        assert_eq!(be.shape(), vec![8, 6, 4]);
        assert_eq!(be.scl_inter, -1.0);
        assert!(!be.is_little_endian());
    }

    #[test]
    fn test_invalid_magic_rejected() {
        let mut bytes = NiftiHeader::default().to_bytes();
        bytes[344..348].copy_from_slice(b"BAD!");
        let err = NiftiHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidMagic(m) if &m == b"BAD!"));
    }

    #[test]
    fn test_unknown_sizeof_hdr_rejected() {
        let bytes = vec![0u8; 400];
        assert!(matches!(
            NiftiHeader::from_bytes(&bytes),
            Err(Error::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_bitpix_mismatch_rejected() {
        let mut bytes = NiftiHeader::default().to_bytes();
        LittleEndian::write_i16(&mut bytes[72..74], 8);
        assert!(matches!(
            NiftiHeader::from_bytes(&bytes),
            Err(Error::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut header = NiftiHeader::default();
        header.dim = [4, 0, 4, 1, 1, 1, 1];
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_unsupported_datatype() {
        assert!(matches!(
            DataType::from_code(9999),
            Err(Error::UnsupportedDataType(9999))
        ));
        assert_eq!(DataType::from_code(16384).unwrap(), DataType::Float16);
    }

    #[test]
    fn test_identity_scaling_is_ignored() {
        let mut header = NiftiHeader::default();
        assert!(!header.has_scaling());
        header.scl_slope = 0.0;
        header.scl_inter = 5.0;
        assert!(!header.has_scaling());
    }
}
