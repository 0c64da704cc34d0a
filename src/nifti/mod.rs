//! `NIfTI` file format support.
//!
//! Volumes arrive inside an uploaded archive, so everything here decodes
//! from byte slices. Both `.nii` and gzipped `.nii.gz` payloads are handled.

pub(crate) mod header;
pub(crate) mod volume;

pub use header::{DataType, NiftiHeader, NiftiVersion};
pub(crate) use volume::read_limited;
pub use volume::{NiftiVolume, MAX_VOLUME_BYTES};
