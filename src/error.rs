//! Error types for tumorseg operations.

use thiserror::Error;

/// Errors produced while decoding, analysing or rendering a case.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header does not carry a recognised NIfTI magic.
    #[error("invalid NIfTI magic bytes: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Datatype code not handled by the decoder.
    #[error("unsupported data type code: {0}")]
    UnsupportedDataType(i16),

    /// Header dimensions are inconsistent or out of range.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// File layout is not a NIfTI we can read.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// Gzip payload could not be inflated.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Uploaded zip could not be opened or read.
    #[error("archive error: {0}")]
    Archive(String),

    /// A required archive entry is absent.
    #[error("missing archive entry: {entry}")]
    MissingEntry {
        /// Entry name that was looked up.
        entry: String,
    },

    /// Array shapes do not line up between stages.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Volume stack cannot be normalized by its maximum.
    #[error("cannot normalize input: maximum intensity is {max}")]
    DegenerateIntensity {
        /// Observed global maximum.
        max: f32,
    },

    /// Ground-truth segmentation holds an unexpected label.
    #[error("invalid segmentation label {label} (expected 0, 1, 2 or 4)")]
    InvalidLabel {
        /// Offending voxel value.
        label: f32,
    },

    /// Model loading or execution failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Overlay rendering or PNG encoding failed.
    #[error("render failed: {0}")]
    Render(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// True when the failure stems from the uploaded request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingEntry { .. })
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Archive(other.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Render(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
