//! Uploaded case archives.
//!
//! A case archive is a zip holding one directory named after the case,
//! with one NIfTI file per MRI modality:
//!
//! ```text
//! BraTS20_Training_001/BraTS20_Training_001_flair.nii
//! BraTS20_Training_001/BraTS20_Training_001_t1ce.nii
//! BraTS20_Training_001/BraTS20_Training_001_seg.nii   (optional)
//! ```
//!
//! Gzipped `.nii.gz` entries are accepted under the same stem.

use crate::error::{Error, Result};
use crate::nifti::{read_limited, NiftiVolume, MAX_VOLUME_BYTES};
use std::collections::HashSet;
use std::io::Cursor;
use zip::ZipArchive;

/// Volumes a case archive may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Fluid-attenuated inversion recovery.
    Flair,
    /// T1-weighted, contrast enhanced.
    T1ce,
    /// Ground-truth segmentation labels.
    Seg,
}

impl Modality {
    /// Modalities the model consumes, in channel order.
    pub const INPUTS: [Modality; 2] = [Modality::Flair, Modality::T1ce];

    /// File-name suffix for this modality.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Flair => "flair",
            Self::T1ce => "t1ce",
            Self::Seg => "seg",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Check a client-supplied case identifier.
///
/// Returns the trimmed identifier, or `None` when it is empty or could
/// step outside the case directory.
pub fn sanitize_case_id(raw: &str) -> Option<&str> {
    let case = raw.trim();
    let unsafe_id =
        case.is_empty() || case.contains('/') || case.contains('\\') || case.contains("..");
    (!unsafe_id).then_some(case)
}

/// An opened case archive borrowing the uploaded bytes.
pub struct CaseArchive<'a> {
    case: String,
    zip: ZipArchive<Cursor<&'a [u8]>>,
    names: HashSet<String>,
    entry_limit: u64,
}

impl<'a> CaseArchive<'a> {
    /// Open `bytes` as a zip for the given case identifier.
    pub fn open(bytes: &'a [u8], case: &str) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))?;
        let names: HashSet<String> = zip.file_names().map(str::to_owned).collect();
        tracing::debug!(case, entries = ?names, "opened case archive");
        Ok(Self {
            case: case.to_owned(),
            zip,
            names,
            entry_limit: MAX_VOLUME_BYTES,
        })
    }

    /// Cap on the inflated size of a single entry (default
    /// [`MAX_VOLUME_BYTES`]). The size an entry declares is not trusted.
    pub fn entry_limit(mut self, limit: u64) -> Self {
        self.entry_limit = limit;
        self
    }

    /// Case identifier the archive was opened with.
    pub fn case(&self) -> &str {
        &self.case
    }

    /// Canonical (uncompressed) entry name for a modality.
    pub fn entry_name(&self, modality: Modality) -> String {
        format!("{0}/{0}_{1}.nii", self.case, modality.suffix())
    }

    /// The entry present for `modality`, preferring `.nii` over `.nii.gz`.
    pub fn resolve(&self, modality: Modality) -> Option<String> {
        let plain = self.entry_name(modality);
        if self.names.contains(&plain) {
            return Some(plain);
        }
        let gz = format!("{plain}.gz");
        self.names.contains(&gz).then_some(gz)
    }

    /// Fail with [`Error::MissingEntry`] unless every modality is present.
    pub fn require(&self, modalities: &[Modality]) -> Result<()> {
        for &modality in modalities {
            if self.resolve(modality).is_none() {
                return Err(Error::MissingEntry {
                    entry: self.entry_name(modality),
                });
            }
        }
        Ok(())
    }

    /// Read and decode the volume for `modality`.
    pub fn read_volume(&mut self, modality: Modality) -> Result<NiftiVolume> {
        let name = self.resolve(modality).ok_or_else(|| Error::MissingEntry {
            entry: self.entry_name(modality),
        })?;
        let entry = self.zip.by_name(&name)?;
        let bytes = read_limited(entry, self.entry_limit)?.ok_or_else(|| {
            Error::Archive(format!(
                "entry {name} inflates past {} bytes",
                self.entry_limit
            ))
        })?;

        NiftiVolume::from_bytes(&bytes).map_err(|e| {
            tracing::warn!(entry = %name, error = %e, "volume decode failed");
            e
        })
    }

    /// Like [`read_volume`](Self::read_volume), but `None` when the entry is absent.
    pub fn read_optional(&mut self, modality: Modality) -> Result<Option<NiftiVolume>> {
        if self.resolve(modality).is_none() {
            return Ok(None);
        }
        self.read_volume(modality).map(Some)
    }
}
