use std::path::{Path, PathBuf};

use crate::error::{Result, TorcxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    TarGzip,
    Squashfs,
}

impl ArchiveFormat {
    pub const ALL: [Self; 2] = [Self::TarGzip, Self::Squashfs];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarGzip => "tgz",
            Self::Squashfs => "squashfs",
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::TarGzip => ".torcx.tgz",
            Self::Squashfs => ".torcx.squashfs",
        }
    }

    pub fn infer_from_file_name(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| file_name.ends_with(format.file_suffix()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub filepath: PathBuf,
    pub format: ArchiveFormat,
}

impl Archive {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let filepath = path.into();
        let format = filepath
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(ArchiveFormat::infer_from_file_name)
            .ok_or_else(|| TorcxError::UnrecognizedFormat(filepath.clone()))?;
        Ok(Self { filepath, format })
    }

    pub fn path(&self) -> &Path {
        &self.filepath
    }
}

pub fn archive_file_name(name: &str, reference: &str, format: ArchiveFormat) -> String {
    format!("{name}:{reference}{}", format.file_suffix())
}

pub fn parse_archive_file_name(file_name: &str) -> Option<(String, String, ArchiveFormat)> {
    let format = ArchiveFormat::infer_from_file_name(file_name)?;
    let stem = file_name.strip_suffix(format.file_suffix())?;
    let (name, reference) = stem.split_once(':')?;
    if name.is_empty() || reference.is_empty() || reference.contains(':') {
        return None;
    }
    Some((name.to_string(), reference.to_string(), format))
}
