use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = TorcxError> = std::result::Result<T, E>;

/// Failure classes of an apply run.
///
/// Resolution, extraction and propagation failures are recoverable at image
/// granularity; `ImageFailures` is the summary the per-image loop returns
/// once it has run every image, whatever class each failure had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Resolution,
    Extraction,
    Propagation,
    ImageFailures,
    Sealing,
    Templating,
}

#[derive(Debug, Error)]
pub enum TorcxError {
    #[error("missing apply configuration")]
    MissingConfig,

    #[error("invalid apply configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to parse \"{0}\" from os-release")]
    UnknownKey(String),

    #[error("failed to parse os-release file")]
    OsReleaseScan(#[source] io::Error),

    #[error("failed to open {path}")]
    OsReleaseOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("nil remote")]
    NilRemote,

    #[error("empty usr mountpoint")]
    EmptyMountpoint,

    #[error("empty template URL")]
    EmptyTemplate,

    #[error("invalid URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("remote {0:?} not found")]
    RemoteNotFound(String),

    #[error("no archive found for image {name}:{reference}")]
    ArchiveNotFound { name: String, reference: String },

    #[error("profile {0:?} not found")]
    ProfileNotFound(String),

    #[error("failed to parse profile {path}: {reason}")]
    ProfileParse { path: PathBuf, reason: String },

    #[error("unrecognized format for archive {0}")]
    UnrecognizedFormat(PathBuf),

    #[error("missing unpack source")]
    MissingUnpackSource,

    #[error("invalid image name {0:?}")]
    InvalidImageName(String),

    #[error("archive entry {entry} escapes target directory {root}")]
    PathEscape { entry: PathBuf, root: PathBuf },

    #[error("failed to {op} {target}")]
    Mount {
        op: &'static str,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remount read-only {target}")]
    Remount {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to link {source_path} into {destination}")]
    Propagate {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("system state already sealed: {0}")]
    AlreadySealed(PathBuf),

    #[error("failed to install {count} images")]
    FailedImages { count: usize },
}

impl TorcxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfig | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::UnknownKey(_)
            | Self::OsReleaseScan(_)
            | Self::OsReleaseOpen { .. }
            | Self::ArchiveNotFound { .. }
            | Self::ProfileNotFound(_)
            | Self::ProfileParse { .. }
            | Self::RemoteNotFound(_) => ErrorKind::Resolution,
            Self::UnrecognizedFormat(_)
            | Self::MissingUnpackSource
            | Self::InvalidImageName(_)
            | Self::PathEscape { .. }
            | Self::Mount { .. } => ErrorKind::Extraction,
            Self::FailedImages { .. } => ErrorKind::ImageFailures,
            Self::Propagate { .. } => ErrorKind::Propagation,
            Self::Remount { .. } | Self::AlreadySealed(_) => ErrorKind::Sealing,
            Self::NilRemote
            | Self::EmptyMountpoint
            | Self::EmptyTemplate
            | Self::InvalidUrl { .. } => ErrorKind::Templating,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Mount { source, .. }
            | Self::Remount { source, .. }
            | Self::Propagate { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

pub fn find_torcx_error(err: &anyhow::Error) -> Option<&TorcxError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<TorcxError>())
}
