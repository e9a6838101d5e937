mod archive;
mod error;
mod image;
mod manifest;
pub mod os_release;
mod remote;

pub use archive::{archive_file_name, parse_archive_file_name, Archive, ArchiveFormat};
pub use error::{find_torcx_error, ErrorKind, Result, TorcxError};
pub use image::{is_path_component, Image};
pub use manifest::{
    ProfileManifest, RemoteManifest, PROFILE_MANIFEST_V0_KIND, PROFILE_MANIFEST_V1_KIND,
    REMOTE_MANIFEST_V0_KIND,
};
pub use os_release::OsRelease;
pub use remote::{evaluate_url, expand_placeholders, Remote, OS_RELEASE_REL_PATH};
