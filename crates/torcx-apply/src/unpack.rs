use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use torcx_core::{is_path_component, Archive, ArchiveFormat, TorcxError};

use crate::fs_utils::ensure_dir;
use crate::mounts::Mounter;

/// Restoring xattrs (file capabilities among them) and ownership needs
/// privilege, so both are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub preserve_xattrs: bool,
    pub preserve_ownership: bool,
}

impl ExtractOptions {
    pub fn privileged() -> Self {
        Self {
            preserve_xattrs: true,
            preserve_ownership: true,
        }
    }
}

pub struct ImageUnpacker<'a> {
    unpack_dir: &'a Path,
    options: ExtractOptions,
    mounter: &'a dyn Mounter,
}

impl<'a> ImageUnpacker<'a> {
    pub fn new(unpack_dir: &'a Path, options: ExtractOptions, mounter: &'a dyn Mounter) -> Self {
        Self {
            unpack_dir,
            options,
            mounter,
        }
    }

    pub fn unpack(&self, archive: &Archive, image_name: &str) -> Result<PathBuf> {
        if image_name.is_empty() || archive.filepath.as_os_str().is_empty() {
            return Err(TorcxError::MissingUnpackSource.into());
        }
        if !is_path_component(image_name) {
            return Err(TorcxError::InvalidImageName(image_name.to_string()).into());
        }

        let top_dir = self.unpack_dir.join(image_name);
        ensure_dir(&top_dir)
            .with_context(|| format!("failed to create {}", top_dir.display()))?;

        match archive.format {
            ArchiveFormat::TarGzip => unpack_tgz(&archive.filepath, &top_dir, self.options)?,
            ArchiveFormat::Squashfs => self
                .mounter
                .mount_squashfs(&archive.filepath, &top_dir)?,
        }
        Ok(top_dir)
    }
}

pub fn unpack_tgz(tgz_path: &Path, top_dir: &Path, options: ExtractOptions) -> Result<()> {
    let file =
        File::open(tgz_path).with_context(|| format!("opening {}", tgz_path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_overwrite(true);
    archive.set_unpack_xattrs(options.preserve_xattrs);
    archive.set_preserve_ownerships(options.preserve_ownership);

    chroot_untar(&mut archive, top_dir)
        .with_context(|| format!("unpacking {}", tgz_path.display()))
}

fn chroot_untar<R: Read>(archive: &mut tar::Archive<R>, root: &Path) -> Result<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if !is_contained(&path) {
            return Err(escape(path, root));
        }
        if entry.header().entry_type().is_hard_link() {
            if let Some(link) = entry.link_name()? {
                if !is_contained(&link) {
                    return Err(escape(link.into_owned(), root));
                }
            }
        }
        if !entry.unpack_in(root)? {
            return Err(escape(path, root));
        }
    }
    Ok(())
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn escape(entry: PathBuf, root: &Path) -> anyhow::Error {
    TorcxError::PathEscape {
        entry,
        root: root.to_path_buf(),
    }
    .into()
}
