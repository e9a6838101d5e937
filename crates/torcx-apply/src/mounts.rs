use std::io;
use std::path::Path;

use nix::mount::{mount, MsFlags};
use torcx_core::TorcxError;

use crate::loop_device::LoopDevice;

pub trait Mounter {
    fn mount_tmpfs(&self, target: &Path, size: &str) -> Result<(), TorcxError>;

    fn mount_squashfs(&self, archive: &Path, target: &Path) -> Result<(), TorcxError>;

    fn remount_read_only(&self, target: &Path) -> Result<(), TorcxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMounter;

impl Mounter for KernelMounter {
    fn mount_tmpfs(&self, target: &Path, size: &str) -> Result<(), TorcxError> {
        let data = format!("size={size}");
        mount(
            Some("none"),
            target,
            Some("tmpfs"),
            MsFlags::empty(),
            Some(data.as_str()),
        )
        .map_err(|errno| TorcxError::Mount {
            op: "mount tmpfs on",
            target: target.to_path_buf(),
            source: io::Error::from(errno),
        })
    }

    fn mount_squashfs(&self, archive: &Path, target: &Path) -> Result<(), TorcxError> {
        let device = LoopDevice::attach(archive).map_err(|source| TorcxError::Mount {
            op: "attach loop device for",
            target: archive.to_path_buf(),
            source,
        })?;

        mount(
            Some(device.path()),
            target,
            Some("squashfs"),
            MsFlags::MS_RDONLY,
            None::<&str>,
        )
        .map_err(|errno| TorcxError::Mount {
            op: "mount squashfs on",
            target: target.to_path_buf(),
            source: io::Error::from(errno),
        })
    }

    fn remount_read_only(&self, target: &Path) -> Result<(), TorcxError> {
        mount(
            Some(target),
            target,
            None::<&str>,
            MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
            None::<&str>,
        )
        .map_err(|errno| TorcxError::Remount {
            target: target.to_path_buf(),
            source: io::Error::from(errno),
        })
    }
}
