//! Minimal loop device attachment through `/dev/loop-control`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

const LOOP_CONTROL_PATH: &str = "/dev/loop-control";

const LOOP_SET_FD: libc::c_ulong = 0x4C00;
const LOOP_CLR_FD: libc::c_ulong = 0x4C01;
const LOOP_SET_STATUS64: libc::c_ulong = 0x4C04;
const LOOP_CTL_GET_FREE: libc::c_ulong = 0x4C82;

const LO_FLAGS_READ_ONLY: u32 = 1;
const LO_FLAGS_AUTOCLEAR: u32 = 4;
const LO_NAME_SIZE: usize = 64;
const LO_KEY_SIZE: usize = 32;

#[repr(C)]
struct LoopInfo64 {
    lo_device: u64,
    lo_inode: u64,
    lo_rdevice: u64,
    lo_offset: u64,
    lo_sizelimit: u64,
    lo_number: u32,
    lo_encrypt_type: u32,
    lo_encrypt_key_size: u32,
    lo_flags: u32,
    lo_file_name: [u8; LO_NAME_SIZE],
    lo_crypt_name: [u8; LO_NAME_SIZE],
    lo_encrypt_key: [u8; LO_KEY_SIZE],
    lo_init: [u64; 2],
}

impl LoopInfo64 {
    fn read_only_autoclear(backing: &Path) -> Self {
        let mut info = Self {
            lo_device: 0,
            lo_inode: 0,
            lo_rdevice: 0,
            lo_offset: 0,
            lo_sizelimit: 0,
            lo_number: 0,
            lo_encrypt_type: 0,
            lo_encrypt_key_size: 0,
            lo_flags: LO_FLAGS_READ_ONLY | LO_FLAGS_AUTOCLEAR,
            lo_file_name: [0; LO_NAME_SIZE],
            lo_crypt_name: [0; LO_NAME_SIZE],
            lo_encrypt_key: [0; LO_KEY_SIZE],
            lo_init: [0; 2],
        };
        let name = backing.as_os_str().as_bytes();
        let len = name.len().min(LO_NAME_SIZE - 1);
        info.lo_file_name[..len].copy_from_slice(&name[..len]);
        info
    }
}

/// A loop device bound read-only to a backing file.
///
/// The binding is created with autoclear: once the device is mounted,
/// dropping this handle leaves the mount in place and the kernel releases
/// the device on unmount.
#[derive(Debug)]
pub struct LoopDevice {
    _device: File,
    path: PathBuf,
}

impl LoopDevice {
    pub fn attach(backing: &Path) -> io::Result<Self> {
        let backing_file = File::open(backing)?;

        let control = OpenOptions::new()
            .read(true)
            .write(true)
            .open(LOOP_CONTROL_PATH)?;
        // SAFETY: LOOP_CTL_GET_FREE takes no argument and returns an index.
        let index = unsafe { libc::ioctl(control.as_raw_fd(), LOOP_CTL_GET_FREE as _) };
        if index < 0 {
            return Err(io::Error::last_os_error());
        }

        let path = PathBuf::from(format!("/dev/loop{index}"));
        let device = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: both descriptors are owned and open for the whole call.
        let rc = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                LOOP_SET_FD as _,
                backing_file.as_raw_fd() as libc::c_ulong,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let info = LoopInfo64::read_only_autoclear(backing);
        // SAFETY: `info` matches the kernel layout and outlives the call.
        let rc = unsafe {
            libc::ioctl(
                device.as_raw_fd(),
                LOOP_SET_STATUS64 as _,
                &info as *const LoopInfo64,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // SAFETY: detaches the binding made above on the same descriptor.
            unsafe { libc::ioctl(device.as_raw_fd(), LOOP_CLR_FD as _, 0) };
            return Err(err);
        }

        tracing::debug!(
            device = %path.display(),
            backing = %backing.display(),
            "loop device attached"
        );
        Ok(Self {
            _device: device,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
