use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use torcx_core::TorcxError;

use crate::fs_utils::ensure_dir;

pub const DEFAULT_BASE_DIR: &str = "/var/lib/torcx";
pub const DEFAULT_RUN_DIR: &str = "/run/torcx";
pub const DEFAULT_CONF_DIR: &str = "/etc/torcx";
pub const VENDOR_DIR: &str = "/usr/share/torcx";
pub const OEM_DIR: &str = "/usr/share/oem/torcx";
pub const SEAL_PATH: &str = "/run/metadata/torcx";
pub const DEFAULT_UNPACK_SIZE: &str = "450M";
pub const DEFAULT_UPPER_PROFILE: &str = "vendor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDirs {
    pub networkd_dir: PathBuf,
    pub units_dir: PathBuf,
    pub sysusers_dir: PathBuf,
    pub tmpfiles_dir: PathBuf,
    pub udev_rules_dir: PathBuf,
}

impl Default for SystemDirs {
    fn default() -> Self {
        Self {
            networkd_dir: PathBuf::from("/run/systemd/network"),
            units_dir: PathBuf::from("/run/systemd/system"),
            sysusers_dir: PathBuf::from("/run/sysusers.d"),
            tmpfiles_dir: PathBuf::from("/run/tmpfiles.d"),
            udev_rules_dir: PathBuf::from("/run/udev/rules.d"),
        }
    }
}

impl SystemDirs {
    pub fn under(root: &Path) -> Self {
        let defaults = Self::default();
        let rebase = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        Self {
            networkd_dir: rebase(&defaults.networkd_dir),
            units_dir: rebase(&defaults.units_dir),
            sysusers_dir: rebase(&defaults.sysusers_dir),
            tmpfiles_dir: rebase(&defaults.tmpfiles_dir),
            udev_rules_dir: rebase(&defaults.udev_rules_dir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyConfig {
    pub base_dir: PathBuf,
    pub run_dir: PathBuf,
    pub conf_dir: PathBuf,
    pub vendor_dir: PathBuf,
    pub oem_dir: PathBuf,
    pub store_paths: Vec<PathBuf>,
    pub lower_profiles: Vec<String>,
    pub upper_profile: String,
    pub seal_path: PathBuf,
    pub unpack_size: String,
    pub system_dirs: SystemDirs,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            run_dir: PathBuf::from(DEFAULT_RUN_DIR),
            conf_dir: PathBuf::from(DEFAULT_CONF_DIR),
            vendor_dir: PathBuf::from(VENDOR_DIR),
            oem_dir: PathBuf::from(OEM_DIR),
            store_paths: Vec::new(),
            lower_profiles: Vec::new(),
            upper_profile: DEFAULT_UPPER_PROFILE.to_string(),
            seal_path: PathBuf::from(SEAL_PATH),
            unpack_size: DEFAULT_UNPACK_SIZE.to_string(),
            system_dirs: SystemDirs::default(),
        }
    }
}

impl ApplyConfig {
    pub fn run_bin_dir(&self) -> PathBuf {
        self.run_dir.join("bin")
    }

    pub fn run_unpack_dir(&self) -> PathBuf {
        self.run_dir.join("unpack")
    }

    pub fn run_profile(&self) -> PathBuf {
        self.run_dir.join("profile.json")
    }

    pub fn user_profile_dir(&self) -> PathBuf {
        self.conf_dir.join("profiles")
    }

    pub fn vendor_profile_dir(&self) -> PathBuf {
        self.vendor_dir.join("profiles")
    }

    pub fn oem_profile_dir(&self) -> PathBuf {
        self.oem_dir.join("profiles")
    }

    pub fn profile_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.vendor_profile_dir(),
            self.oem_profile_dir(),
            self.user_profile_dir(),
        ]
    }

    pub fn next_profile_path(&self) -> PathBuf {
        self.conf_dir.join("next-profile")
    }

    pub fn vendor_store_dir(&self) -> PathBuf {
        self.vendor_dir.join("store")
    }

    pub fn oem_store_dir(&self) -> PathBuf {
        self.oem_dir.join("store")
    }

    pub fn user_store_dir(&self) -> PathBuf {
        self.base_dir.join("store")
    }

    pub fn versioned_user_store_dir(&self, os_version: &str) -> PathBuf {
        self.user_store_dir().join(os_version)
    }

    pub fn remote_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.vendor_dir.join("remotes"),
            self.oem_dir.join("remotes"),
            self.conf_dir.join("remotes"),
        ]
    }

    pub fn default_store_paths(&self, os_version: Option<&str>) -> Vec<PathBuf> {
        let mut paths = vec![self.vendor_store_dir(), self.oem_store_dir()];
        if let Some(version) = os_version {
            paths.push(self.versioned_user_store_dir(version));
        }
        paths.push(self.user_store_dir());
        paths
    }

    pub fn validate(&self) -> Result<(), TorcxError> {
        for (label, dir) in [
            ("base_dir", &self.base_dir),
            ("run_dir", &self.run_dir),
            ("conf_dir", &self.conf_dir),
            ("seal_path", &self.seal_path),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(TorcxError::InvalidConfig(format!("{label} must not be empty")));
            }
            if !dir.is_absolute() {
                return Err(TorcxError::InvalidConfig(format!(
                    "{label} must be absolute: {}",
                    dir.display()
                )));
            }
        }
        if self.upper_profile.trim().is_empty() {
            return Err(TorcxError::InvalidConfig(
                "upper profile must not be empty".to_string(),
            ));
        }
        if self
            .lower_profiles
            .iter()
            .any(|name| name.trim().is_empty() || name.contains(':'))
        {
            return Err(TorcxError::InvalidConfig(
                "lower profile names must be non-empty and must not contain ':'".to_string(),
            ));
        }
        if self.unpack_size.trim().is_empty() {
            return Err(TorcxError::InvalidConfig(
                "unpack size must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_paths(&self) -> Result<()> {
        for dir in [
            self.run_dir.clone(),
            self.base_dir.clone(),
            self.conf_dir.clone(),
            self.run_bin_dir(),
            self.run_unpack_dir(),
            self.user_profile_dir(),
            self.user_store_dir(),
        ] {
            ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
