use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use torcx_core::TorcxError;

use crate::fs_utils::replace_symlink;
use crate::ApplyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Binaries,
    Network,
    Units,
    Sysusers,
    Tmpfiles,
    UdevRules,
}

impl AssetCategory {
    pub const ALL: [Self; 6] = [
        Self::Binaries,
        Self::Network,
        Self::Units,
        Self::Sysusers,
        Self::Tmpfiles,
        Self::UdevRules,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binaries => "binaries",
            Self::Network => "networkd units",
            Self::Units => "systemd units",
            Self::Sysusers => "sysusers",
            Self::Tmpfiles => "tmpfiles",
            Self::UdevRules => "udev rules",
        }
    }

    pub fn image_subdir(self) -> &'static str {
        match self {
            Self::Binaries => "bin",
            Self::Network => "network",
            Self::Units => "systemd",
            Self::Sysusers => "sysusers",
            Self::Tmpfiles => "tmpfiles",
            Self::UdevRules => "udev/rules.d",
        }
    }

    pub fn destination_dir(self, cfg: &ApplyConfig) -> PathBuf {
        let dirs = &cfg.system_dirs;
        match self {
            Self::Binaries => cfg.run_bin_dir(),
            Self::Network => dirs.networkd_dir.clone(),
            Self::Units => dirs.units_dir.clone(),
            Self::Sysusers => dirs.sysusers_dir.clone(),
            Self::Tmpfiles => dirs.tmpfiles_dir.clone(),
            Self::UdevRules => dirs.udev_rules_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    pub binaries: Vec<PathBuf>,
    pub network: Vec<PathBuf>,
    pub units: Vec<PathBuf>,
    pub sysusers: Vec<PathBuf>,
    pub tmpfiles: Vec<PathBuf>,
    pub udev_rules: Vec<PathBuf>,
}

impl AssetManifest {
    pub fn get(&self, category: AssetCategory) -> &[PathBuf] {
        match category {
            AssetCategory::Binaries => &self.binaries,
            AssetCategory::Network => &self.network,
            AssetCategory::Units => &self.units,
            AssetCategory::Sysusers => &self.sysusers,
            AssetCategory::Tmpfiles => &self.tmpfiles,
            AssetCategory::UdevRules => &self.udev_rules,
        }
    }

    fn get_mut(&mut self, category: AssetCategory) -> &mut Vec<PathBuf> {
        match category {
            AssetCategory::Binaries => &mut self.binaries,
            AssetCategory::Network => &mut self.network,
            AssetCategory::Units => &mut self.units,
            AssetCategory::Sysusers => &mut self.sysusers,
            AssetCategory::Tmpfiles => &mut self.tmpfiles,
            AssetCategory::UdevRules => &mut self.udev_rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        AssetCategory::ALL
            .into_iter()
            .all(|category| self.get(category).is_empty())
    }
}

pub fn retrieve_assets(image_root: &Path) -> Result<AssetManifest> {
    let mut assets = AssetManifest::default();
    for category in AssetCategory::ALL {
        let base = image_root.join(category.image_subdir());
        let found = assets.get_mut(category);
        collect_entries(&base, &base, found)
            .with_context(|| format!("failed to list {}", base.display()))?;
        found.sort();
    }
    Ok(assets)
}

fn collect_entries(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound && dir == base => return Ok(()),
        Err(err) => return Err(err),
    };
    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_entries(base, &path, out)?;
            continue;
        }
        if let Ok(relative) = path.strip_prefix(base) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

pub fn propagate_category(
    cfg: &ApplyConfig,
    image_root: &Path,
    category: AssetCategory,
    assets: &[PathBuf],
) -> Result<(), TorcxError> {
    let source_dir = image_root.join(category.image_subdir());
    let destination_dir = category.destination_dir(cfg);
    for asset in assets {
        let source_path = source_dir.join(asset);
        let destination = destination_dir.join(asset);
        replace_symlink(&source_path, &destination).map_err(|source| {
            TorcxError::Propagate {
                source_path: source_path.clone(),
                destination: destination.clone(),
                source,
            }
        })?;
    }
    Ok(())
}
