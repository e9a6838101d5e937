use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::layout::{ApplyConfig, DEFAULT_UPPER_PROFILE};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/torcx/config.toml";
pub const DEFAULT_USR_MOUNTPOINT: &str = "/usr";
const DEFAULT_LOWER_PROFILE: &str = "vendor";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TorcxConfig {
    pub base_dir: Option<PathBuf>,
    pub run_dir: Option<PathBuf>,
    pub conf_dir: Option<PathBuf>,
    pub vendor_dir: Option<PathBuf>,
    pub oem_dir: Option<PathBuf>,
    pub usr_mountpoint: Option<PathBuf>,
    #[serde(default)]
    pub store_paths: Vec<PathBuf>,
    pub lower_profiles: Option<Vec<String>>,
    pub upper_profile: Option<String>,
    pub unpack_size: Option<String>,
}

impl TorcxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse torcx config")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .with_context(|| format!("invalid config {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn usr_mountpoint(&self) -> PathBuf {
        self.usr_mountpoint
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_USR_MOUNTPOINT))
    }
}

impl ApplyConfig {
    pub fn from_config(config: &TorcxConfig, os_version: Option<&str>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(dir) = &config.base_dir {
            cfg.base_dir = dir.clone();
        }
        if let Some(dir) = &config.run_dir {
            cfg.run_dir = dir.clone();
        }
        if let Some(dir) = &config.conf_dir {
            cfg.conf_dir = dir.clone();
        }
        if let Some(dir) = &config.vendor_dir {
            cfg.vendor_dir = dir.clone();
        }
        if let Some(dir) = &config.oem_dir {
            cfg.oem_dir = dir.clone();
        }
        if let Some(size) = &config.unpack_size {
            cfg.unpack_size = size.clone();
        }

        cfg.lower_profiles = config
            .lower_profiles
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_LOWER_PROFILE.to_string()]);
        cfg.upper_profile = match &config.upper_profile {
            Some(name) => name.clone(),
            None => read_next_profile(&cfg.next_profile_path())?
                .unwrap_or_else(|| DEFAULT_UPPER_PROFILE.to_string()),
        };

        let mut store_paths = cfg.default_store_paths(os_version);
        store_paths.extend(config.store_paths.iter().cloned());
        cfg.store_paths = store_paths;
        Ok(cfg)
    }
}

fn read_next_profile(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let name = content.trim();
            Ok((!name.is_empty()).then(|| name.to_string()))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
