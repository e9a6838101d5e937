use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use torcx_core::{Image, ProfileManifest, TorcxError};

use crate::fs_utils::{ensure_dir, set_mode};
use crate::mounts::Mounter;
use crate::ApplyConfig;

pub const SEAL_LOWER_PROFILES: &str = "TORCX_LOWER_PROFILES";
pub const SEAL_UPPER_PROFILE: &str = "TORCX_UPPER_PROFILE";
pub const SEAL_RUN_PROFILE_PATH: &str = "TORCX_PROFILE_PATH";
pub const SEAL_BINDIR: &str = "TORCX_BINDIR";
pub const SEAL_UNPACKDIR: &str = "TORCX_UNPACKDIR";

const RUN_PROFILE_MODE: u32 = 0o444;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SealRecord {
    pub lower_profiles: Vec<String>,
    pub upper_profile: String,
    pub run_profile: PathBuf,
    pub bin_dir: PathBuf,
    pub unpack_dir: PathBuf,
}

impl SealRecord {
    pub fn from_config(cfg: &ApplyConfig) -> Self {
        Self {
            lower_profiles: cfg.lower_profiles.clone(),
            upper_profile: cfg.upper_profile.clone(),
            run_profile: cfg.run_profile(),
            bin_dir: cfg.run_bin_dir(),
            unpack_dir: cfg.run_unpack_dir(),
        }
    }

    pub fn render(&self) -> String {
        let lines = [
            (SEAL_LOWER_PROFILES, self.lower_profiles.join(":")),
            (SEAL_UPPER_PROFILE, self.upper_profile.clone()),
            (
                SEAL_RUN_PROFILE_PATH,
                self.run_profile.display().to_string(),
            ),
            (SEAL_BINDIR, self.bin_dir.display().to_string()),
            (SEAL_UNPACKDIR, self.unpack_dir.display().to_string()),
        ];

        let mut out = String::new();
        for (key, value) in lines {
            out.push_str(key);
            out.push('=');
            out.push_str(&quote(&value));
            out.push('\n');
        }
        out
    }

    // unknown keys are skipped
    pub fn parse(input: &str) -> Result<Self> {
        let mut record = Self::default();
        for (index, raw) in input.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .with_context(|| format!("seal record line {} has no '='", index + 1))?;
            let value = unquote(value)
                .with_context(|| format!("seal record line {} is not quoted", index + 1))?;
            match key {
                SEAL_LOWER_PROFILES => {
                    record.lower_profiles = value
                        .split(':')
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                SEAL_UPPER_PROFILE => record.upper_profile = value,
                SEAL_RUN_PROFILE_PATH => record.run_profile = PathBuf::from(value),
                SEAL_BINDIR => record.bin_dir = PathBuf::from(value),
                SEAL_UNPACKDIR => record.unpack_dir = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(record)
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn unquote(value: &str) -> Option<String> {
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            other => out.push(other),
        }
    }
    Some(out)
}

pub fn read_seal_record(path: &Path) -> Result<Option<SealRecord>> {
    match fs::read_to_string(path) {
        Ok(content) => SealRecord::parse(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
            .map(Some),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn write_run_profile(cfg: &ApplyConfig, images: &[Image]) -> Result<PathBuf> {
    let path = cfg.run_profile();
    let content = ProfileManifest::new(images.to_vec()).to_v0_json_pretty()?;

    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
    set_mode(&path, RUN_PROFILE_MODE)
        .with_context(|| format!("failed to chmod {}", path.display()))?;

    tracing::debug!(
        upper_profile = %cfg.upper_profile,
        sealed_profile = %path.display(),
        "profile applied"
    );
    Ok(path)
}

/// Publishes the seal record and freezes the unpack area. Runs at most
/// once per boot.
pub fn seal_system_state(cfg: &ApplyConfig, mounter: &dyn Mounter) -> Result<SealRecord> {
    let seal_path = &cfg.seal_path;
    if seal_path.exists() {
        return Err(TorcxError::AlreadySealed(seal_path.clone()).into());
    }
    if let Some(parent) = seal_path.parent() {
        ensure_dir(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let record = SealRecord::from_config(cfg);
    let content = record.render();
    fs::write(seal_path, &content)
        .with_context(|| format!("writing seal content to {}", seal_path.display()))?;

    mounter.remount_read_only(&record.unpack_dir)?;

    tracing::debug!(
        path = %seal_path.display(),
        content = %content.trim_end(),
        "system state sealed"
    );
    Ok(record)
}
