use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use torcx_core::{Remote, RemoteManifest, TorcxError};

pub const REMOTE_MANIFEST_FILE: &str = "remote.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub manifest_path: PathBuf,
    pub remote: Remote,
}

#[derive(Debug, Clone)]
pub struct RemoteStore {
    dirs: Vec<PathBuf>,
}

impl RemoteStore {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn list(&self) -> Result<Vec<RemoteEntry>> {
        let mut found = BTreeMap::new();
        for dir in &self.dirs {
            for (name, manifest_path) in list_remote_dirs(dir)? {
                found.insert(name, manifest_path);
            }
        }

        let mut entries = Vec::with_capacity(found.len());
        for (name, manifest_path) in found {
            let remote = load_remote(&manifest_path)?;
            entries.push(RemoteEntry {
                name,
                manifest_path,
                remote,
            });
        }
        Ok(entries)
    }

    pub fn get(&self, name: &str) -> Result<RemoteEntry> {
        if name.is_empty() || name.contains('/') {
            return Err(TorcxError::RemoteNotFound(name.to_string()).into());
        }
        for dir in self.dirs.iter().rev() {
            let manifest_path = dir.join(name).join(REMOTE_MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            let remote = load_remote(&manifest_path)?;
            return Ok(RemoteEntry {
                name: name.to_string(),
                manifest_path,
                remote,
            });
        }
        Err(TorcxError::RemoteNotFound(name.to_string()).into())
    }
}

fn list_remote_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read remotes dir: {}", dir.display()))
        }
    };

    let mut found = Vec::new();
    for entry in read_dir {
        let entry =
            entry.with_context(|| format!("failed to read remotes dir: {}", dir.display()))?;
        let manifest_path = entry.path().join(REMOTE_MANIFEST_FILE);
        if !manifest_path.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            found.push((name.to_string(), manifest_path));
        }
    }
    Ok(found)
}

fn load_remote(path: &Path) -> Result<Remote> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read remote manifest: {}", path.display()))?;
    let manifest = RemoteManifest::from_json_str(&content)
        .with_context(|| format!("invalid remote manifest: {}", path.display()))?;
    Ok(manifest.remote)
}
