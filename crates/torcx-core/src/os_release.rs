use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, TorcxError};

pub const VERSION_ID_KEY: &str = "VERSION_ID";
pub const DEFAULT_OS_RELEASE_PATH: &str = "/usr/lib/os-release";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    entries: Vec<(String, String)>,
}

impl OsRelease {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(TorcxError::OsReleaseScan)?;
            if let Some((key, value)) = split_line(&line) {
                entries.push((key.to_string(), value.to_string()));
            }
        }
        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::parse(open(path)?)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn version_id(&self) -> Result<&str> {
        self.get(VERSION_ID_KEY)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TorcxError::UnknownKey(VERSION_ID_KEY.to_string()))
    }
}

pub fn lookup<R: BufRead>(reader: R, key: &str) -> Result<String> {
    for line in reader.lines() {
        let line = line.map_err(TorcxError::OsReleaseScan)?;
        let Some((k, v)) = split_line(&line) else {
            continue;
        };
        if k == key {
            if v.is_empty() {
                break;
            }
            return Ok(v.to_string());
        }
    }
    Err(TorcxError::UnknownKey(key.to_string()))
}

pub fn parse_os_version_id<R: BufRead>(reader: R) -> Result<String> {
    lookup(reader, VERSION_ID_KEY)
}

pub fn current_os_version_id(path: Option<&Path>) -> Result<String> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OS_RELEASE_PATH));
    parse_os_version_id(open(&path)?)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|source| TorcxError::OsReleaseOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), unquote(value.trim())))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
