use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use torcx_core::{Image, ProfileManifest, TorcxError};

pub const PROFILE_FILE_EXTENSION: &str = "json";

pub fn list_profiles(profile_dirs: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>> {
    let mut profiles = BTreeMap::new();
    for dir in profile_dirs {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read profile directory: {}", dir.display())
                })
            }
        };

        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|v| v.to_str()) != Some(PROFILE_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|v| v.to_str()) else {
                continue;
            };
            profiles.insert(stem.to_string(), path);
        }
    }
    Ok(profiles)
}

pub fn read_profile(path: &Path) -> Result<Vec<Image>, TorcxError> {
    let raw = fs::read_to_string(path).map_err(|err| TorcxError::ProfileParse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    ProfileManifest::from_json_str(&raw)
        .map(|manifest| manifest.images)
        .map_err(|err| TorcxError::ProfileParse {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })
}

/// Merges image layers, lowest priority first.
///
/// An image whose name was already seen replaces the earlier entry in
/// place; new names are appended in the order they are met.
pub fn merge_image_layers(layers: &[Vec<Image>]) -> Vec<Image> {
    let mut merged: Vec<Image> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for image in layers.iter().flatten() {
        match positions.get(&image.name) {
            Some(position) => merged[*position] = image.clone(),
            None => {
                positions.insert(image.name.clone(), merged.len());
                merged.push(image.clone());
            }
        }
    }
    merged
}

pub fn merge_profiles(
    profile_dirs: &[PathBuf],
    lower_profiles: &[String],
    upper_profile: &str,
) -> Result<Vec<Image>> {
    let available = list_profiles(profile_dirs)?;

    let mut names = lower_profiles
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    if !upper_profile.is_empty() {
        names.push(upper_profile);
    }

    let mut layers = Vec::with_capacity(names.len());
    for name in names {
        let path = available
            .get(name)
            .ok_or_else(|| TorcxError::ProfileNotFound(name.to_string()))?;
        let images = read_profile(path)?;
        tracing::debug!(
            profile = name,
            path = %path.display(),
            images = images.len(),
            "profile layer loaded"
        );
        layers.push(images);
    }

    Ok(merge_image_layers(&layers))
}
