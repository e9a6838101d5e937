use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use torcx_core::{parse_archive_file_name, Archive, Image, TorcxError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub name: String,
    pub reference: String,
    pub archive: Archive,
}

/// Index of every archive in an ordered list of store paths.
///
/// Built once per apply run. When two stores hold the same
/// `name:reference`, the store listed first wins.
#[derive(Debug, Clone, Default)]
pub struct StoreCache {
    paths: Vec<PathBuf>,
    entries: Vec<StoreEntry>,
    index: HashMap<(String, String), usize>,
}

impl StoreCache {
    pub fn new<P: AsRef<Path>>(store_paths: &[P]) -> Result<Self> {
        let mut cache = Self::default();
        for store in store_paths {
            let store = store.as_ref();
            cache.paths.push(store.to_path_buf());
            cache.index_store(store)?;
        }
        Ok(cache)
    }

    fn index_store(&mut self, store: &Path) -> Result<()> {
        let read_dir = match fs::read_dir(store) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %store.display(), "store path missing, skipped");
                return Ok(());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read store: {}", store.display()))
            }
        };

        let mut found = Vec::new();
        for entry in read_dir {
            let entry =
                entry.with_context(|| format!("failed to read store: {}", store.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some((name, reference, format)) = parse_archive_file_name(file_name) else {
                continue;
            };
            found.push(StoreEntry {
                name,
                reference,
                archive: Archive {
                    filepath: path,
                    format,
                },
            });
        }

        // read_dir order is unspecified; keep indexing deterministic.
        found.sort_by(|a, b| a.archive.filepath.cmp(&b.archive.filepath));
        for entry in found {
            let key = (entry.name.clone(), entry.reference.clone());
            if self.index.contains_key(&key) {
                tracing::debug!(
                    image = %entry.name,
                    reference = %entry.reference,
                    path = %entry.archive.filepath.display(),
                    "archive shadowed by higher priority store"
                );
                continue;
            }
            self.index.insert(key, self.entries.len());
            self.entries.push(entry);
        }
        Ok(())
    }

    pub fn archive_for(&self, image: &Image) -> Result<Archive, TorcxError> {
        self.index
            .get(&(image.name.clone(), image.reference.clone()))
            .map(|position| self.entries[*position].archive.clone())
            .ok_or_else(|| TorcxError::ArchiveNotFound {
                name: image.name.clone(),
                reference: image.reference.clone(),
            })
    }

    pub fn contains(&self, image: &Image) -> bool {
        self.index
            .contains_key(&(image.name.clone(), image.reference.clone()))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn entries(&self) -> Vec<&StoreEntry> {
        let mut entries = self.entries.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| (&a.name, &a.reference).cmp(&(&b.name, &b.reference)));
        entries
    }
}
