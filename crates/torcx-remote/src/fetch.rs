use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use torcx_core::{
    archive_file_name, is_path_component, Archive, ArchiveFormat, Image, TorcxError,
};
use url::Url;

use crate::RemoteStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const READ_CHUNK: usize = 64 * 1024;

pub fn image_url(base: &Url, image: &Image) -> Result<Url> {
    let file_name = archive_file_name(&image.name, &image.reference, ArchiveFormat::TarGzip);
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow!("remote URL cannot be a base: {base}"))?
        .pop_if_empty()
        .push(&file_name);
    Ok(url)
}

pub struct RemoteFetcher {
    client: reqwest::blocking::Client,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn fetch_image(
        &self,
        remotes: &RemoteStore,
        image: &Image,
        usr_mountpoint: &str,
        dest_dir: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<Archive> {
        let file_name = archive_file_name(&image.name, &image.reference, ArchiveFormat::TarGzip);
        if !is_path_component(&image.name) || !is_path_component(&file_name) {
            return Err(TorcxError::InvalidImageName(image.display_id()).into());
        }
        if image.remote.is_empty() {
            return Err(anyhow!("image {} names no remote", image.display_id()));
        }
        let entry = remotes.get(&image.remote)?;
        let base = entry.remote.evaluate_url(usr_mountpoint)?;
        let url = image_url(&base, image)?;
        tracing::debug!(remote = %entry.name, url = %url, "fetching image");

        fs::create_dir_all(dest_dir)
            .with_context(|| format!("failed to create store dir: {}", dest_dir.display()))?;
        let destination = dest_dir.join(&file_name);

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("failed to download {url}"))?;
        let total = response.content_length();

        let mut part = NamedTempFile::new_in(dest_dir)
            .with_context(|| format!("failed to create temp file in {}", dest_dir.display()))?;
        let mut buf = vec![0_u8; READ_CHUNK];
        let mut written = 0_u64;
        loop {
            let read = response
                .read(&mut buf)
                .with_context(|| format!("failed reading {url}"))?;
            if read == 0 {
                break;
            }
            part.write_all(&buf[..read])
                .context("failed writing downloaded image")?;
            written += read as u64;
            progress(written, total);
        }
        part.as_file()
            .sync_all()
            .context("failed to flush downloaded image")?;
        part.persist(&destination)
            .with_context(|| format!("failed to store {}", destination.display()))?;

        tracing::info!(
            image = %image.display_id(),
            path = %destination.display(),
            bytes = written,
            "image fetched"
        );
        Ok(Archive::from_path(destination)?)
    }
}
