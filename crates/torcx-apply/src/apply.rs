use std::path::PathBuf;

use anyhow::{Context, Result};
use torcx_core::{Image, TorcxError};
use torcx_store::{merge_profiles, StoreCache};

use crate::fs_utils::set_mode;
use crate::mounts::{KernelMounter, Mounter};
use crate::propagate::{propagate_category, retrieve_assets, AssetCategory};
use crate::seal::{seal_system_state, write_run_profile, SealRecord};
use crate::unpack::{ExtractOptions, ImageUnpacker};
use crate::ApplyConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub images: Vec<Image>,
    pub run_profile: PathBuf,
}

pub fn apply_profile(cfg: &ApplyConfig) -> Result<ApplyOutcome> {
    apply_profile_with(cfg, &KernelMounter, ExtractOptions::privileged())
}

pub fn apply_profile_with(
    cfg: &ApplyConfig,
    mounter: &dyn Mounter,
    options: ExtractOptions,
) -> Result<ApplyOutcome> {
    cfg.validate()?;
    if cfg.seal_path.exists() {
        return Err(TorcxError::AlreadySealed(cfg.seal_path.clone()).into());
    }

    let span = tracing::info_span!(
        "apply",
        upper_profile = %cfg.upper_profile,
        run_dir = %cfg.run_dir.display()
    );
    let _guard = span.enter();

    setup_paths(cfg, mounter).context("profile setup")?;

    let images = merge_profiles(
        &cfg.profile_dirs(),
        &cfg.lower_profiles,
        &cfg.upper_profile,
    )?;
    if !images.is_empty() {
        apply_images(cfg, &images, mounter, options)?;
    }

    let run_profile = write_run_profile(cfg, &images)?;
    tracing::info!(images = images.len(), "profile applied");
    Ok(ApplyOutcome {
        images,
        run_profile,
    })
}

pub fn apply_and_seal(cfg: &ApplyConfig) -> Result<(ApplyOutcome, SealRecord)> {
    apply_and_seal_with(cfg, &KernelMounter, ExtractOptions::privileged())
}

pub fn apply_and_seal_with(
    cfg: &ApplyConfig,
    mounter: &dyn Mounter,
    options: ExtractOptions,
) -> Result<(ApplyOutcome, SealRecord)> {
    let outcome = apply_profile_with(cfg, mounter, options)?;
    let record = seal_system_state(cfg, mounter)?;
    Ok((outcome, record))
}

// `/run` is usually noexec, hence the tmpfs.
pub fn setup_paths(cfg: &ApplyConfig, mounter: &dyn Mounter) -> Result<()> {
    cfg.ensure_paths()?;

    let unpack_dir = cfg.run_unpack_dir();
    mounter.mount_tmpfs(&unpack_dir, &cfg.unpack_size)?;
    // tmpfs comes up 1777
    set_mode(&unpack_dir, 0o755)
        .with_context(|| format!("failed to chmod {}", unpack_dir.display()))?;

    tracing::debug!(target_dir = %unpack_dir.display(), size = %cfg.unpack_size, "mounted tmpfs");
    Ok(())
}

pub fn apply_images(
    cfg: &ApplyConfig,
    images: &[Image],
    mounter: &dyn Mounter,
    options: ExtractOptions,
) -> Result<()> {
    let store = StoreCache::new(&cfg.store_paths)?;
    let unpack_dir = cfg.run_unpack_dir();
    let unpacker = ImageUnpacker::new(&unpack_dir, options, mounter);

    let mut failed = Vec::new();
    for image in images {
        let span = tracing::error_span!(
            "image",
            image = %image.name,
            reference = %image.reference
        );
        let _guard = span.enter();

        if let Err(err) = apply_image(cfg, &store, &unpacker, image) {
            tracing::error!(error = %format!("{err:#}"), "image skipped");
            failed.push(image.display_id());
        }
    }

    if !failed.is_empty() {
        tracing::debug!(failed = ?failed, "some images failed");
        return Err(TorcxError::FailedImages {
            count: failed.len(),
        }
        .into());
    }
    Ok(())
}

fn apply_image(
    cfg: &ApplyConfig,
    store: &StoreCache,
    unpacker: &ImageUnpacker<'_>,
    image: &Image,
) -> Result<()> {
    let archive = store.archive_for(image)?;
    tracing::debug!(
        path = %archive.filepath.display(),
        format = archive.format.as_str(),
        "image found"
    );

    let image_root = unpacker.unpack(&archive, &image.name)?;
    tracing::debug!(path = %image_root.display(), "image unpacked");

    let assets = retrieve_assets(&image_root)?;
    for category in AssetCategory::ALL {
        let found = assets.get(category);
        if found.is_empty() {
            continue;
        }
        propagate_category(cfg, &image_root, category, found)
            .with_context(|| format!("failed to propagate {}", category.as_str()))?;
        tracing::debug!(assets = ?found, "{} propagated", category.as_str());
    }
    Ok(())
}
