use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use torcx_apply::{
    apply_and_seal, apply_profile, read_seal_record, ApplyConfig, SealRecord, TorcxConfig,
};
use torcx_core::os_release::current_os_version_id;
use torcx_core::{find_torcx_error, Image, ProfileManifest, TorcxError, OS_RELEASE_REL_PATH};
use torcx_remote::{RemoteFetcher, RemoteStore};
use torcx_store::{list_profiles, merge_profiles, read_profile, StoreCache};

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, render_row, render_section_header, render_status_line,
    DownloadProgress, OutputStyle,
};
use crate::{Cli, Commands, ImageCommands, ProfileCommands, RemoteCommands};

pub(crate) struct RunContext {
    pub(crate) config: TorcxConfig,
    pub(crate) apply: ApplyConfig,
    pub(crate) os_version: Option<String>,
}

impl RunContext {
    pub(crate) fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = TorcxConfig::load(config_path)?;
        let os_release = config.usr_mountpoint().join(OS_RELEASE_REL_PATH);
        let os_version = match current_os_version_id(Some(&os_release)) {
            Ok(version) => Some(version),
            Err(err) => {
                tracing::debug!(error = %err, "no OS version, skipping versioned store");
                None
            }
        };
        let apply = ApplyConfig::from_config(&config, os_version.as_deref())?;
        Ok(Self {
            config,
            apply,
            os_version,
        })
    }

    fn usr_mountpoint(&self) -> String {
        self.config.usr_mountpoint().display().to_string()
    }

    fn remotes(&self) -> RemoteStore {
        RemoteStore::new(self.apply.remote_dirs())
    }

    fn fetch_dir(&self) -> PathBuf {
        match &self.os_version {
            Some(version) => self.apply.versioned_user_store_dir(version),
            None => self.apply.user_store_dir(),
        }
    }
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        return write_completions_script(shell, &mut io::stdout());
    }

    let ctx = RunContext::load(cli.config.as_deref())?;
    let style = current_output_style();

    match cli.command {
        Commands::Apply { no_seal } => {
            let outcome = if no_seal {
                apply_profile(&ctx.apply)?
            } else {
                let (outcome, record) = apply_and_seal(&ctx.apply)?;
                tracing::info!(path = %ctx.apply.seal_path.display(), "system sealed");
                print_lines(&format_seal_record(style, &record));
                outcome
            };
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!(
                        "applied profile '{}' ({} images)",
                        ctx.apply.upper_profile,
                        outcome.images.len()
                    ),
                )
            );
        }
        Commands::Status => match read_seal_record(&ctx.apply.seal_path)? {
            Some(record) => print_lines(&format_seal_record(style, &record)),
            None => println!("{}", render_status_line(style, "info", "system not sealed")),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::List => {
                let profiles = list_profiles(&ctx.apply.profile_dirs())?;
                print_lines(&format_profile_list(style, &profiles, &ctx.apply));
            }
            ProfileCommands::Check { name } => {
                let images = profile_images(&ctx.apply, name.as_deref())?;
                let store = StoreCache::new(&ctx.apply.store_paths)?;
                let (lines, missing) = check_images(style, &store, &images);
                print_lines(&lines);
                if missing > 0 {
                    bail!("{missing} images missing from local stores");
                }
            }
            ProfileCommands::Show { name } => {
                let images = profile_images(&ctx.apply, name.as_deref())?;
                print!("{}", ProfileManifest::new(images).to_v1_json_pretty()?);
            }
        },
        Commands::Image {
            command: ImageCommands::List,
        } => {
            let store = StoreCache::new(&ctx.apply.store_paths)?;
            print_lines(&format_store_entries(style, &store));
        }
        Commands::Remote { command } => match command {
            RemoteCommands::List => {
                for entry in ctx.remotes().list()? {
                    println!(
                        "{}",
                        render_row(style, &[&entry.name, &entry.remote.template_url])
                    );
                }
            }
            RemoteCommands::Url { name } => {
                let entry = ctx.remotes().get(&name)?;
                println!("{}", entry.remote.evaluate_url(&ctx.usr_mountpoint())?);
            }
        },
        Commands::Fetch {
            name,
            reference,
            remote,
        } => {
            let image = fetch_target(&ctx.apply, &name, &reference, remote)?;
            let fetcher = RemoteFetcher::new()?;
            let progress = DownloadProgress::start(style, &image.display_id());
            let mut written = 0_u64;
            let archive = fetcher.fetch_image(
                &ctx.remotes(),
                &image,
                &ctx.usr_mountpoint(),
                &ctx.fetch_dir(),
                &mut |bytes: u64, total: Option<u64>| {
                    written = bytes;
                    progress.update(bytes, total);
                },
            )?;
            if let Some(line) = progress.finish(written) {
                println!("{line}");
            }
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!("fetched {} to {}", image.display_id(), archive.path().display()),
                )
            );
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

pub(crate) fn explain_failure(err: anyhow::Error) -> anyhow::Error {
    if find_torcx_error(&err).is_some_and(TorcxError::is_permission_denied) {
        return err.context("permission denied; torcx needs to run as root");
    }
    err
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub(crate) fn profile_images(cfg: &ApplyConfig, name: Option<&str>) -> Result<Vec<Image>> {
    let Some(name) = name else {
        return merge_profiles(&cfg.profile_dirs(), &cfg.lower_profiles, &cfg.upper_profile);
    };
    let profiles = list_profiles(&cfg.profile_dirs())?;
    let path = profiles
        .get(name)
        .ok_or_else(|| TorcxError::ProfileNotFound(name.to_string()))?;
    Ok(read_profile(path)?)
}

pub(crate) fn fetch_target(
    cfg: &ApplyConfig,
    name: &str,
    reference: &str,
    remote: Option<String>,
) -> Result<Image> {
    let image = Image::new(name, reference);
    if let Some(remote) = remote {
        return Ok(image.with_remote(remote));
    }
    let images = merge_profiles(&cfg.profile_dirs(), &cfg.lower_profiles, &cfg.upper_profile)?;
    images
        .into_iter()
        .find(|candidate| {
            candidate.name == name
                && candidate.reference == reference
                && !candidate.remote.is_empty()
        })
        .ok_or_else(|| anyhow!("no remote known for {}; pass --remote", image.display_id()))
}

pub(crate) fn format_profile_list(
    style: OutputStyle,
    profiles: &BTreeMap<String, PathBuf>,
    cfg: &ApplyConfig,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(profiles.len() + 1);
    if let Some(header) = render_section_header(style, "profiles") {
        lines.push(header);
    }
    for (name, path) in profiles {
        let marker = if *name == cfg.upper_profile {
            "*"
        } else if cfg.lower_profiles.contains(name) {
            "+"
        } else {
            "-"
        };
        let path = path.display().to_string();
        lines.push(render_row(style, &[marker, name, &path]));
    }
    lines
}

pub(crate) fn check_images(
    style: OutputStyle,
    store: &StoreCache,
    images: &[Image],
) -> (Vec<String>, usize) {
    let mut lines = Vec::with_capacity(images.len());
    let mut missing = 0;
    for image in images {
        let line = match store.archive_for(image) {
            Ok(archive) => render_status_line(
                style,
                "ok",
                &format!("{} {}", image.display_id(), archive.path().display()),
            ),
            Err(err) => {
                missing += 1;
                render_status_line(style, "missing", &err.to_string())
            }
        };
        lines.push(line);
    }
    (lines, missing)
}

pub(crate) fn format_store_entries(style: OutputStyle, store: &StoreCache) -> Vec<String> {
    store
        .entries()
        .into_iter()
        .map(|entry| {
            let id = format!("{}:{}", entry.name, entry.reference);
            let path = entry.archive.path().display().to_string();
            render_row(style, &[&id, entry.archive.format.as_str(), &path])
        })
        .collect()
}

pub(crate) fn format_seal_record(style: OutputStyle, record: &SealRecord) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "sealed state") {
        lines.push(header);
    }
    lines.extend(record.render().lines().map(str::to_string));
    lines
}
