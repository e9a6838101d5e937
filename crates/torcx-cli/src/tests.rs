use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use torcx_apply::ApplyConfig;
use torcx_core::{Image, TorcxError};
use torcx_store::StoreCache;

use crate::completion::write_completions_script;
use crate::dispatch::{
    check_images, explain_failure, fetch_target, format_profile_list, format_store_entries,
    profile_images,
};
use crate::render::{render_row, render_status_line, OutputStyle};
use crate::{Cli, Commands, ProfileCommands};

fn test_config(root: &Path) -> ApplyConfig {
    let mut cfg = ApplyConfig {
        base_dir: root.join("var/lib/torcx"),
        run_dir: root.join("run/torcx"),
        conf_dir: root.join("etc/torcx"),
        vendor_dir: root.join("usr/share/torcx"),
        oem_dir: root.join("usr/share/oem/torcx"),
        lower_profiles: vec!["vendor".to_string()],
        upper_profile: "dev".to_string(),
        ..ApplyConfig::default()
    };
    cfg.store_paths = cfg.default_store_paths(None);
    cfg
}

fn write_profile(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).expect("must create profile dir");
    fs::write(
        dir.join(format!("{name}.json")),
        format!(r#"{{"kind":"profile-manifest-v1","value":{{"images":[{body}]}}}}"#),
    )
    .expect("must write profile");
}

#[test]
fn cli_parses_apply_and_profile_commands() {
    let cli = Cli::try_parse_from(["torcx", "apply", "--no-seal"]).expect("must parse apply");
    assert!(matches!(cli.command, Commands::Apply { no_seal: true }));

    let cli = Cli::try_parse_from(["torcx", "--verbose", "profile", "show", "vendor"])
        .expect("must parse profile show");
    assert!(cli.verbose);
    assert!(matches!(
        cli.command,
        Commands::Profile {
            command: ProfileCommands::Show { name: Some(ref name) }
        } if name == "vendor"
    ));

    assert!(Cli::try_parse_from(["torcx", "fetch", "docker"]).is_err());
}

#[test]
fn completions_mention_binary_name() {
    let mut out = Vec::new();
    write_completions_script(clap_complete::Shell::Bash, &mut out)
        .expect("must write completions");
    let script = String::from_utf8(out).expect("utf-8 script");
    assert!(script.contains("torcx"));
    assert!(script.contains("apply"));
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "applied profile 'vendor'"),
        "applied profile 'vendor'"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "missing", "docker:1"),
        "[MISSING] docker:1"
    );
    assert_eq!(render_row(OutputStyle::Plain, &["a", "b"]), "a\tb");
}

#[test]
fn profile_list_marks_active_layers() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let cfg = test_config(root.path());
    write_profile(&cfg.vendor_profile_dir(), "vendor", "");
    write_profile(&cfg.user_profile_dir(), "dev", "");
    write_profile(&cfg.user_profile_dir(), "spare", "");

    let profiles = torcx_store::list_profiles(&cfg.profile_dirs()).expect("must list");
    let lines = format_profile_list(OutputStyle::Plain, &profiles, &cfg);

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("*\tdev\t"));
    assert!(lines[1].starts_with("-\tspare\t"));
    assert!(lines[2].starts_with("+\tvendor\t"));
}

#[test]
fn profile_check_counts_missing_images() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let cfg = test_config(root.path());
    write_profile(
        &cfg.vendor_profile_dir(),
        "vendor",
        r#"{"name":"docker","reference":"1"}"#,
    );
    write_profile(
        &cfg.user_profile_dir(),
        "dev",
        r#"{"name":"rkt","reference":"2"}"#,
    );
    let store_dir = cfg.vendor_store_dir();
    fs::create_dir_all(&store_dir).expect("must create store");
    fs::write(store_dir.join("docker:1.torcx.tgz"), b"tgz").expect("must write archive");

    let images = profile_images(&cfg, None).expect("must merge profiles");
    let store = StoreCache::new(&cfg.store_paths).expect("must index stores");
    let (lines, missing) = check_images(OutputStyle::Plain, &store, &images);

    assert_eq!(missing, 1);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("docker:1 "));

    let entries = format_store_entries(OutputStyle::Plain, &store);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("docker:1\ttgz\t"));

    let single = profile_images(&cfg, Some("dev")).expect("must read single profile");
    assert_eq!(single, vec![Image::new("rkt", "2")]);
    assert!(profile_images(&cfg, Some("absent")).is_err());
}

#[test]
fn fetch_target_uses_remote_from_profile() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let cfg = test_config(root.path());
    write_profile(&cfg.vendor_profile_dir(), "vendor", "");
    write_profile(
        &cfg.user_profile_dir(),
        "dev",
        r#"{"name":"docker","reference":"1","remote":"official"}"#,
    );

    let image = fetch_target(&cfg, "docker", "1", None).expect("profile names a remote");
    assert_eq!(image.remote, "official");

    let image = fetch_target(&cfg, "docker", "1", Some("mirror".to_string()))
        .expect("explicit remote wins");
    assert_eq!(image.remote, "mirror");

    let err = fetch_target(&cfg, "docker", "2", None).expect_err("unknown reference");
    assert!(err.to_string().contains("pass --remote"));
}

#[test]
fn permission_failures_get_a_root_hint() {
    let denied = anyhow::Error::new(TorcxError::Mount {
        op: "mount tmpfs on",
        target: PathBuf::from("/run/torcx/unpack"),
        source: io::Error::from(io::ErrorKind::PermissionDenied),
    })
    .context("profile setup");
    let explained = explain_failure(denied);
    assert!(explained.to_string().contains("needs to run as root"));
    assert!(format!("{explained:#}").contains("mount tmpfs on"));

    let other = explain_failure(anyhow::Error::new(TorcxError::ProfileNotFound(
        "dev".to_string(),
    )));
    assert_eq!(other.to_string(), "profile \"dev\" not found");
}
