use std::fs;
use std::path::Path;

use torcx_core::{find_torcx_error, Image, TorcxError};
use url::Url;

use super::*;

fn write_remote(dir: &Path, name: &str, base_url: &str) {
    let remote_dir = dir.join(name);
    fs::create_dir_all(&remote_dir).expect("must create remote dir");
    fs::write(
        remote_dir.join(REMOTE_MANIFEST_FILE),
        format!(r#"{{"kind":"remote-manifest-v0","value":{{"base_url":"{base_url}"}}}}"#),
    )
    .expect("must write remote manifest");
}

#[test]
fn image_url_appends_archive_name() {
    let base = Url::parse("https://example.com/flatcar/amd64-usr/3033.2.0/").expect("valid url");
    let url = image_url(&base, &Image::new("docker", "20.10")).expect("must build url");
    assert_eq!(
        url.as_str(),
        "https://example.com/flatcar/amd64-usr/3033.2.0/docker:20.10.torcx.tgz"
    );

    let bare = Url::parse("https://example.com/images").expect("valid url");
    let url = image_url(&bare, &Image::new("rkt", "1")).expect("must build url");
    assert_eq!(url.as_str(), "https://example.com/images/rkt:1.torcx.tgz");
}

#[test]
fn image_url_rejects_opaque_base() {
    let base = Url::parse("mailto:ops@example.com").expect("valid url");
    assert!(image_url(&base, &Image::new("docker", "1")).is_err());
}

#[test]
fn remote_store_later_dirs_shadow_earlier() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let vendor = root.path().join("vendor/remotes");
    let user = root.path().join("etc/remotes");
    write_remote(&vendor, "official", "https://vendor.example.com/${VERSION_ID}");
    write_remote(&vendor, "mirror", "https://mirror.example.com/");
    write_remote(&user, "official", "https://user.example.com/${VERSION_ID}");
    fs::create_dir_all(user.join("not-a-remote")).expect("must create stray dir");

    let store = RemoteStore::new(vec![vendor, user.clone()]);
    let listed = store.list().expect("must list remotes");

    let names = listed
        .iter()
        .map(|entry| entry.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["mirror", "official"]);
    assert_eq!(
        listed[1].remote.template_url,
        "https://user.example.com/${VERSION_ID}"
    );

    let official = store.get("official").expect("must find remote");
    assert_eq!(
        official.manifest_path,
        user.join("official").join(REMOTE_MANIFEST_FILE)
    );
}

#[test]
fn remote_store_reports_missing_remote() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let store = RemoteStore::new(vec![root.path().join("absent")]);

    assert!(store.list().expect("missing dirs list nothing").is_empty());
    let err = store.get("nowhere").expect_err("must not resolve");
    assert!(matches!(
        find_torcx_error(&err),
        Some(TorcxError::RemoteNotFound(name)) if name == "nowhere"
    ));
}

#[test]
fn remote_store_surfaces_bad_manifest() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let dir = root.path().join("remotes");
    fs::create_dir_all(dir.join("broken")).expect("must create remote dir");
    fs::write(
        dir.join("broken").join(REMOTE_MANIFEST_FILE),
        r#"{"kind":"remote-manifest-v0","value":{"base_url":""}}"#,
    )
    .expect("must write manifest");

    let store = RemoteStore::new(vec![dir]);
    let err = store.get("broken").expect_err("empty base url must fail");
    assert!(format!("{err:#}").contains("invalid remote manifest"));
}

#[test]
fn fetch_requires_a_known_remote() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let store = RemoteStore::new(vec![root.path().join("remotes")]);
    let fetcher = RemoteFetcher::new().expect("must build client");
    let mut progress = |_: u64, _: Option<u64>| {};

    let err = fetcher
        .fetch_image(
            &store,
            &Image::new("docker", "1"),
            "/usr",
            &root.path().join("store"),
            &mut progress,
        )
        .expect_err("image without remote must fail");
    assert!(format!("{err:#}").contains("names no remote"));

    let err = fetcher
        .fetch_image(
            &store,
            &Image::new("docker", "1").with_remote("ghost"),
            "/usr",
            &root.path().join("store"),
            &mut progress,
        )
        .expect_err("unknown remote must fail");
    assert!(matches!(
        find_torcx_error(&err),
        Some(TorcxError::RemoteNotFound(_))
    ));
    assert!(!root.path().join("store").exists());
}

#[test]
fn fetch_rejects_names_that_leave_the_store() {
    let root = tempfile::tempdir().expect("must create tempdir");
    let remotes = root.path().join("remotes");
    write_remote(&remotes, "r", "https://example.com/");
    let store = RemoteStore::new(vec![remotes]);
    let fetcher = RemoteFetcher::new().expect("must build client");
    let dest = root.path().join("a/b/store");
    let mut progress = |_: u64, _: Option<u64>| {};

    for image in [
        Image::new("../../x", "1"),
        Image::new("docker", "../1"),
        Image::new("/abs", "1"),
    ] {
        let err = fetcher
            .fetch_image(&store, &image.with_remote("r"), "/usr", &dest, &mut progress)
            .expect_err("escaping name must fail");
        assert!(matches!(
            find_torcx_error(&err),
            Some(TorcxError::InvalidImageName(_))
        ));
    }
    assert!(!root.path().join("a").exists());
}
