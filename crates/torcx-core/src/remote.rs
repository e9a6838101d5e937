use std::path::Path;

use url::Url;

use crate::error::{Result, TorcxError};
use crate::os_release::{OsRelease, VERSION_ID_KEY};

pub const OS_RELEASE_REL_PATH: &str = "lib/os-release";

const BOARD_KEYS: [&str; 2] = ["FLATCAR_BOARD", "COREOS_BOARD"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub template_url: String,
}

impl Remote {
    pub fn new(template_url: impl Into<String>) -> Self {
        Self {
            template_url: template_url.into(),
        }
    }

    pub fn evaluate_url(&self, usr_mountpoint: &str) -> Result<Url> {
        evaluate_url(Some(self), usr_mountpoint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fact {
    Id,
    VersionId,
    Board,
    UsrMountpoint,
}

impl Fact {
    fn from_placeholder(name: &str) -> Option<Self> {
        match name {
            "ID" => Some(Self::Id),
            "VERSION_ID" => Some(Self::VersionId),
            "COREOS_BOARD" | "FLATCAR_BOARD" => Some(Self::Board),
            "COREOS_USR" | "FLATCAR_USR" => Some(Self::UsrMountpoint),
            _ => None,
        }
    }

    fn needs_os_release(self) -> bool {
        !matches!(self, Self::UsrMountpoint)
    }
}

struct TemplateFacts<'a> {
    usr_mountpoint: &'a str,
    os_release: Option<OsRelease>,
}

impl TemplateFacts<'_> {
    fn value(&self, fact: Fact) -> Option<String> {
        if fact == Fact::UsrMountpoint {
            return Some(self.usr_mountpoint.to_string());
        }
        let release = self.os_release.as_ref()?;
        let value = match fact {
            Fact::Id => release.get("ID"),
            Fact::VersionId => release.get(VERSION_ID_KEY),
            Fact::Board => BOARD_KEYS.iter().find_map(|key| release.get(key)),
            Fact::UsrMountpoint => None,
        };
        value.map(str::to_string)
    }
}

/// Resolves `remote`'s template against the release file found under
/// `usr_mountpoint`.
///
/// Unknown placeholders are kept verbatim. The release file is only read
/// when the template refers to one of its facts.
pub fn evaluate_url(remote: Option<&Remote>, usr_mountpoint: &str) -> Result<Url> {
    let remote = remote.ok_or(TorcxError::NilRemote)?;
    if usr_mountpoint.is_empty() {
        return Err(TorcxError::EmptyMountpoint);
    }
    if remote.template_url.is_empty() {
        return Err(TorcxError::EmptyTemplate);
    }

    let template = remote.template_url.as_str();
    let mut facts = TemplateFacts {
        usr_mountpoint,
        os_release: None,
    };
    if placeholders(template)
        .filter_map(Fact::from_placeholder)
        .any(Fact::needs_os_release)
    {
        let path = Path::new(usr_mountpoint).join(OS_RELEASE_REL_PATH);
        facts.os_release = Some(OsRelease::from_path(&path)?);
    }

    let expanded = expand_placeholders(template, |name| {
        Fact::from_placeholder(name).and_then(|fact| facts.value(fact))
    });
    Url::parse(&expanded).map_err(|source| TorcxError::InvalidUrl {
        url: expanded.clone(),
        source,
    })
}

pub fn expand_placeholders<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let token = &rest[start..];
        let Some(end) = token.find('}') else {
            out.push_str(token);
            return out;
        };
        let name = &token[2..end];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&token[..=end]),
        }
        rest = &token[end + 1..];
    }
    out.push_str(rest);
    out
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    template.split("${").skip(1).filter_map(|chunk| {
        chunk.find('}').map(|end| &chunk[..end])
    })
}
