use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::remote::Remote;

pub const PROFILE_MANIFEST_V0_KIND: &str = "profile-manifest-v0";
pub const PROFILE_MANIFEST_V1_KIND: &str = "profile-manifest-v1";
pub const REMOTE_MANIFEST_V0_KIND: &str = "remote-manifest-v0";

#[derive(Debug, Deserialize)]
struct KindEnvelope {
    kind: String,
    value: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ManifestOut<'a, T> {
    kind: &'a str,
    value: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImagesV1 {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Serialize)]
struct ImagesV0<'a> {
    images: Vec<ImageV0<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageV0<'a> {
    name: &'a str,
    reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteV0 {
    base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileManifest {
    pub images: Vec<Image>,
}

impl ProfileManifest {
    pub fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let envelope: KindEnvelope =
            serde_json::from_str(input).context("failed to parse profile manifest")?;
        match envelope.kind.as_str() {
            PROFILE_MANIFEST_V0_KIND | PROFILE_MANIFEST_V1_KIND => {}
            other => return Err(anyhow!("unsupported profile manifest kind '{other}'")),
        }

        let value: ImagesV1 = serde_json::from_value(envelope.value)
            .with_context(|| format!("invalid '{}' value", envelope.kind))?;
        for image in &value.images {
            if image.name.trim().is_empty() {
                return Err(anyhow!("image name must not be empty"));
            }
            if image.reference.trim().is_empty() {
                return Err(anyhow!(
                    "image '{}' has an empty reference",
                    image.name
                ));
            }
        }
        Ok(Self::new(value.images))
    }

    pub fn to_v0_json_pretty(&self) -> anyhow::Result<String> {
        let out = ManifestOut {
            kind: PROFILE_MANIFEST_V0_KIND,
            value: ImagesV0 {
                images: self
                    .images
                    .iter()
                    .map(|image| ImageV0 {
                        name: &image.name,
                        reference: &image.reference,
                    })
                    .collect(),
            },
        };
        let mut rendered =
            serde_json::to_string_pretty(&out).context("failed to render run profile")?;
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn to_v1_json_pretty(&self) -> anyhow::Result<String> {
        let out = ManifestOut {
            kind: PROFILE_MANIFEST_V1_KIND,
            value: ImagesV1 {
                images: self.images.clone(),
            },
        };
        let mut rendered =
            serde_json::to_string_pretty(&out).context("failed to render profile")?;
        rendered.push('\n');
        Ok(rendered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteManifest {
    pub remote: Remote,
}

impl RemoteManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let envelope: KindEnvelope =
            serde_json::from_str(input).context("failed to parse remote manifest")?;
        if envelope.kind != REMOTE_MANIFEST_V0_KIND {
            return Err(anyhow!(
                "unsupported remote manifest kind '{}'",
                envelope.kind
            ));
        }
        let value: RemoteV0 = serde_json::from_value(envelope.value)
            .with_context(|| format!("invalid '{}' value", envelope.kind))?;
        if value.base_url.trim().is_empty() {
            return Err(anyhow!("remote base_url must not be empty"));
        }
        Ok(Self {
            remote: Remote::new(value.base_url),
        })
    }
}
