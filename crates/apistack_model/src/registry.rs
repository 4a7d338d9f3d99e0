//! Handles to externally owned image registries.
//!
//! A registry is provisioned by some other stack. This crate only ever holds
//! an identifier for it and knows how to render image references from it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default tag used when the caller does not pin an image.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

fn repository_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$")
            .expect("repository name pattern is valid")
    })
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("tag pattern is valid"))
}

fn digest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^sha256:[a-f0-9]{64}$").expect("digest pattern is valid"))
}

/// Reference to an image registry owned by another stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRegistryRef {
    /// Repository name, e.g. `api`.
    pub name: String,
    /// Account that owns the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Region the repository lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Explicit repository URI. Takes precedence over account/region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl ImageRegistryRef {
    /// Create a handle from a repository name.
    pub fn new(name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        if !repository_name_pattern().is_match(&name) {
            return Err(ModelError::invalid(
                "image_registry.name",
                format!("'{}' is not a valid repository name", name),
            ));
        }
        Ok(Self {
            name,
            account: None,
            region: None,
            uri: None,
        })
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Resolve the repository URI.
    ///
    /// Falls back to the bare repository name when neither an explicit URI
    /// nor an account/region pair is known.
    pub fn repository_uri(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.trim_end_matches('/').to_string();
        }
        match (&self.account, &self.region) {
            (Some(account), Some(region)) => {
                format!("{}.dkr.ecr.{}.amazonaws.com/{}", account, region, self.name)
            }
            _ => self.name.clone(),
        }
    }

    /// Render the full image URI for a tag or digest.
    pub fn image_uri(&self, tag: &ImageTag) -> String {
        match tag {
            ImageTag::Tag(t) => format!("{}:{}", self.repository_uri(), t),
            ImageTag::Digest(d) => format!("{}@{}", self.repository_uri(), d),
        }
    }
}

/// Tag or digest selecting an image within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTag {
    /// Mutable tag such as `latest`.
    Tag(String),
    /// Content digest, `sha256:<hex>`.
    Digest(String),
}

impl Default for ImageTag {
    fn default() -> Self {
        Self::Tag(DEFAULT_IMAGE_TAG.to_string())
    }
}

impl ImageTag {
    pub fn tag(tag: impl Into<String>) -> ModelResult<Self> {
        let tag = tag.into();
        if !tag_pattern().is_match(&tag) {
            return Err(ModelError::invalid(
                "image_tag",
                format!("'{}' is not a valid image tag", tag),
            ));
        }
        Ok(Self::Tag(tag))
    }

    pub fn digest(digest: impl Into<String>) -> ModelResult<Self> {
        let digest = digest.into();
        if !digest_pattern().is_match(&digest) {
            return Err(ModelError::invalid(
                "image_digest",
                format!("'{}' is not a sha256 digest", digest),
            ));
        }
        Ok(Self::Digest(digest))
    }

    /// Whether the reference can change what it points at.
    pub fn is_mutable(&self) -> bool {
        matches!(self, ImageTag::Tag(_))
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageTag::Tag(t) => write!(f, "{}", t),
            ImageTag::Digest(d) => write!(f, "{}", d),
        }
    }
}

/// A resolved container image: registry handle plus tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub registry: ImageRegistryRef,
    pub tag: ImageTag,
}

impl ImageRef {
    pub fn new(registry: ImageRegistryRef, tag: ImageTag) -> Self {
        Self { registry, tag }
    }

    pub fn uri(&self) -> String {
        self.registry.image_uri(&self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// Caller-supplied inputs for a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackProps {
    pub image_registry: ImageRegistryRef,
    #[serde(default)]
    pub image_tag: ImageTag,
}

impl StackProps {
    /// Props for a registry, using the default `latest` tag.
    pub fn new(image_registry: ImageRegistryRef) -> Self {
        Self {
            image_registry,
            image_tag: ImageTag::default(),
        }
    }

    pub fn with_tag(mut self, tag: ImageTag) -> Self {
        self.image_tag = tag;
        self
    }

    pub fn image(&self) -> ImageRef {
        ImageRef::new(self.image_registry.clone(), self.image_tag.clone())
    }
}
