//! The Asset Manifest: the fixed list of URLs pre-cached at install

use crate::error::{Result, WorkerError};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Same-origin paths cached by the document-relative deployment
const DOCUMENT_RELATIVE: &[&str] = &[
    ".",
    "./index.html",
    "./manifest.json",
    "./icons/icon-192.png",
    "./icons/icon-512.png",
];

/// Root-relative deployment, which also pre-caches the OpenCV script
const ROOT_RELATIVE: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
    "https://docs.opencv.org/4.x/opencv.js",
];

/// One manifest URL, as written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    /// Optional entries may fail to fetch without failing the install
    #[serde(default)]
    pub optional: bool,
}

impl ManifestEntry {
    pub fn required(url: &str) -> Self {
        Self {
            url: url.to_string(),
            optional: false,
        }
    }

    pub fn optional(url: &str) -> Self {
        Self {
            url: url.to_string(),
            optional: true,
        }
    }
}

/// A manifest entry resolved against the worker scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub url: Url,
    pub optional: bool,
}

/// Built-in manifest variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestVariant {
    #[default]
    DocumentRelative,
    RootRelative,
}

impl FromStr for ManifestVariant {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "document-relative" => Ok(Self::DocumentRelative),
            "root-relative" => Ok(Self::RootRelative),
            other => Err(WorkerError::Manifest(format!(
                "unknown manifest variant {:?} (expected document-relative or root-relative)",
                other
            ))),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Url(String),
    Entry(ManifestEntry),
}

/// Ordered list of URLs to pre-cache
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin(variant: ManifestVariant) -> Self {
        let urls = match variant {
            ManifestVariant::DocumentRelative => DOCUMENT_RELATIVE,
            ManifestVariant::RootRelative => ROOT_RELATIVE,
        };
        Self::new(urls.iter().map(|u| ManifestEntry::required(u)).collect())
    }

    /// Parse a JSON array whose items are URL strings or `{ "url", "optional" }` objects
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|entry| match entry {
                RawEntry::Url(url) => ManifestEntry::required(&url),
                RawEntry::Entry(entry) => entry,
            })
            .collect();
        Ok(Self::new(entries))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkerError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against `scope`.
    ///
    /// With `cross_origin_optional`, entries on a different origin than the
    /// scope are treated as optional regardless of how they were declared.
    pub fn resolve(&self, scope: &Url, cross_origin_optional: bool) -> Result<Vec<ResolvedAsset>> {
        self.entries
            .iter()
            .map(|entry| {
                let url = scope.join(&entry.url).map_err(|e| {
                    WorkerError::Manifest(format!("invalid manifest URL {:?}: {}", entry.url, e))
                })?;
                let cross_origin = url.origin() != scope.origin();
                Ok(ResolvedAsset {
                    optional: entry.optional || (cross_origin_optional && cross_origin),
                    url,
                })
            })
            .collect()
    }
}
