use crate::manifest::Manifest;
use url::Url;

/// Cache name used when none is configured. Bump the version to invalidate every cached asset.
pub const DEFAULT_CACHE_NAME: &str = "docscanner-cache-v1";

/// Everything one worker version needs, built once at startup
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Version-qualified name of the current cache store
    pub cache_name: String,
    /// URL manifest entries are resolved against
    pub scope: Url,
    pub manifest: Manifest,
    /// Treat cross-origin manifest entries as best-effort during install
    pub cross_origin_optional: bool,
}

impl WorkerConfig {
    pub fn new(cache_name: impl Into<String>, scope: Url, manifest: Manifest) -> Self {
        Self {
            cache_name: cache_name.into(),
            scope,
            manifest,
            cross_origin_optional: false,
        }
    }

    pub fn with_cross_origin_optional(mut self, optional: bool) -> Self {
        self.cross_origin_optional = optional;
        self
    }
}
