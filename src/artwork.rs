//! Artwork Loader - raw frame markup by asset reference
//!
//! Adapters only fetch text. They never touch the markup, so composition
//! output is the same whichever adapter served the artwork.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Invalid asset reference {asset_ref:?}: {reason}")]
    InvalidRef { asset_ref: String, reason: &'static str },

    #[error("Failed to read artwork {asset_ref}: {source}")]
    Io {
        asset_ref: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch artwork {asset_ref}: {source}")]
    Http {
        asset_ref: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Artwork {asset_ref} returned HTTP {status}")]
    Status { asset_ref: String, status: u16 },
}

/// Resolves an `assetRef` from the template catalog to raw SVG markup.
pub trait ArtworkLoader: Send + Sync {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError>;
}

impl<L: ArtworkLoader + ?Sized> ArtworkLoader for Arc<L> {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError> {
        (**self).load(asset_ref)
    }
}

impl<L: ArtworkLoader + ?Sized> ArtworkLoader for Box<L> {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError> {
        (**self).load(asset_ref)
    }
}

/// Normalize a catalog asset reference: `/` separators, no `.` segments,
/// never absolute and never escaping upwards with `..`.
pub fn normalize_asset_ref(asset_ref: &str) -> Result<String, ArtworkError> {
    let invalid = |reason| ArtworkError::InvalidRef {
        asset_ref: asset_ref.to_string(),
        reason,
    };

    let s = asset_ref.replace('\\', "/");
    if s.starts_with('/') {
        return Err(invalid("must be relative"));
    }

    let mut parts = Vec::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid("must not contain '..'")),
            _ => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Err(invalid("must name a file"));
    }
    if parts[0].contains(':') {
        return Err(invalid("must not carry a scheme or drive"));
    }

    Ok(parts.join("/"))
}

/// Reads artwork from a local directory (the server-side adapter).
#[derive(Debug, Clone)]
pub struct FsArtworkLoader {
    root: PathBuf,
}

impl FsArtworkLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtworkLoader for FsArtworkLoader {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError> {
        let rel = normalize_asset_ref(asset_ref)?;
        let path = self.root.join(&rel);
        tracing::debug!(path = %path.display(), "reading artwork");
        fs::read_to_string(&path).map_err(|source| ArtworkError::Io {
            asset_ref: asset_ref.to_string(),
            source,
        })
    }
}

/// Fetches artwork relative to a base URL (the client-side adapter).
#[derive(Debug, Clone)]
pub struct HttpArtworkLoader {
    base_url: reqwest::Url,
    client: reqwest::blocking::Client,
}

impl HttpArtworkLoader {
    pub fn new(base_url: &str) -> Result<Self, ArtworkError> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ArtworkError> {
        // Without a trailing slash `Url::join` would replace the last segment.
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = reqwest::Url::parse(&base).map_err(|_| ArtworkError::InvalidRef {
            asset_ref: base_url.to_string(),
            reason: "base URL does not parse",
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ArtworkError::Http {
                asset_ref: base_url.to_string(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    /// Absolute URL an asset reference resolves to.
    pub fn url_for(&self, asset_ref: &str) -> Result<reqwest::Url, ArtworkError> {
        let rel = normalize_asset_ref(asset_ref)?;
        self.base_url.join(&rel).map_err(|_| ArtworkError::InvalidRef {
            asset_ref: asset_ref.to_string(),
            reason: "does not form a valid URL",
        })
    }
}

impl ArtworkLoader for HttpArtworkLoader {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError> {
        let url = self.url_for(asset_ref)?;
        tracing::debug!(%url, "fetching artwork");

        let http_err = |source| ArtworkError::Http {
            asset_ref: asset_ref.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArtworkError::Status {
                asset_ref: asset_ref.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(http_err)
    }
}

/// Memoizes successful loads per asset reference. Artwork is immutable for
/// the life of a deployment, so entries never expire. Failures are not cached.
#[derive(Debug)]
pub struct CachingLoader<L> {
    inner: L,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl<L: ArtworkLoader> CachingLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl<L: ArtworkLoader> ArtworkLoader for CachingLoader<L> {
    fn load(&self, asset_ref: &str) -> Result<String, ArtworkError> {
        if let Some(hit) = self.cache.read().get(asset_ref) {
            return Ok(hit.to_string());
        }

        let markup = self.inner.load(asset_ref)?;
        self.cache
            .write()
            .entry(asset_ref.to_string())
            .or_insert_with(|| Arc::from(markup.as_str()));
        Ok(markup)
    }
}
