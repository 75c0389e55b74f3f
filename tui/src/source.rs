use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use karten_core::{LoadError, ResourceSource};
use tracing::{debug, info, warn};

use crate::db::{deck_key, Db, TOPICS_KEY};

const HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    Dir(PathBuf),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Path(PathBuf),
    Url(String),
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

impl Root {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if is_url(raw) {
            Root::Url(raw.trim_end_matches('/').to_string())
        } else {
            Root::Dir(PathBuf::from(raw))
        }
    }

    /// Topic `file` references are relative to the data root, not to the
    /// topic list. Absolute URLs are used as they are.
    pub fn resolve(&self, reference: &str) -> Location {
        if is_url(reference) {
            return Location::Url(reference.to_string());
        }
        let relative = clean_reference(reference);
        match self {
            Root::Dir(dir) => Location::Path(dir.join(relative)),
            Root::Url(base) => Location::Url(format!("{base}/{relative}")),
        }
    }
}

pub fn clean_reference(reference: &str) -> &str {
    let mut relative = reference.trim();
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest;
    }
    relative.trim_start_matches('/')
}

/// Reads resources from a local directory or over HTTP.
pub struct DataSource {
    root: Root,
    client: reqwest::blocking::Client,
}

impl DataSource {
    pub fn new(root: Root) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { root, client })
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    fn fetch_url(&self, url: &str) -> Result<String, LoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LoadError::NotFound(format!("{url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::NotFound(format!("{url} ({status})")));
        }
        response
            .text()
            .map_err(|err| LoadError::NotFound(format!("{url}: {err}")))
    }
}

impl ResourceSource for DataSource {
    fn fetch(&self, reference: &str) -> Result<String, LoadError> {
        match self.root.resolve(reference) {
            Location::Path(path) => {
                debug!(path = %path.display(), "reading resource");
                fs::read_to_string(&path)
                    .map_err(|err| LoadError::NotFound(format!("{}: {err}", path.display())))
            }
            Location::Url(url) => {
                debug!(%url, "fetching resource");
                self.fetch_url(&url)
            }
        }
    }
}

/// Writes every successful fetch through to the local store and serves the
/// stored copy when the live resource is unreachable.
pub struct CachedSource<S> {
    inner: S,
    db: Arc<dyn Db>,
    topics_reference: String,
}

impl<S: ResourceSource> CachedSource<S> {
    pub fn new(inner: S, db: Arc<dyn Db>, topics_reference: &str) -> Self {
        Self {
            inner,
            db,
            topics_reference: topics_reference.to_string(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache_key(&self, reference: &str) -> String {
        if reference == self.topics_reference {
            TOPICS_KEY.to_string()
        } else {
            deck_key(reference)
        }
    }
}

impl<S: ResourceSource> ResourceSource for CachedSource<S> {
    fn fetch(&self, reference: &str) -> Result<String, LoadError> {
        let key = self.cache_key(reference);
        match self.inner.fetch(reference) {
            Ok(body) => {
                // Only JSON is worth keeping; an HTML error page must not
                // replace a good offline copy.
                if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                    if let Err(err) = self.db.put(&key, &body) {
                        warn!(%key, error = %err, "failed to cache resource");
                    }
                }
                Ok(body)
            }
            Err(LoadError::NotFound(reason)) => match self.db.get(&key) {
                Ok(Some(entry)) => {
                    info!(%key, stored_at = %entry.stored_at, "serving cached copy");
                    Ok(entry.value)
                }
                Ok(None) => Err(LoadError::NotFound(reason)),
                Err(err) => {
                    warn!(%key, error = %err, "cache lookup failed");
                    Err(LoadError::NotFound(reason))
                }
            },
            Err(err) => Err(err),
        }
    }
}
