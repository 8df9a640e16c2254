//! Backend response caching with content-addressed storage.
//!
//! Entries live flat in the cache directory as `{hash}.query` (the rendered
//! request, kept for audit) and `{hash}.response` (the raw response text).
//! The response file is the only existence check and is written last through
//! a temp file + rename, so an interrupted store never reads back as a hit.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::cache_key::{CacheKey, compute_key};
use crate::core::types::Message;

/// Everything that identifies one cacheable backend call.
#[derive(Debug, Clone, Copy)]
pub struct CacheRequest<'a> {
    /// Unrendered template source (or schema name for structured calls).
    pub template_source: &'a str,
    pub args: &'a Value,
    pub model: &'a str,
    pub messages: Option<&'a [Message]>,
    /// Fully rendered request text written to the `.query` file.
    pub rendered: &'a str,
}

impl CacheRequest<'_> {
    pub fn key(&self) -> CacheKey {
        compute_key(self.template_source, self.args, self.model, self.messages)
    }
}

/// Durable, unbounded response cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the cache directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self::new(dir);
        if !cache.dir.exists() {
            fs::create_dir_all(&cache.dir)
                .with_context(|| format!("create cache dir {}", cache.dir.display()))?;
            info!(dir = %cache.dir.display(), "created cache directory");
        }
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn response_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.response_file_name())
    }

    pub fn query_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.query_file_name())
    }

    /// Load a cached response if its response file exists.
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<String>> {
        let path = self.response_path(key);
        if !path.exists() {
            return Ok(None);
        }

        debug!(path = %path.display(), "loading cached response");
        let content =
            fs::read_to_string(&path).with_context(|| format!("read cache {}", path.display()))?;
        Ok(Some(content))
    }

    /// Persist a request/response pair under `key`.
    pub fn store(&self, key: &CacheKey, request_text: &str, response_text: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;

        debug!(key = %key, "saving response to cache");
        write_atomic(&self.query_path(key), request_text)?;
        write_atomic(&self.response_path(key), response_text)?;
        Ok(())
    }

    /// Return the cached response for `request`, or compute, store and return it.
    ///
    /// `compute` is never invoked on a hit.
    pub fn get_or_compute<F>(&self, request: &CacheRequest<'_>, compute: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let key = request.key();
        if let Some(cached) = self.lookup(&key)? {
            debug!(key = %key, model = request.model, "cache hit");
            return Ok(cached);
        }

        debug!(key = %key, model = request.model, "cache miss");
        let response = compute()?;
        self.store(&key, request.rendered, &response)?;
        Ok(response)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("cache path missing file name {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp cache file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace cache file {}", path.display()))?;
    Ok(())
}
