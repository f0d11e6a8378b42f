//! Static resource registry.
//!
//! Resources arrive with their cache validators already computed (by an
//! external scanner, or [`StaticResource::from_file`] at startup); the engine
//! only passes `Last-Modified` and `ETag` through.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};

use crate::dispatch::http_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResource {
    pub location: PathBuf,
    pub last_modified: String,
    pub etag: String,
}

impl StaticResource {
    /// Compute validators from the file's metadata. The ETag is
    /// `"<size>-<mtime secs>"` in hex unless one is supplied.
    pub fn from_file(location: impl Into<PathBuf>, etag: Option<String>) -> io::Result<Self> {
        let location = location.into();
        let meta = std::fs::metadata(&location)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", location.display()),
            ));
        }
        let modified = meta.modified()?;
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(Self {
            last_modified: http_date(DateTime::<Utc>::from(modified)),
            etag: etag.unwrap_or_else(|| format!("\"{:x}-{:x}\"", meta.len(), secs)),
            location,
        })
    }
}

pub trait StaticResourceRegistry: Send + Sync {
    fn lookup(&self, path: &str) -> Option<&StaticResource>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticFiles {
    map: HashMap<String, StaticResource>,
}

impl StaticFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, resource: StaticResource) {
        self.map.insert(path.into(), resource);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl StaticResourceRegistry for StaticFiles {
    fn lookup(&self, path: &str) -> Option<&StaticResource> {
        self.map.get(path)
    }
}

/// Content type by file extension; `application/octet-stream` otherwise.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
