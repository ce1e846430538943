//! Disk tier storage.
//!
//! Each entry is one file directly under the root, named by the lowercase
//! hex MD5 of its key, without extension. The file's mtime records the last
//! access and drives the reaper.
//!
//! Every method here blocks; the cache only calls them from its serial
//! [`DiskQueue`](super::queue::DiskQueue).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use filetime::FileTime;
use md5::{Digest, Md5};
use tracing::{debug, warn};

use super::error::CacheError;
use super::types::ReapResult;

/// File name of the disk entry for `key`.
pub fn cache_file_name(key: &str) -> String {
    format!("{:x}", Md5::digest(key.as_bytes()))
}

#[derive(Debug, Clone)]
pub(crate) struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(cache_file_name(key))
    }

    fn ensure_root(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(&self.root, e))
    }

    /// Bytes of the entry for `key`, or `None` if there is none.
    pub fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Mark the entry for `key` as accessed now.
    pub fn touch(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        filetime::set_file_mtime(&path, FileTime::now()).map_err(|e| CacheError::io(path, e))
    }

    /// Write the entry for `key`, replacing any previous one.
    ///
    /// Writes to a temporary file first so a reader never sees a partial entry.
    pub fn write(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.ensure_root()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            CacheError::io(&path, e)
        })
    }

    /// Remove the entry for `key`. Returns false if there was none.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Files directly under the root with their metadata.
    fn entries(&self) -> Result<Vec<(PathBuf, fs::Metadata)>, CacheError> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            match entry.metadata() {
                Ok(metadata) if metadata.is_file() => entries.push((entry.path(), metadata)),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping unreadable entry")
                }
            }
        }
        Ok(entries)
    }

    /// Remove every file under the root. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for (path, _) in self.entries()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
            }
        }
        debug!(removed, root = %self.root.display(), "Disk cache cleared");
        Ok(removed)
    }

    /// Remove files whose mtime is more than `max_age` before `now`.
    pub fn reap(&self, max_age: Duration, now: SystemTime) -> Result<ReapResult, CacheError> {
        let start = Instant::now();
        let mut result = ReapResult::default();

        for (path, metadata) in self.entries()? {
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "No mtime, skipping");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    result.entries_removed += 1;
                    result.bytes_freed += metadata.len();
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to reap cache file"),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// `(files, bytes)` currently on disk.
    pub fn usage(&self) -> Result<(u64, u64), CacheError> {
        let entries = self.entries()?;
        let bytes = entries.iter().map(|(_, metadata)| metadata.len()).sum();
        Ok((entries.len() as u64, bytes))
    }
}
