// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optimistic-concurrency store over a single JSON document.
//!
//! Every document carries `_version`, `_last_modified` and `_modified_by`
//! next to its body. A write names the version it expects to replace; a
//! mismatch returns [`StoreError::VersionConflict`] and the file is never
//! touched. Version 0 means "does not exist yet".
//!
//! The compare-and-rename window is serialized across processes by a
//! non-blocking advisory lock on `<doc>.lock`. A writer that cannot take the
//! lock immediately reports a conflict instead of waiting. Operations that
//! span several documents hold a [`StoreGate`] instead, which waits.

use crate::atomic::{write_atomic, DocWriter, FsWriter};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on {}: expected {expected}, found {}", path.display(), render_found(*found))]
    VersionConflict {
        path: PathBuf,
        expected: u64,
        /// `None` when another writer held the document lock.
        found: Option<u64>,
    },
    #[error("document not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("corrupt document {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn render_found(found: Option<u64>) -> String {
    match found {
        Some(v) => v.to_string(),
        None => "a concurrent writer".to_string(),
    }
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// A document body with its version metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(rename = "_last_modified")]
    pub last_modified_ms: u64,
    #[serde(rename = "_modified_by")]
    pub modified_by: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> AsRef<T> for Versioned<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

/// Borrowed form of [`Versioned`] for serializing without cloning the body.
#[derive(Serialize)]
struct VersionedRef<'a, T> {
    #[serde(rename = "_version")]
    version: u64,
    #[serde(rename = "_last_modified")]
    last_modified_ms: u64,
    #[serde(rename = "_modified_by")]
    modified_by: &'a str,
    #[serde(flatten)]
    data: &'a T,
}

/// Reads only the version of a document whose body may not parse.
#[derive(Deserialize)]
struct VersionProbe {
    #[serde(rename = "_version", default)]
    version: u64,
}

/// Who is writing and when.
#[derive(Debug, Clone, Copy)]
pub struct Stamp<'a> {
    pub by: &'a str,
    pub at_ms: u64,
}

/// Bounded retry with exponential backoff for [`VersionedStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No retries; the first conflict is surfaced.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before `attempt` (1-based; the first attempt does not wait).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff
            .saturating_mul(1u32 << (attempt - 2).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10))
    }
}

impl From<&ctm_core::StoreConfig> for RetryPolicy {
    fn from(cfg: &ctm_core::StoreConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_millis(cfg.backoff_ms))
    }
}

/// Exclusive advisory lock on a document's `.lock` sidecar.
struct DocLock {
    file: File,
}

impl DocLock {
    /// Take the lock without blocking. `Ok(None)` when another writer holds it.
    fn try_acquire(doc: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(doc))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for DocLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Store-wide exclusive lock held across a multi-document operation.
///
/// Blocks until granted and releases on drop.
pub struct StoreGate {
    _lock: DocLock,
    path: PathBuf,
}

impl StoreGate {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        debug!(gate = %path.display(), "gate acquired");
        Ok(Self {
            _lock: DocLock { file },
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn lock_path(doc: &Path) -> PathBuf {
    let mut name = doc.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    doc.with_file_name(name)
}

/// Versioned access to the document at one path.
pub struct VersionedStore<T, W = FsWriter> {
    path: PathBuf,
    writer: W,
    _doc: PhantomData<fn() -> T>,
}

impl<T> VersionedStore<T, FsWriter> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_writer(path, FsWriter)
    }
}

impl<T, W> VersionedStore<T, W> {
    pub fn with_writer(path: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            path: path.into(),
            writer,
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl<T, W> VersionedStore<T, W>
where
    T: Serialize + DeserializeOwned,
    W: DocWriter,
{
    /// Read the document; [`StoreError::NotFound`] if it does not exist.
    pub fn read(&self) -> Result<Versioned<T>, StoreError> {
        self.read_optional()?.ok_or_else(|| StoreError::NotFound {
            path: self.path.clone(),
        })
    }

    pub fn read_optional(&self) -> Result<Option<Versioned<T>>, StoreError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| self.corrupt(e))
    }

    /// Version on disk, 0 when absent.
    pub fn current_version(&self) -> Result<u64, StoreError> {
        match self.read_bytes()? {
            None => Ok(0),
            Some(bytes) => serde_json::from_slice::<VersionProbe>(&bytes)
                .map(|probe| probe.version)
                .map_err(|e| self.corrupt(e)),
        }
    }

    /// Write `data` if the on-disk version equals `expected`. Returns the new version.
    pub fn write(&self, data: &T, expected: u64, stamp: Stamp<'_>) -> Result<u64, StoreError> {
        let _lock = self.lock(expected)?;
        let found = self.current_version()?;
        if found != expected {
            return Err(StoreError::VersionConflict {
                path: self.path.clone(),
                expected,
                found: Some(found),
            });
        }
        let version = expected + 1;
        self.commit(data, version, stamp)?;
        debug!(path = %self.path.display(), version, "document written");
        Ok(version)
    }

    /// Overwrite regardless of the current version, keeping versions monotonic.
    ///
    /// The new version is `max(on_disk, floor) + 1`. An unreadable document
    /// has no version of its own, so callers pass the highest version they
    /// know it reached as `floor`. Used by repair and index rebuilds only.
    pub fn force_replace(&self, data: &T, floor: u64, stamp: Stamp<'_>) -> Result<u64, StoreError> {
        let _lock = self.lock(floor)?;
        let on_disk = self.current_version().unwrap_or(0);
        let version = on_disk.max(floor) + 1;
        self.commit(data, version, stamp)?;
        debug!(path = %self.path.display(), version, "document force-replaced");
        Ok(version)
    }

    /// Read, transform and write back, retrying version conflicts.
    ///
    /// The transform runs against a fresh read on every attempt. When it
    /// leaves the body unchanged nothing is written and the current document
    /// is returned as-is.
    pub fn update<R, E, F>(
        &self,
        retry: &RetryPolicy,
        stamp: Stamp<'_>,
        mut transform: F,
    ) -> Result<(Versioned<T>, R), E>
    where
        T: PartialEq + Clone,
        E: From<StoreError>,
        F: FnMut(&mut T) -> Result<R, E>,
    {
        let mut attempt = 1;
        loop {
            let current = self.read()?;
            let mut next = current.data.clone();
            let out = transform(&mut next)?;
            if next == current.data {
                return Ok((current, out));
            }
            match self.write(&next, current.version, stamp) {
                Ok(version) => {
                    let doc = Versioned {
                        version,
                        last_modified_ms: stamp.at_ms,
                        modified_by: stamp.by.to_string(),
                        data: next,
                    };
                    return Ok((doc, out));
                }
                Err(e) if e.is_conflict() && attempt < retry.max_attempts => {
                    attempt += 1;
                    debug!(path = %self.path.display(), attempt, "version conflict, retrying");
                    std::thread::sleep(retry.delay(attempt));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn lock(&self, expected: u64) -> Result<DocLock, StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        DocLock::try_acquire(&self.path)?.ok_or_else(|| StoreError::VersionConflict {
            path: self.path.clone(),
            expected,
            found: None,
        })
    }

    fn commit(&self, data: &T, version: u64, stamp: Stamp<'_>) -> Result<(), StoreError> {
        let doc = VersionedRef {
            version,
            last_modified_ms: stamp.at_ms,
            modified_by: stamp.by,
            data,
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.writer, &self.path, &bytes)?;
        Ok(())
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, e: serde_json::Error) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "versioned_tests.rs"]
mod tests;
