// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable atomic file replacement.
//!
//! ```text
//! write <file>.tmp.<pid> ─► fsync tmp ─► rename over <file> ─► fsync dir
//! ```
//!
//! Readers see either the old or the new content, never a torn write. The
//! temp name carries the pid so concurrent processes never share one.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File operations behind an atomic write, abstracted for fault injection.
pub trait DocWriter: Clone + Send + Sync + 'static {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    fn fsync_file(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn fsync_dir(&self, path: &Path) -> io::Result<()>;
}

/// Production writer using real filesystem operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl DocWriter for FsWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> io::Result<()> {
        File::open(path)?.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn fsync_dir(&self, path: &Path) -> io::Result<()> {
        fsync_dir(path)
    }
}

/// Per-process temp path next to `path`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

/// Replace `path` with `data` atomically and durably.
///
/// On failure the temp file is removed and `path` is left as it was.
pub fn write_atomic<W: DocWriter>(writer: &W, path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);
    let result = writer
        .write_tmp(&tmp, data)
        .and_then(|()| writer.fsync_file(&tmp))
        .and_then(|()| writer.rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Some(parent) = path.parent() {
        writer.fsync_dir(parent)?;
    }
    Ok(())
}

pub(crate) fn fsync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
