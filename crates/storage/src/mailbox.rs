// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polled file mailbox between sessions.
//!
//! ```text
//! mailbox/<recipient>/<sent_at>-<id>.json     pending
//! mailbox/<recipient>/.<name>.claimed.<pid>   taken by one receiver
//! ```
//!
//! Delivery is at-most-once: a receiver claims a message by renaming it, and
//! only one rename can win. Messages past their TTL are dropped unread.

use crate::atomic::{write_atomic, FsWriter};
use crate::layout::{json_stems, StoreLayout};
use ctm_core::{Clock, IdGen};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),
    #[error("mailbox io: {0}")]
    Io(#[from] io::Error),
    #[error("mailbox json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub body: String,
    #[serde(rename = "sent_at")]
    pub sent_at_ms: u64,
    #[serde(rename = "ttl")]
    pub ttl_secs: u64,
}

impl Message {
    pub fn expires_at_ms(&self) -> u64 {
        self.sent_at_ms
            .saturating_add(self.ttl_secs.saturating_mul(1000))
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    fn file_name(&self) -> String {
        format!("{:013}-{}.json", self.sent_at_ms, self.id)
    }
}

fn validate_recipient(name: &str) -> Result<(), MailboxError> {
    if name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0')
    {
        return Err(MailboxError::InvalidRecipient(name.to_string()));
    }
    Ok(())
}

pub struct Mailbox<C: Clock, G: IdGen> {
    layout: StoreLayout,
    clock: C,
    ids: G,
    default_ttl: Duration,
}

impl<C: Clock, G: IdGen> Mailbox<C, G> {
    pub fn new(layout: StoreLayout, clock: C, ids: G, default_ttl: Duration) -> Self {
        Self {
            layout,
            clock,
            ids,
            default_ttl,
        }
    }

    pub fn send(
        &self,
        from: &str,
        to: &str,
        body: &str,
        ttl: Option<Duration>,
    ) -> Result<Message, MailboxError> {
        validate_recipient(to)?;
        let msg = Message {
            id: self.ids.next(),
            from: from.to_string(),
            to: to.to_string(),
            body: body.to_string(),
            sent_at_ms: self.clock.epoch_ms(),
            ttl_secs: ttl.unwrap_or(self.default_ttl).as_secs(),
        };
        let path = self.layout.inbox_dir(to).join(msg.file_name());
        write_atomic(&FsWriter, &path, &serde_json::to_vec_pretty(&msg)?)?;
        tracing::debug!(id = %msg.id, %to, "message sent");
        Ok(msg)
    }

    /// Claim, read and delete every pending message for `me`, oldest first.
    pub fn recv(&self, me: &str) -> Result<Vec<Message>, MailboxError> {
        validate_recipient(me)?;
        let dir = self.layout.inbox_dir(me);
        let now = self.clock.epoch_ms();
        let mut out = Vec::new();
        for stem in json_stems(&dir)? {
            let path = dir.join(format!("{stem}.json"));
            let Some(claimed) = claim(&dir, &path)? else {
                continue;
            };
            let parsed = read_message(&claimed);
            fs::remove_file(&claimed)?;
            match parsed {
                Ok(msg) if msg.is_expired(now) => {
                    tracing::debug!(id = %msg.id, "dropping expired message");
                }
                Ok(msg) => out.push(msg),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable message");
                }
            }
        }
        Ok(out)
    }

    /// Pending, unexpired messages for `me` without consuming them.
    pub fn peek(&self, me: &str) -> Result<Vec<Message>, MailboxError> {
        validate_recipient(me)?;
        let dir = self.layout.inbox_dir(me);
        let now = self.clock.epoch_ms();
        let mut out = Vec::new();
        for stem in json_stems(&dir)? {
            match read_message(&dir.join(format!("{stem}.json"))) {
                Ok(msg) if !msg.is_expired(now) => out.push(msg),
                Ok(_) | Err(MailboxError::Json(_)) => {}
                // Claimed by another receiver between listing and reading.
                Err(MailboxError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Delete expired messages in every inbox. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, MailboxError> {
        let root = self.layout.mailbox_dir();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let now = self.clock.epoch_ms();
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            for stem in json_stems(&dir)? {
                let path = dir.join(format!("{stem}.json"));
                let Ok(msg) = read_message(&path) else {
                    continue;
                };
                if msg.is_expired(now) && remove_if_present(&path)? {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "purged expired messages");
        }
        Ok(removed)
    }
}

fn read_message(path: &Path) -> Result<Message, MailboxError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Rename `path` to a hidden per-process name. `None` if another receiver won.
fn claim(dir: &Path, path: &Path) -> Result<Option<PathBuf>, MailboxError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let claimed = dir.join(format!(".{name}.claimed.{}", std::process::id()));
    match fs::rename(path, &claimed) {
        Ok(()) => Ok(Some(claimed)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
