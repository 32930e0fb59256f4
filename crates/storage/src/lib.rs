// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for ctm: versioned documents, the agent repository,
//! checkpoints, working-memory tiers and the mailbox.

mod atomic;
mod checkpoint;
mod index;
mod layout;
mod mailbox;
mod patch;
mod repository;
mod tiers;
mod versioned;

pub use atomic::{tmp_path, write_atomic, DocWriter, FsWriter};
pub use checkpoint::{
    checkpoint_stamp, CheckpointError, CheckpointInfo, CheckpointManager, CheckpointSelector,
    Manifest, RestoreReport,
};
pub use index::{AgentIndex, IndexEntry};
pub use layout::StoreLayout;
pub use mailbox::{Mailbox, MailboxError, Message};
pub use patch::{apply_patch, AgentPatch, Change, PatchError};
pub use repository::{
    AgentFilter, AgentRepository, CorruptDoc, Mutation, RepoError, ScanReport, Switched,
};
pub use tiers::{
    estimate_tokens, ColdSummary, Demotion, Tier, TierStats, TierUsage, WorkingMemory,
};
pub use versioned::{RetryPolicy, Stamp, StoreError, StoreGate, Versioned, VersionedStore};
