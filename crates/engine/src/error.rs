// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the task manager

use ctm_core::{ConfigError, GraphError};
use ctm_storage::{CheckpointError, MailboxError, RepoError};
use thiserror::Error;

/// Errors surfaced by [`crate::TaskManager`] operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Invalid(String),
    #[error("no active agent in lane '{0}'")]
    NoActive(String),
}

impl EngineError {
    /// Caller-side mistakes (bad input, missing referents, cycles), as opposed
    /// to storage or I/O failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Invalid(_)
                | EngineError::Graph(_)
                | EngineError::Repo(
                    RepoError::NotFound(_) | RepoError::Ambiguous { .. } | RepoError::Invalid { .. }
                )
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Repo(RepoError::NotFound(_)) | EngineError::Checkpoint(CheckpointError::NotFound(_))
        )
    }
}
