use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::contract::{ObjectId, StoreError};

/// Fatal scoping failures: surfaced before any mutation occurs and abort the
/// whole run with exit status 1.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("no described item found for branch key \"{slug}\"")]
    BranchNotFound { slug: String },

    #[error("failed to read id file {}: {source}", path.display())]
    IdFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("id file {} is not a JSON list of ids: {source}", path.display())]
    IdFileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("record store query failed: {0}")]
    Store(StoreError),

    #[error("confirmation prompt i/o failed: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Phase of the per-item delete-then-recreate sequence. Carried in
/// [`ItemError`] so a failure names exactly how far the item got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Deleting stale derivatives and transcript properties.
    Deleting,
    /// Invoking the media-processing collaborator.
    Invoking,
    /// Persisting the master with a search-index refresh.
    Indexing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Deleting => "deleting stale derivatives",
            Phase::Invoking => "invoking the media processor",
            Phase::Indexing => "updating the search index",
        };
        f.write_str(s)
    }
}

/// A failure while regenerating one item. Recovered at the batch-runner
/// level: logged in full, the item is abandoned, and the loop continues.
#[derive(Debug, Error)]
#[error("regeneration of object {object_id} failed while {phase}: {source}")]
pub struct ItemError {
    pub object_id: ObjectId,
    pub phase: Phase,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}
