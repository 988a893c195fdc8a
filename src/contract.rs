//! # contract: collaborator interfaces for the regeneration pipeline
//!
//! This module defines the domain records and the three traits the batch
//! engine depends on: the persistent record store, the media-processing
//! collaborator that actually produces renditions, and the search-index
//! projection.
//!
//! ## Interface & Extensibility
//! - Implement [`RecordStore`] over any backing database; the crate ships a
//!   SQLite implementation in [`crate::store`].
//! - Implement [`DerivativeCreator`] to plug in real transcoding/resizing;
//!   the crate ships an image-crate implementation in [`crate::media`].
//! - All methods are async, returning results and using boxed error types.
//! - Error handling is uniform: collaborator errors return boxed trait
//!   objects; the batch layers translate them into their own taxonomy.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Identifier of a digital object or described item record.
pub type ObjectId = i64;

/// Identifier of a property record.
pub type PropertyId = i64;

/// Categorical role of a digital object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageClass {
    /// Original ingested copy; the root of a derivative family.
    Master,
    /// Reference display rendition.
    Reference,
    /// Thumbnail rendition.
    Thumbnail,
    /// Master whose binary lives at an external URI.
    ExternalUri,
}

impl UsageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageClass::Master => "master",
            UsageClass::Reference => "reference",
            UsageClass::Thumbnail => "thumbnail",
            UsageClass::ExternalUri => "external_uri",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "master" => Some(UsageClass::Master),
            "reference" => Some(UsageClass::Reference),
            "thumbnail" => Some(UsageClass::Thumbnail),
            "external_uri" => Some(UsageClass::ExternalUri),
            _ => None,
        }
    }
}

/// One binary asset tied to a described item.
///
/// A master has `parent_id == None`; a derivative's `parent_id` points at
/// exactly one master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalObject {
    pub id: ObjectId,
    /// The described item this object belongs to.
    pub information_object_id: ObjectId,
    pub usage: UsageClass,
    pub parent_id: Option<ObjectId>,
    /// Display name, typically the source filename.
    pub name: String,
    /// Location of the binary artifact, relative to the media root.
    pub path: PathBuf,
}

impl DigitalObject {
    pub fn is_master(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Named key/value metadata attached to a digital object. Extracted-text
/// transcripts are stored under the name "transcript".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub id: PropertyId,
    pub object_id: ObjectId,
    pub name: String,
    pub value: String,
}

/// Name of the extracted-text property deleted alongside derivatives.
pub const TRANSCRIPT_PROPERTY: &str = "transcript";

/// Nested-set position bounds of a described item; a descendant's position
/// lies within `[lft, rgt]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyBounds {
    pub lft: i64,
    pub rgt: i64,
}

/// Conjunction of selection restrictions over the master set. All present
/// fields apply as a logical AND; an empty filter selects every master.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    /// Restrict to masters whose described item falls within these bounds.
    pub bounds: Option<HierarchyBounds>,
    /// Restrict to masters with the external-URI usage classification.
    pub externals_only: bool,
    /// Restrict to masters whose id appears in this list.
    pub id_allowlist: Option<Vec<ObjectId>>,
    /// Restrict to masters with zero derivative children.
    pub missing_derivatives_only: bool,
}

/// Error type for record store operations (boxed for transport-agnosticism).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for the media-processing collaborator.
pub type DerivativeError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for the search-index collaborator.
pub type IndexError = Box<dyn std::error::Error + Send + Sync>;

/// Read/write boundary to the persistent record store.
///
/// The trait is implemented by real backends and by test mocks; the batch
/// layers never see a connection, only this interface.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List master digital-object ids satisfying the filter conjunction,
    /// ordered by id ascending and deduplicated.
    async fn list_master_ids(&self, filter: SelectionFilter)
        -> Result<Vec<ObjectId>, StoreError>;

    /// Resolve a human-readable branch key to hierarchy bounds, or `None`
    /// when no described item carries that key.
    async fn resolve_branch(&self, slug: String) -> Result<Option<HierarchyBounds>, StoreError>;

    /// Fetch a digital object by id; `None` when the record no longer exists.
    async fn get_object(&self, id: ObjectId) -> Result<Option<DigitalObject>, StoreError>;

    /// List the derivative children of a master.
    async fn list_children(&self, parent_id: ObjectId)
        -> Result<Vec<DigitalObject>, StoreError>;

    /// Delete a digital-object record outright (no tombstone).
    async fn delete_object(&self, id: ObjectId) -> Result<(), StoreError>;

    /// List the properties attached to a digital object.
    async fn list_properties(&self, object_id: ObjectId)
        -> Result<Vec<PropertyRecord>, StoreError>;

    /// Delete a single property record.
    async fn delete_property(&self, id: PropertyId) -> Result<(), StoreError>;

    /// Drop any in-process read caches so subsequent fetches observe fresh
    /// state.
    async fn clear_caches(&self);
}

/// Media-processing boundary: turns a master's binary into new derivative
/// records and artifacts.
///
/// Treated as a black box by the engine: it either succeeds, producing zero
/// or more child objects linked to the master, or fails. It may also
/// repopulate a transcript property as a side effect.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DerivativeCreator: Send + Sync {
    /// Create new derivative(s) for `master` under the given usage
    /// classification. [`UsageClass::Master`] is the sentinel requesting the
    /// full default rendition set.
    async fn create_derivatives(
        &self,
        master: DigitalObject,
        usage: UsageClass,
    ) -> Result<Vec<DigitalObject>, DerivativeError>;
}

/// Search-index projection boundary.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Persist the object in a way that also refreshes its index projection.
    /// Invoked only when the run has index updates enabled.
    async fn persist_and_index(&self, object: DigitalObject) -> Result<(), IndexError>;
}
