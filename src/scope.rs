use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::contract::UsageClass;

/// Which derivative usage class to produce. Absent means the master-class
/// sentinel: regenerate the full default rendition set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum DerivativeKind {
    Reference,
    Thumbnail,
}

impl DerivativeKind {
    /// Map the requested kind to a usage classification; `None` maps to the
    /// [`UsageClass::Master`] sentinel covering all kinds.
    pub fn to_usage(kind: Option<DerivativeKind>) -> UsageClass {
        match kind {
            Some(DerivativeKind::Reference) => UsageClass::Reference,
            Some(DerivativeKind::Thumbnail) => UsageClass::Thumbnail,
            None => UsageClass::Master,
        }
    }
}

/// The options that define "which masters, which derivative kind, where to
/// resume" for one run. Immutable once the run starts; all filters combine
/// conjunctively.
#[derive(Debug, Clone, Default)]
pub struct ScopeSpec {
    /// Described-item key restricting selection to that item's descendants
    /// (inclusive of the item itself).
    pub branch_root: Option<String>,
    /// Restrict to masters with the external-URI usage classification.
    pub externals_only: bool,
    /// Path to a JSON file containing an explicit list of master ids.
    pub id_file: Option<PathBuf>,
    /// Restrict to masters that currently have no derivative children.
    pub missing_derivatives_only: bool,
    /// Derivative kind to produce; `None` regenerates the full default set.
    pub kind: Option<DerivativeKind>,
    /// Display name to resume after: items are skipped until this exact name
    /// is seen, and processing restarts with the matching item itself.
    pub resume_after: Option<String>,
}

impl ScopeSpec {
    pub fn trace_loaded(&self) {
        info!(
            branch_root = self.branch_root.as_deref().unwrap_or("<all>"),
            externals_only = self.externals_only,
            id_file = ?self.id_file,
            missing_derivatives_only = self.missing_derivatives_only,
            kind = ?self.kind,
            resume_after = self.resume_after.as_deref().unwrap_or("<none>"),
            "Loaded scope specification"
        );
    }
}
