//! Batch Runner: drives the full scoped regeneration run to completion.
//!
//! This module provides the top-level orchestration for one run:
//!   - Obtains operator consent through the confirmation gate
//!   - Selects the ordered candidate list of master ids
//!   - Iterates strictly sequentially, applying resume/skip logic
//!   - Delegates each item to the regeneration engine, isolating failures
//!   - Emits per-item progress and a post-run index-freshness reminder
//!
//! # Failure semantics
//! A declined confirmation and fatal scope errors abort the run before any
//! mutation; every per-item failure is caught here, logged in full, and the
//! loop continues. The run reaching Done means exit status 0 regardless of
//! how many items failed.
//!
//! # Navigation
//! - Main entrypoint: [`run_batch`]
//! - Supporting types: [`RunOptions`], [`RunOutcome`], [`RunReport`].

use std::io::{BufRead, Write};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::confirm::confirm;
use crate::contract::{DerivativeCreator, ObjectId, RecordStore, SearchIndex};
use crate::error::ScopeError;
use crate::regenerate::regenerate;
use crate::scope::ScopeSpec;
use crate::select::select_masters;

/// Options for one run, resolved once from the CLI surface and immutable
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub scope: ScopeSpec,
    /// Persist-with-reindex after each item. Off by default to avoid
    /// expensive per-item reindexing.
    pub update_index: bool,
    /// Bypass the confirmation gate.
    pub force: bool,
}

impl RunOptions {
    /// The confirmation gate is bypassed for forced runs and for
    /// missing-derivatives-only runs, which never delete anything that
    /// exists.
    pub fn bypass_confirmation(&self) -> bool {
        self.force || self.scope.missing_derivatives_only
    }
}

/// How one run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run reached Done; exit status 0 even when items failed.
    Completed(RunReport),
    /// The operator declined confirmation; no mutation occurred, exit 1.
    Declined,
}

/// Tally of what the iteration did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: Vec<ItemReport>,
    pub failed: Vec<ItemFailure>,
    /// Items skipped by the resume marker or dangling references.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ItemReport {
    pub id: ObjectId,
    pub name: String,
    pub derivatives_created: usize,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub id: ObjectId,
    pub name: String,
    pub error: String,
}

/// Drive one full regeneration run.
pub async fn run_batch<S, C, I, R, W>(
    options: &RunOptions,
    store: &S,
    creator: &C,
    index: &I,
    prompt_in: &mut R,
    prompt_out: &mut W,
) -> Result<RunOutcome, ScopeError>
where
    S: RecordStore,
    C: DerivativeCreator,
    I: SearchIndex,
    R: BufRead,
    W: Write,
{
    options.scope.trace_loaded();
    info!(update_index = options.update_index, "Starting derivative regeneration run");

    // Confirm before touching the store.
    let proceed = confirm(
        &options.scope,
        options.bypass_confirmation(),
        prompt_in,
        prompt_out,
    )
    .map_err(ScopeError::Prompt)?;
    if !proceed {
        return Ok(RunOutcome::Declined);
    }

    let ids = select_masters(store, &options.scope).await?;

    let timer = Instant::now();
    let mut report = RunReport::default();
    // Resume marker: skip until the named item, then process it and its
    // successors (the marker item is inclusive).
    let mut skipping = options.scope.resume_after.is_some();

    for id in ids {
        let object = match store.get_object(id).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                // Dangling reference: selected id no longer resolves.
                debug!(id, "Selected id no longer resolves to a live object, skipping");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(id, error = %e, "Failed to resolve object, continuing");
                report.failed.push(ItemFailure {
                    id,
                    name: "<unresolved>".into(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        if skipping {
            // resume_after is always Some while the skipping flag holds.
            let marker = options.scope.resume_after.as_deref().unwrap_or_default();
            if object.name != marker {
                info!(name = %object.name, "Skipping");
                report.skipped += 1;
                continue;
            }
            skipping = false;
        }

        info!(
            name = %object.name,
            elapsed_s = format!("{:.1}", timer.elapsed().as_secs_f64()),
            "Regenerating derivatives"
        );

        match regenerate(
            store,
            creator,
            index,
            &object,
            options.scope.kind,
            options.update_index,
        )
        .await
        {
            Ok(outcome) => {
                report.processed.push(ItemReport {
                    id: object.id,
                    name: object.name.clone(),
                    derivatives_created: outcome.derivatives_created,
                });
            }
            Err(e) => {
                error!(id = object.id, name = %object.name, error = %e, "Item failed, continuing");
                report.failed.push(ItemFailure {
                    id: object.id,
                    name: object.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if !options.update_index {
        info!("Please update the search index manually to reflect any changes");
    }
    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        skipped = report.skipped,
        "Done!"
    );

    Ok(RunOutcome::Completed(report))
}
