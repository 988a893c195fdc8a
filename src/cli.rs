use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use crate::index::NullIndex;
use crate::media::ImageDerivativeCreator;
use crate::run::{run_batch, RunOptions, RunOutcome};
use crate::scope::{DerivativeKind, ScopeSpec};
use crate::store::SqliteStore;

/// CLI for regen-derivatives: regenerate digital object derivatives from
/// their master copies.
#[derive(Parser)]
#[clap(
    name = "regen-derivatives",
    version,
    about = "Regenerates digital object derivatives (reference renditions, thumbnails) from master copies"
)]
pub struct Cli {
    /// Restrict the run to the descendants of this described-item key
    #[clap(long, short = 'l')]
    pub slug: Option<String>,

    /// Derivative type to regenerate; omit to regenerate the full set
    #[clap(long = "type", short = 'd', value_enum)]
    pub derivative_type: Option<DerivativeKind>,

    /// Update the search index per item (defaults to off)
    #[clap(long, short = 'i')]
    pub index: bool,

    /// No confirmation message
    #[clap(long, short = 'f')]
    pub force: bool,

    /// Only external objects
    #[clap(long, short = 'o')]
    pub only_externals: bool,

    /// Limit the run to the ids in this JSON file
    #[clap(long, short = 'j')]
    pub json: Option<PathBuf>,

    /// Skip items until this filename is encountered, then resume with it
    #[clap(long)]
    pub skip_to: Option<String>,

    /// Don't overwrite existing derivatives (and no confirmation message)
    #[clap(long, short = 'n')]
    pub no_overwrite: bool,

    /// Path to the repository database
    #[clap(long, default_value = "repository.db")]
    pub database: PathBuf,

    /// Root directory holding master and derivative binaries
    #[clap(long, default_value = "media")]
    pub media_dir: PathBuf,
}

impl Cli {
    pub fn into_options(self) -> (RunOptions, PathBuf, PathBuf) {
        let scope = ScopeSpec {
            branch_root: self.slug,
            externals_only: self.only_externals,
            id_file: self.json,
            missing_derivatives_only: self.no_overwrite,
            kind: self.derivative_type,
            resume_after: self.skip_to,
        };
        let options = RunOptions {
            scope,
            update_index: self.index,
            force: self.force,
        };
        (options, self.database, self.media_dir)
    }
}

/// Extracted CLI logic entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<RunOutcome> {
    let (options, database, media_dir) = cli.into_options();

    let store = Arc::new(
        SqliteStore::open(&database)
            .map_err(|e| anyhow::anyhow!("cannot open repository database: {e}"))?,
    );
    let creator = ImageDerivativeCreator::new(store.clone(), media_dir);
    let index = NullIndex;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let outcome = run_batch(&options, &*store, &creator, &index, &mut input, &mut output).await?;

    match &outcome {
        RunOutcome::Completed(report) => {
            println!(
                "Regenerated derivatives for {} object(s), {} failed, {} skipped",
                report.processed.len(),
                report.failed.len(),
                report.skipped
            );
            for failure in &report.failed {
                eprintln!("[ERROR] {} ({}): {}", failure.name, failure.id, failure.error);
            }
        }
        RunOutcome::Declined => {}
    }

    Ok(outcome)
}
