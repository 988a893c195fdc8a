//! Confirmation Gate: renders a human-readable description of the
//! destructive scope and blocks for an interactive yes/no answer.
//!
//! The prompt reads from and writes to generic handles so tests can drive it
//! without a terminal. Empty input declines; only `y`/`yes`
//! (case-insensitive) proceeds.

use std::io::{self, BufRead, Write};

use tracing::info;

use crate::scope::{DerivativeKind, ScopeSpec};

/// Column at which the scope sentence wraps.
const WRAP_WIDTH: usize = 75;

/// Ask the operator to confirm the destructive run. Returns `true` to
/// proceed. `bypass` short-circuits without rendering anything.
pub fn confirm<R, W>(
    scope: &ScopeSpec,
    bypass: bool,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    if bypass {
        return Ok(true);
    }

    for line in render_prompt(scope) {
        writeln!(output, "{line}")?;
    }
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        return Ok(true);
    }

    writeln!(output, "Bye!")?;
    info!("Operator declined confirmation");
    Ok(false)
}

/// Render the full confirmation message, one entry per output line.
pub fn render_prompt(scope: &ScopeSpec) -> Vec<String> {
    let clauses = scope_clauses(scope);

    let mut lines = if clauses.is_empty() {
        vec!["Continuing will regenerate the derivatives for ALL digital objects".to_string()]
    } else {
        let sentence = format!("Continuing will regenerate all {}", clauses.join(", "));
        wrap(&sentence, WRAP_WIDTH)
    };

    lines.push(String::new());
    lines.push("This will PERMANENTLY DELETE existing derivatives you chose to regenerate".into());
    lines.push(String::new());
    lines.push("Continue? (y/N)".into());
    lines
}

/// One clause per active filter, in a fixed order.
fn scope_clauses(scope: &ScopeSpec) -> Vec<String> {
    let mut clauses = Vec::new();

    if scope.externals_only {
        clauses.push("external".to_string());
    }

    clauses.push(
        match scope.kind {
            Some(DerivativeKind::Thumbnail) => "thumbnails",
            Some(DerivativeKind::Reference) => "reference derivatives",
            None => "derivatives",
        }
        .to_string(),
    );

    if let Some(root) = &scope.branch_root {
        clauses.push(format!("that are descendants of \"{root}\""));
    }

    if let Some(path) = &scope.id_file {
        clauses.push(format!("with ids in file \"{}\"", path.display()));
    }

    if let Some(name) = &scope.resume_after {
        clauses.push(format!("coming after \"{name}\""));
    }

    // The kind clause alone does not narrow the scope; a bare "derivatives"
    // with nothing else means the generic ALL warning applies instead.
    if clauses.len() == 1 && scope.kind.is_none() {
        clauses.clear();
    }

    clauses
}

/// Greedy word wrap at `width` columns; words longer than the width land on
/// their own line untruncated.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
