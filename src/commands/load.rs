// ABOUTME: Load commands replaying a dump file or directory into the database
// ABOUTME: Asks for confirmation before truncating tables unless told not to

use crate::config::Options;
use crate::db::Database;
use crate::serialization::{LoadSummary, Serializer};
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::Path;

/// Load the dump file at `path`.
///
/// # Arguments
///
/// * `truncate` - Empty each table before loading its rows
/// * `yes` - Skip the confirmation prompt shown before truncating
pub fn load(
    db: &dyn Database,
    options: Options,
    path: &Path,
    truncate: bool,
    yes: bool,
) -> Result<LoadSummary> {
    confirm_truncate(truncate, yes)?;
    let summary = Serializer::new(db, options).load(path, truncate)?;
    report(&summary, &path.display().to_string());
    Ok(summary)
}

/// Load every file of the dump directory `dir`
pub fn load_dir(
    db: &dyn Database,
    options: Options,
    dir: &Path,
    truncate: bool,
    yes: bool,
) -> Result<LoadSummary> {
    confirm_truncate(truncate, yes)?;
    let summary = Serializer::new(db, options).load_from_dir(dir, truncate)?;
    report(&summary, &dir.display().to_string());
    Ok(summary)
}

fn confirm_truncate(truncate: bool, yes: bool) -> Result<()> {
    if !truncate || yes {
        return Ok(());
    }

    let proceed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Existing rows in every loaded table will be deleted. Continue?")
        .default(false)
        .interact()
        .context("Failed to get truncate confirmation")?;
    if !proceed {
        bail!("Load cancelled by user");
    }
    Ok(())
}

fn report(summary: &LoadSummary, source: &str) {
    println!(
        "✓ Loaded {} rows into {} table(s) from {}",
        summary.rows,
        summary.tables.len(),
        source
    );
}
