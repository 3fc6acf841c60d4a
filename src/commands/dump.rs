// ABOUTME: Dump commands writing the database to one file or a directory of table files
// ABOUTME: Shows a per-table progress bar while logging is silenced

use crate::config::Options;
use crate::db::Database;
use crate::serialization::{DumpSummary, Serializer};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Dump every table into the single file at `path`
pub fn dump(db: &dyn Database, options: Options, path: &Path) -> Result<DumpSummary> {
    let progress = progress_bar(options.quiet);
    let summary = Serializer::new(db, options)
        .with_progress(progress.clone())
        .dump(path)?;
    progress.finish_and_clear();

    report(&summary, &path.display().to_string());
    Ok(summary)
}

/// Dump every non-empty table into its own file under `dir`
pub fn dump_dir(db: &dyn Database, options: Options, dir: &Path) -> Result<DumpSummary> {
    let progress = progress_bar(options.quiet);
    let summary = Serializer::new(db, options)
        .with_progress(progress.clone())
        .dump_to_dir(dir)?;
    progress.finish_and_clear();

    report(&summary, &dir.display().to_string());
    Ok(summary)
}

/// A visible bar only when logging is silenced; otherwise log lines carry progress
fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        progress.set_style(style.progress_chars("##-"));
    }
    progress
}

fn report(summary: &DumpSummary, destination: &str) {
    println!(
        "✓ Dumped {} rows from {} table(s) to {} ({} empty table(s) skipped)",
        summary.rows, summary.tables_dumped, destination, summary.tables_skipped
    );
}
