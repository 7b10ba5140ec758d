//! Backup command.

use crate::cli::{context, output};
use crate::core::backup::BackupEngine;
use crate::core::compose::ComposeRunner;
use crate::core::lock::CommandLock;
use crate::error::Result;

/// Create one backup archive and report the result.
pub fn execute() -> Result<()> {
    let (settings, env) = context()?;
    let _lock = CommandLock::acquire(&settings)?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    let engine = BackupEngine::new(&settings, &env, &runner);

    output::section("Backup");
    output::progress("Creating archive");
    let archive = engine.create_backup()?;
    output::progress_done(true);

    output::success(&format!("backup created: {}", archive.name));
    output::kv("archive", output::path(&archive.path.display().to_string()));
    output::kv("retention", format!("{} days", settings.retention_days));
    if archive.partial {
        output::warn("archive is partial: one or more volume snapshots failed (see log)");
    }
    Ok(())
}
