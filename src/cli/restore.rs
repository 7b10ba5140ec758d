//! Restore command.
//!
//! Collects the two confirmations the engine requires: one for the chosen
//! archive, one acknowledging data loss. Both prompts are separate on
//! purpose; an operator can pick the right archive and still back out.

use dialoguer::Confirm;

use crate::cli::{context, output};
use crate::core::backup::{ArchiveRef, BackupEngine};
use crate::core::compose::ComposeRunner;
use crate::core::lock::CommandLock;
use crate::core::restore::{ClassOutcome, RestoreEngine, RestorePlan};
use crate::error::{Error, Result, RestoreError};

/// Run a restore.
///
/// Confirmations come from the flags or, on a TTY, from interactive
/// prompts. A non-interactive invocation without both flags is refused.
pub fn execute(
    archive_name: Option<&str>,
    confirm_archive: bool,
    acknowledge_data_loss: bool,
    restore_env: bool,
) -> Result<()> {
    let (settings, env) = context()?;
    let _lock = CommandLock::acquire(&settings)?;
    let runner = ComposeRunner::new(&settings.project_root)?;

    let backups = BackupEngine::new(&settings, &env, &runner);
    let archive = select_archive(&backups, archive_name)?;

    output::section("Restore");
    output::kv("archive", &archive.name);
    if let Some(captured) = archive.captured_at() {
        output::kv("captured", captured.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }

    let plan = build_plan(&archive, confirm_archive, acknowledge_data_loss, restore_env)?;

    let engine = RestoreEngine::new(&settings, &env, &runner);
    let report = engine.restore(&archive, &plan)?;

    output::section("Result");
    report_class("database", &report.database);
    report_class("cache", &report.cache);
    report_class("object store", &report.objects);
    report_class("configuration", &report.config);

    if report.database_failed() {
        return Err(RestoreError::Failed(
            "database replay failed; the database may be partially restored".to_string(),
        )
        .into());
    }

    println!();
    output::success("restore complete");
    Ok(())
}

fn select_archive(backups: &BackupEngine, name: Option<&str>) -> Result<ArchiveRef> {
    let mut archives = backups.list_archives()?;
    if archives.is_empty() {
        return Err(Error::InvalidSelection(
            "no backup archives available".to_string(),
        ));
    }

    if let Some(name) = name {
        return archives
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::InvalidSelection(format!("no such archive: {}", name)));
    }

    if !atty::is(atty::Stream::Stdin) {
        return Err(Error::InvalidSelection(
            "specify an archive name when running non-interactively".to_string(),
        ));
    }

    // newest first
    archives.reverse();
    let names: Vec<&str> = archives.iter().map(|a| a.name.as_str()).collect();
    let choice = dialoguer::Select::new()
        .with_prompt("Select archive to restore")
        .items(&names)
        .default(0)
        .interact()?;
    Ok(archives.swap_remove(choice))
}

fn build_plan(
    archive: &ArchiveRef,
    confirm_archive: bool,
    acknowledge_data_loss: bool,
    restore_env: bool,
) -> Result<RestorePlan> {
    let interactive = atty::is(atty::Stream::Stdin);

    let archive_confirmed = confirm_archive
        || (interactive
            && Confirm::new()
                .with_prompt(format!("Restore from {}?", archive.name))
                .default(false)
                .interact()?);

    let data_loss_acknowledged = acknowledge_data_loss
        || (interactive
            && archive_confirmed
            && Confirm::new()
                .with_prompt("This overwrites current data; anything not backed up is lost. Continue?")
                .default(false)
                .interact()?);

    let restore_env = restore_env
        || (interactive
            && data_loss_acknowledged
            && Confirm::new()
                .with_prompt("Also overwrite the environment configuration from the archive?")
                .default(false)
                .interact()?);

    Ok(RestorePlan {
        archive_confirmed,
        data_loss_acknowledged,
        restore_env,
    })
}

fn report_class(label: &str, outcome: &ClassOutcome) {
    match outcome {
        ClassOutcome::Restored => output::kv(label, "restored"),
        ClassOutcome::Skipped => output::kv(label, "skipped"),
        ClassOutcome::Failed(err) => output::warn(&format!("{} failed: {}", label, err)),
    }
}
