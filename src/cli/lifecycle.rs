//! Service lifecycle commands.
//!
//! install, start, stop, restart, status, logs, and upgrade.

use std::time::Duration;

use tracing::info;

use crate::cli::{context, output};
use crate::core::compose::{wait_for_service_ready, ComposeRunner, Orchestrator};
use crate::core::configure::auto_configure;
use crate::core::lock::CommandLock;
use crate::core::migrate::{MigrationRunner, StepOutcome};
use crate::error::Result;

/// First-time setup.
///
/// Seeds the environment document from its template, generates missing
/// secrets, starts everything, and initializes the database.
pub fn install() -> Result<()> {
    let (settings, mut env) = context()?;
    let _lock = CommandLock::acquire(&settings)?;
    let runner = ComposeRunner::new(&settings.project_root)?;

    output::section("Install");

    let domain = env.get_or("DOMAIN", "localhost");
    output::progress("Configuring secrets and URLs");
    let summary = auto_configure(&mut env, &domain);
    env.save()?;
    output::progress_done(true);
    if !summary.generated.is_empty() {
        output::dimmed(&format!(
            "  generated {} secret(s)",
            summary.generated.len()
        ));
    }

    output::progress("Pulling images");
    runner.pull()?;
    output::progress_done(true);

    output::progress("Starting services");
    runner.start(&[], &[])?;
    output::progress_done(true);

    let user = env.get_or("POSTGRES_USER", "postgres");
    output::progress("Waiting for database");
    wait_for_service_ready(
        &runner,
        "postgres",
        &["pg_isready", "-U", &user],
        Duration::from_secs(60),
    )?;
    output::progress_done(true);

    let migrator = MigrationRunner::new(&settings, &env, &runner);
    output::progress("Initializing database");
    let init = migrator.initialize()?;
    output::progress_done(!init.iter().any(|(_, o)| matches!(o, StepOutcome::Failed(_))));
    report_steps(&init);

    output::progress("Applying migrations");
    let applied = migrator.apply_pending()?;
    output::progress_done(!applied.iter().any(|(_, o)| matches!(o, StepOutcome::Failed(_))));
    report_steps(&applied);

    println!();
    output::success("install complete");
    output::hint(&format!("run {} to check the stack", output::cmd("dockhand status")));
    Ok(())
}

/// Start services under the given profiles.
pub fn start(profiles: &[String]) -> Result<()> {
    let (settings, _env) = context()?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    let profiles: Vec<&str> = profiles.iter().map(String::as_str).collect();
    runner.start(&[], &profiles)?;
    output::success("services started");
    Ok(())
}

/// Stop services under the given profiles.
pub fn stop(profiles: &[String]) -> Result<()> {
    let (settings, _env) = context()?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    let profiles: Vec<&str> = profiles.iter().map(String::as_str).collect();
    runner.stop(&profiles)?;
    output::success("services stopped");
    Ok(())
}

/// Restart one service, or everything.
pub fn restart(service: Option<&str>) -> Result<()> {
    let (settings, _env) = context()?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    match service {
        Some(service) => {
            runner.restart(service)?;
            output::success(&format!("restarted {}", service));
        }
        None => {
            runner.stop(&[])?;
            runner.start(&[], &[])?;
            output::success("all services restarted");
        }
    }
    Ok(())
}

/// Show service status.
pub fn status(json: bool) -> Result<()> {
    let (settings, _env) = context()?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    let states = runner.status()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&states).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }

    output::section("Services");
    if states.is_empty() {
        output::dimmed("no services running");
        return Ok(());
    }
    for state in states {
        let detail = match &state.health {
            Some(health) => format!("{} ({})", state.state, health),
            None => state.state.clone(),
        };
        output::kv(&state.name, detail);
    }
    Ok(())
}

/// Print the tail of a service's logs.
pub fn logs(service: &str, tail: usize) -> Result<()> {
    let (settings, _env) = context()?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    print!("{}", runner.logs(service, Some(tail))?);
    Ok(())
}

/// Pull newer images, restart, and apply pending migrations.
pub fn upgrade() -> Result<()> {
    let (settings, env) = context()?;
    let _lock = CommandLock::acquire(&settings)?;
    let runner = ComposeRunner::new(&settings.project_root)?;

    output::section("Upgrade");

    output::progress("Pulling images");
    runner.pull()?;
    output::progress_done(true);

    output::progress("Restarting services");
    runner.start(&[], &[])?;
    output::progress_done(true);

    let user = env.get_or("POSTGRES_USER", "postgres");
    wait_for_service_ready(
        &runner,
        "postgres",
        &["pg_isready", "-U", &user],
        Duration::from_secs(60),
    )?;

    let migrator = MigrationRunner::new(&settings, &env, &runner);
    output::progress("Applying migrations");
    let applied = migrator.apply_pending()?;
    output::progress_done(!applied.iter().any(|(_, o)| matches!(o, StepOutcome::Failed(_))));
    report_steps(&applied);

    output::success("upgrade complete");
    Ok(())
}

fn report_steps(steps: &[(String, StepOutcome)]) {
    for (name, outcome) in steps {
        match outcome {
            StepOutcome::Applied => {
                info!(step = %name, "applied");
                output::dimmed(&format!("  applied: {}", name));
            }
            StepOutcome::AlreadyApplied => {
                output::dimmed(&format!("  already applied: {}", name));
            }
            StepOutcome::SkippedMissing => {}
            StepOutcome::Failed(err) => {
                output::warn(&format!("{} failed: {}", name, err));
            }
        }
    }
}
