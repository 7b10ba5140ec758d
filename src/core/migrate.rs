//! Database initialization and migration runner.
//!
//! Base initialization applies the init SQL files in a fixed order,
//! continuing past non-fatal step failures. Pending migrations are applied
//! in filename order and recorded in a `schema_migrations` table inside the
//! target database, so a migration is never reapplied.

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::compose::Orchestrator;
use crate::core::env::EnvFile;
use crate::core::settings::Settings;
use crate::error::{ComposeError, Result};

/// Base initialization steps, applied in this order.
const INIT_STEPS: &[(&str, &str)] = &[
    ("extensions", "01_extensions.sql"),
    ("tables", "02_tables.sql"),
    ("indexes", "03_indexes.sql"),
    ("functions", "04_functions.sql"),
    ("triggers", "05_triggers.sql"),
    ("views", "06_views.sql"),
    ("seed data", "07_seed.sql"),
    ("application user", "08_app_user.sql"),
];

const MIGRATIONS_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (name text PRIMARY KEY, applied_at timestamptz NOT NULL DEFAULT now());";

/// Outcome of one psql invocation: `Err` carries the stderr of a statement
/// that ran but failed. Infrastructure failures surface as the outer
/// [`Result`].
type SqlResult = std::result::Result<(), String>;

/// Outcome of one initialization step or migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    AlreadyApplied,
    SkippedMissing,
    Failed(String),
}

/// Migration runner over the orchestration facade.
pub struct MigrationRunner<'a> {
    settings: &'a Settings,
    env: &'a EnvFile,
    orchestrator: &'a dyn Orchestrator,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        settings: &'a Settings,
        env: &'a EnvFile,
        orchestrator: &'a dyn Orchestrator,
    ) -> Self {
        Self {
            settings,
            env,
            orchestrator,
        }
    }

    fn credentials(&self) -> (String, String) {
        let user = self.env.get_or("POSTGRES_USER", "postgres");
        let db = self.env.get_or("POSTGRES_DB", &user);
        (user, db)
    }

    fn apply_sql(&self, sql: &str) -> Result<SqlResult> {
        let (user, db) = self.credentials();
        let out = self.orchestrator.exec_with_input(
            "postgres",
            &["psql", "-U", &user, "-d", &db, "-v", "ON_ERROR_STOP=1"],
            sql,
        )?;
        if out.success {
            Ok(Ok(()))
        } else {
            Ok(Err(out.stderr))
        }
    }

    fn query(&self, sql: &str) -> Result<String> {
        let (user, db) = self.credentials();
        let out = self.orchestrator.exec(
            "postgres",
            &["psql", "-U", &user, "-d", &db, "-t", "-A", "-c", sql],
        )?;
        if !out.success {
            return Err(ComposeError::CommandFailed {
                command: format!("psql -c {}", sql),
                stderr: out.stderr,
            }
            .into());
        }
        Ok(out.stdout)
    }

    /// Apply the base initialization steps on a fresh database volume.
    ///
    /// Each step logs its own outcome; a failed step does not stop the
    /// later ones.
    pub fn initialize(&self) -> Result<Vec<(String, StepOutcome)>> {
        let mut outcomes = Vec::new();
        for (step, file) in INIT_STEPS {
            let path = self.settings.init_sql_dir.join(file);
            let outcome = if !path.exists() {
                StepOutcome::SkippedMissing
            } else {
                let sql = fs::read_to_string(&path)?;
                match self.apply_sql(&sql)? {
                    Ok(()) => {
                        info!(step, "initialization step applied");
                        StepOutcome::Applied
                    }
                    Err(stderr) => {
                        warn!(step, stderr = %stderr, "initialization step failed; continuing");
                        StepOutcome::Failed(stderr)
                    }
                }
            };
            outcomes.push(((*step).to_string(), outcome));
        }
        Ok(outcomes)
    }

    /// Migration files in filename order.
    fn pending_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.settings.migrations_dir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.settings.migrations_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "sql") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Names already recorded in the migration table.
    ///
    /// An unreadable record is fatal: proceeding with an empty list would
    /// replay migrations that already ran.
    fn applied_names(&self) -> Result<Vec<String>> {
        if let Err(stderr) = self.apply_sql(MIGRATIONS_TABLE_DDL)? {
            return Err(ComposeError::CommandFailed {
                command: "psql (ensure schema_migrations table)".to_string(),
                stderr,
            }
            .into());
        }
        let out = self.query("SELECT name FROM schema_migrations;")?;
        Ok(out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// Apply every pending migration, recording each applied name.
    ///
    /// A name already present in the record is skipped with a distinct
    /// "already applied" outcome rather than treated as an error.
    pub fn apply_pending(&self) -> Result<Vec<(String, StepOutcome)>> {
        let applied = self.applied_names()?;
        let mut outcomes = Vec::new();

        for path in self.pending_files()? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if applied.iter().any(|a| a == &name) {
                info!(migration = %name, "already applied, skipping");
                outcomes.push((name, StepOutcome::AlreadyApplied));
                continue;
            }

            let sql = fs::read_to_string(&path)?;
            let outcome = match self.apply_sql(&sql)? {
                Ok(()) => match self.record_applied(&name)? {
                    Ok(()) => {
                        info!(migration = %name, "applied");
                        StepOutcome::Applied
                    }
                    // The SQL ran but the record insert failed: the next run
                    // will replay this file, so the step must not claim
                    // success.
                    Err(stderr) => {
                        warn!(migration = %name, stderr = %stderr, "migration applied but recording failed");
                        StepOutcome::Failed(format!("applied but not recorded: {}", stderr))
                    }
                },
                Err(stderr) => {
                    warn!(migration = %name, stderr = %stderr, "migration failed");
                    StepOutcome::Failed(stderr)
                }
            };
            outcomes.push((name, outcome));
        }
        Ok(outcomes)
    }

    fn record_applied(&self, name: &str) -> Result<SqlResult> {
        // single-quote escape for the SQL literal
        let escaped = name.replace('\'', "''");
        let (user, db) = self.credentials();
        let insert = format!(
            "INSERT INTO schema_migrations (name) VALUES ('{}') ON CONFLICT (name) DO NOTHING;",
            escaped
        );
        let out = self.orchestrator.exec(
            "postgres",
            &["psql", "-U", &user, "-d", &db, "-c", &insert],
        )?;
        if out.success {
            Ok(Ok(()))
        } else {
            Ok(Err(out.stderr))
        }
    }
}
