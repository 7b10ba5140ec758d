//! Restore engine.
//!
//! Inverse of the backup engine. Mutating anything requires a plan carrying
//! both confirmations (archive selection and data-loss acknowledgement);
//! the CLI collects them, core only verifies. Each data class is restored
//! independently and the report says which classes succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{info, warn};

use crate::core::backup::ArchiveRef;
use crate::core::compose::{wait_for_service_ready, Mount, Orchestrator};
use crate::core::env::EnvFile;
use crate::core::settings::Settings;
use crate::error::{Result, RestoreError};

/// How long to wait for the database after a cold start.
const DB_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Volume tarballs restored in self-contained mode.
const VOLUME_RESTORES: &[(&str, &str)] = &[
    ("redis_data", "redis_data.tar.gz"),
    ("minio_data", "minio_data.tar.gz"),
];

const HELPER_IMAGE: &str = "alpine:3";

/// Explicit confirmations collected before any state is mutated.
#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    /// Operator confirmed the chosen archive is the right one
    pub archive_confirmed: bool,
    /// Operator acknowledged unbacked-up data will be lost
    pub data_loss_acknowledged: bool,
    /// Overwrite the environment configuration from the archive
    pub restore_env: bool,
}

/// Outcome for one data class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOutcome {
    Restored,
    Skipped,
    Failed(String),
}

impl ClassOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-class result of a restore run.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub database: ClassOutcome,
    pub cache: ClassOutcome,
    pub objects: ClassOutcome,
    pub config: ClassOutcome,
}

impl RestoreReport {
    /// The database replay failed; the restore as a whole is a failure.
    pub fn database_failed(&self) -> bool {
        self.database.is_failure()
    }
}

/// Restore engine over the orchestration facade.
pub struct RestoreEngine<'a> {
    settings: &'a Settings,
    env: &'a EnvFile,
    orchestrator: &'a dyn Orchestrator,
}

impl<'a> RestoreEngine<'a> {
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

    /// Restore from `archive` under `plan`.
    ///
    /// Refuses to touch anything unless both confirmations are present.
    /// The SQL replay has no transactional rollback: a dump erroring
    /// partway through leaves the database partially restored, and the
    /// report says so.
    pub fn restore(&self, archive: &ArchiveRef, plan: &RestorePlan) -> Result<RestoreReport> {
        if !plan.archive_confirmed || !plan.data_loss_acknowledged {
            return Err(RestoreError::NotConfirmed.into());
        }

        let scratch = self
            .settings
            .backup_dir
            .join(format!(".restore_{}", archive.name));
        let result = self.run(archive, plan, &scratch);
        let _ = fs::remove_dir_all(&scratch);
        result
    }

    fn run(
        &self,
        archive: &ArchiveRef,
        plan: &RestorePlan,
        scratch: &Path,
    ) -> Result<RestoreReport> {
        info!(archive = %archive.name, "extracting archive");
        fs::create_dir_all(scratch)?;
        extract_archive(&archive.path, scratch)?;
        let contents = scratch.join(&archive.name);

        // Refuse before teardown when the mandatory piece is missing
        let dump_path = contents.join("database.sql");
        if !dump_path.exists() {
            return Err(RestoreError::DumpMissing(archive.name.clone()).into());
        }

        info!("stopping services");
        self.orchestrator.stop(&[])?;

        info!("starting database");
        self.orchestrator.start(&["postgres"], &[])?;
        let user = self.env.get_or("POSTGRES_USER", "postgres");
        wait_for_service_ready(
            self.orchestrator,
            "postgres",
            &["pg_isready", "-U", &user],
            DB_READY_TIMEOUT,
        )?;

        let database = self.replay_dump(&dump_path, &user);

        let (cache, objects) = if self.settings.self_contained {
            (
                self.restore_volume(&contents, VOLUME_RESTORES[0]),
                self.restore_volume(&contents, VOLUME_RESTORES[1]),
            )
        } else {
            (ClassOutcome::Skipped, ClassOutcome::Skipped)
        };

        let config = self.restore_config(&contents, plan);

        info!("restarting services");
        self.orchestrator.start(&[], &[])?;

        Ok(RestoreReport {
            database,
            cache,
            objects,
            config,
        })
    }

    fn replay_dump(&self, dump_path: &Path, user: &str) -> ClassOutcome {
        info!("replaying database dump");
        let dump = match fs::read_to_string(dump_path) {
            Ok(d) => d,
            Err(e) => return ClassOutcome::Failed(e.to_string()),
        };
        let db = self.env.get_or("POSTGRES_DB", user);
        match self.orchestrator.exec_with_input(
            "postgres",
            &["psql", "-U", user, "-d", &db, "-v", "ON_ERROR_STOP=1"],
            &dump,
        ) {
            Ok(out) if out.success => ClassOutcome::Restored,
            Ok(out) => {
                warn!("database replay failed; database may be partially restored");
                ClassOutcome::Failed(out.stderr)
            }
            Err(e) => ClassOutcome::Failed(e.to_string()),
        }
    }

    fn restore_volume(&self, contents: &Path, (volume, file): (&str, &str)) -> ClassOutcome {
        let tarball = contents.join(file);
        if !tarball.exists() {
            return ClassOutcome::Skipped;
        }

        info!(volume, "replacing volume contents");
        let mounts = [
            Mount::read_write(volume, "/data"),
            Mount::read_only(contents.display().to_string(), "/backup"),
        ];
        // Wholesale replacement: clear, then extract
        let script = format!(
            "rm -rf /data/* /data/..?* /data/.[!.]* ; tar xzf /backup/{} -C /data",
            file
        );
        match self
            .orchestrator
            .run_ephemeral(HELPER_IMAGE, &mounts, &["sh", "-c", &script])
        {
            Ok(out) if out.success => ClassOutcome::Restored,
            Ok(out) => {
                warn!(volume, stderr = %out.stderr, "volume restore failed");
                ClassOutcome::Failed(out.stderr)
            }
            Err(e) => ClassOutcome::Failed(e.to_string()),
        }
    }

    fn restore_config(&self, contents: &Path, plan: &RestorePlan) -> ClassOutcome {
        if !plan.restore_env {
            return ClassOutcome::Skipped;
        }
        let archived = contents.join("env_backup");
        if !archived.exists() {
            return ClassOutcome::Skipped;
        }
        info!("restoring environment configuration from archive");
        match fs::copy(&archived, &self.settings.env_file) {
            Ok(_) => ClassOutcome::Restored,
            Err(e) => ClassOutcome::Failed(e.to_string()),
        }
    }
}

/// Unpack a gzip tarball into `dest`.
fn extract_archive(path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(dest)?;
    Ok(())
}

/// Build the expected on-disk path for a named archive.
pub fn archive_path(settings: &Settings, name: &str) -> PathBuf {
    settings.backup_dir.join(format!("{}.tar.gz", name))
}
