//! Backup engine.
//!
//! Snapshots the database, the bundled cache/object-store volumes, and the
//! configuration tree into one timestamp-named tar.gz archive, then sweeps
//! archives past the retention horizon. Only the database dump is fatal on
//! failure; everything else degrades the archive to "partial".

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::core::compose::{Mount, Orchestrator};
use crate::core::env::EnvFile;
use crate::core::settings::Settings;
use crate::error::{BackupError, Result};

/// Archive name prefix; the rest is `YYYYMMDD_HHMMSS` plus an optional
/// collision suffix.
const ARCHIVE_PREFIX: &str = "backup_";

/// Volumes snapshotted in self-contained mode, with their file name inside
/// the archive.
const VOLUME_SNAPSHOTS: &[(&str, &str)] = &[
    ("redis_data", "redis_data.tar.gz"),
    ("minio_data", "minio_data.tar.gz"),
];

/// Image used for ephemeral tar helpers.
const HELPER_IMAGE: &str = "alpine:3";

/// A created or discovered backup archive.
#[derive(Debug, Clone)]
pub struct ArchiveRef {
    pub name: String,
    pub path: PathBuf,
    /// One or more optional snapshot steps failed during capture
    pub partial: bool,
}

impl ArchiveRef {
    /// Capture timestamp encoded in the archive name.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        parse_stamp(&self.name)
    }
}

fn parse_stamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(ARCHIVE_PREFIX)?;
    let stamp: String = stamp.chars().take(15).collect();
    NaiveDateTime::parse_from_str(&stamp, "%Y%m%d_%H%M%S")
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Pick an archive name for `now`, disambiguating same-second collisions
/// with a numeric suffix (`backup_20260823_120000_2`, `_3`, ...).
fn next_archive_name(backup_dir: &Path, now: DateTime<Utc>) -> String {
    let base = format!("{}{}", ARCHIVE_PREFIX, now.format("%Y%m%d_%H%M%S"));
    if !backup_dir.join(format!("{}.tar.gz", base)).exists() {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !backup_dir.join(format!("{}.tar.gz", candidate)).exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Backup engine over the orchestration facade.
pub struct BackupEngine<'a> {
    settings: &'a Settings,
    env: &'a EnvFile,
    orchestrator: &'a dyn Orchestrator,
}

impl<'a> BackupEngine<'a> {
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

    /// Create one archive, then apply retention.
    pub fn create_backup(&self) -> Result<ArchiveRef> {
        fs::create_dir_all(&self.settings.backup_dir)?;
        let name = next_archive_name(&self.settings.backup_dir, Utc::now());
        let staging = self.settings.backup_dir.join(format!(".staging_{}", name));
        fs::create_dir_all(&staging)?;

        let result = self.capture(&name, &staging);

        // The staging directory never outlives the run
        let _ = fs::remove_dir_all(&staging);
        let archive = result?;

        let swept = self.apply_retention(self.settings.retention_days)?;
        for name in swept {
            info!(archive = %name, "swept by retention");
        }

        Ok(archive)
    }

    fn capture(&self, name: &str, staging: &Path) -> Result<ArchiveRef> {
        let mut partial = false;

        // 1. Database dump — the only mandatory step
        info!("dumping database");
        let user = self.env.get_or("POSTGRES_USER", "postgres");
        let db = self.env.get_or("POSTGRES_DB", &user);
        let dump = self
            .orchestrator
            .exec("postgres", &["pg_dump", "-U", &user, "-d", &db])?;
        if !dump.success {
            return Err(BackupError::DatabaseDumpFailed(dump.stderr).into());
        }
        fs::write(staging.join("database.sql"), &dump.stdout)?;

        // 2. Cache and object-store volumes (self-contained mode only)
        if self.settings.self_contained {
            for (volume, file) in VOLUME_SNAPSHOTS {
                if !self.snapshot_volume(volume, file, staging) {
                    partial = true;
                }
            }
        }

        // 3. Environment and proxy configuration, verbatim
        if let Err(e) = self.copy_config(staging) {
            warn!(error = %e, "configuration copy failed");
            partial = true;
        }

        // 4. One compressed archive named by the capture timestamp
        let path = self.settings.backup_dir.join(format!("{}.tar.gz", name));
        write_archive(&path, name, staging).map_err(|source| BackupError::ArchiveWrite {
            name: name.to_string(),
            source,
        })?;

        info!(archive = %name, partial, "backup created");
        Ok(ArchiveRef {
            name: name.to_string(),
            path,
            partial,
        })
    }

    fn snapshot_volume(&self, volume: &str, file: &str, staging: &Path) -> bool {
        info!(volume, "snapshotting volume");
        let mounts = [
            Mount::read_only(volume, "/data"),
            Mount::read_write(staging.display().to_string(), "/backup"),
        ];
        let tar_target = format!("/backup/{}", file);
        let result = self.orchestrator.run_ephemeral(
            HELPER_IMAGE,
            &mounts,
            &["tar", "czf", &tar_target, "-C", "/data", "."],
        );
        match result {
            Ok(out) if out.success => true,
            Ok(out) => {
                warn!(volume, stderr = %out.stderr, "volume snapshot failed; archive will be partial");
                false
            }
            Err(e) => {
                warn!(volume, error = %e, "volume snapshot failed; archive will be partial");
                false
            }
        }
    }

    fn copy_config(&self, staging: &Path) -> std::io::Result<()> {
        if self.settings.env_file.exists() {
            fs::copy(&self.settings.env_file, staging.join("env_backup"))?;
        }
        if self.settings.nginx_dir.exists() {
            copy_dir(&self.settings.nginx_dir, &staging.join("nginx_backup"))?;
        }
        Ok(())
    }

    /// All archives in the backup directory, sorted by name (and therefore
    /// by capture time).
    pub fn list_archives(&self) -> Result<Vec<ArchiveRef>> {
        let mut archives = Vec::new();
        if !self.settings.backup_dir.exists() {
            return Ok(archives);
        }
        for entry in fs::read_dir(&self.settings.backup_dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = file_name.strip_suffix(".tar.gz") {
                if name.starts_with(ARCHIVE_PREFIX) && parse_stamp(name).is_some() {
                    archives.push(ArchiveRef {
                        name: name.to_string(),
                        path: entry.path(),
                        partial: false,
                    });
                }
            }
        }
        archives.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(archives)
    }

    /// Delete archives whose capture timestamp is older than `days`.
    /// Returns the deleted names.
    pub fn apply_retention(&self, days: u32) -> Result<Vec<String>> {
        let horizon = Utc::now() - Duration::days(i64::from(days));
        let mut swept = Vec::new();
        for archive in self.list_archives()? {
            if let Some(captured) = archive.captured_at() {
                if captured < horizon {
                    fs::remove_file(&archive.path)?;
                    swept.push(archive.name);
                }
            }
        }
        Ok(swept)
    }
}

/// Compress `staging` into `path` as a gzip tarball rooted at `name/`.
fn write_archive(path: &Path, name: &str, staging: &Path) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(name, staging)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Recursively copy a directory tree.
fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compose::testing::MockOrchestrator;
    use tempfile::TempDir;

    fn setup(tmp: &TempDir) -> (Settings, EnvFile) {
        let settings = Settings::from_root(tmp.path());
        std::fs::write(&settings.env_file, "POSTGRES_USER=app\nPOSTGRES_DB=appdb\n").unwrap();
        std::fs::create_dir_all(&settings.nginx_dir).unwrap();
        std::fs::write(settings.nginx_conf(), "server {}\n").unwrap();
        let env = EnvFile::parse(&settings.env_file, "POSTGRES_USER=app\nPOSTGRES_DB=appdb\n");
        (settings, env)
    }

    fn touch_archive(settings: &Settings, name: &str) {
        std::fs::create_dir_all(&settings.backup_dir).unwrap();
        std::fs::write(
            settings.backup_dir.join(format!("{}.tar.gz", name)),
            b"stub",
        )
        .unwrap();
    }

    #[test]
    fn backup_writes_archive_with_db_dump() {
        let tmp = TempDir::new().unwrap();
        let (settings, env) = setup(&tmp);
        let mock = MockOrchestrator::new();
        mock.script("pg_dump", true, "-- dump\nCREATE TABLE t;\n", "");

        let engine = BackupEngine::new(&settings, &env, &mock);
        let archive = engine.create_backup().unwrap();

        assert!(archive.path.exists());
        assert!(!archive.partial);
        assert!(archive.name.starts_with("backup_"));
        // both bundled volumes snapshotted
        assert_eq!(mock.calls_containing("ephemeral"), 2);
        // staging directory cleaned up
        assert_eq!(
            std::fs::read_dir(&settings.backup_dir)
                .unwrap()
                .filter(|e| e
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".staging"))
                .count(),
            0
        );
    }

    #[test]
    fn failed_dump_fails_the_whole_backup() {
        let tmp = TempDir::new().unwrap();
        let (settings, env) = setup(&tmp);
        let mock = MockOrchestrator::new();
        mock.script("pg_dump", false, "", "connection refused");

        let engine = BackupEngine::new(&settings, &env, &mock);
        let err = engine.create_backup().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Backup(BackupError::DatabaseDumpFailed(_))
        ));
        // no archive left behind
        assert!(engine.list_archives().unwrap().is_empty());
    }

    #[test]
    fn failed_volume_snapshot_degrades_to_partial() {
        let tmp = TempDir::new().unwrap();
        let (settings, env) = setup(&tmp);
        let mock = MockOrchestrator::new();
        mock.script("pg_dump", true, "-- dump\n", "");
        mock.script("redis_data", false, "", "volume missing");

        let engine = BackupEngine::new(&settings, &env, &mock);
        let archive = engine.create_backup().unwrap();
        assert!(archive.partial);
        assert!(archive.path.exists());
    }

    #[test]
    fn external_storage_skips_volume_snapshots() {
        let tmp = TempDir::new().unwrap();
        let (mut settings, env) = setup(&tmp);
        settings.self_contained = false;
        let mock = MockOrchestrator::new();
        mock.script("pg_dump", true, "-- dump\n", "");

        let engine = BackupEngine::new(&settings, &env, &mock);
        engine.create_backup().unwrap();
        assert_eq!(mock.calls_containing("ephemeral"), 0);
    }

    #[test]
    fn same_second_names_get_a_numeric_suffix() {
        let tmp = TempDir::new().unwrap();
        let (settings, _) = setup(&tmp);
        let now = Utc::now();
        let first = next_archive_name(&settings.backup_dir, now);
        touch_archive(&settings, &first);
        let second = next_archive_name(&settings.backup_dir, now);
        assert_eq!(second, format!("{}_2", first));
        touch_archive(&settings, &second);
        let third = next_archive_name(&settings.backup_dir, now);
        assert_eq!(third, format!("{}_3", first));
    }

    #[test]
    fn retention_sweeps_only_archives_past_the_horizon() {
        let tmp = TempDir::new().unwrap();
        let (settings, env) = setup(&tmp);
        let mock = MockOrchestrator::new();
        let engine = BackupEngine::new(&settings, &env, &mock);

        let today = Utc::now();
        let fresh = format!("backup_{}", today.format("%Y%m%d_%H%M%S"));
        let old = format!(
            "backup_{}",
            (today - Duration::days(31)).format("%Y%m%d_%H%M%S")
        );
        let older = format!(
            "backup_{}",
            (today - Duration::days(40)).format("%Y%m%d_%H%M%S")
        );
        for name in [&fresh, &old, &older] {
            touch_archive(&settings, name);
        }

        let swept = engine.apply_retention(30).unwrap();
        assert_eq!(swept.len(), 2);
        assert!(swept.contains(&old));
        assert!(swept.contains(&older));

        let remaining = engine.list_archives().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, fresh);
    }

    #[test]
    fn archive_names_sort_lexicographically_by_time() {
        assert!("backup_20260101_000000" < "backup_20260102_000000");
        assert!(parse_stamp("backup_20260823_120000_2").is_some());
        assert!(parse_stamp("not_a_backup").is_none());
    }
}
