//! Per-run configuration object.
//!
//! Every component receives a [`Settings`] reference instead of reading
//! ambient process environment. Paths are resolved once per invocation from
//! the project root.

use std::path::{Path, PathBuf};

use crate::core::env::EnvFile;

/// Default backup retention horizon in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Resolved paths and tunables for one command invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Project root (where docker-compose.yml and .env live)
    pub project_root: PathBuf,
    /// Environment document
    pub env_file: PathBuf,
    /// Environment template used to seed a missing document
    pub env_template: PathBuf,
    /// Directory holding backup archives
    pub backup_dir: PathBuf,
    /// Proxy configuration tree
    pub nginx_dir: PathBuf,
    /// Certificate material written by the provisioner
    pub certs_dir: PathBuf,
    /// Base initialization SQL directory
    pub init_sql_dir: PathBuf,
    /// Pending migrations directory
    pub migrations_dir: PathBuf,
    /// Archives older than this many days are swept
    pub retention_days: u32,
    /// Deployment bundles its own cache and object store
    pub self_contained: bool,
}

impl Settings {
    /// Build settings rooted at `root` with default layout and tunables.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            env_file: root.join(".env"),
            env_template: root.join(".env.example"),
            backup_dir: root.join("backups"),
            nginx_dir: root.join("nginx"),
            certs_dir: root.join("nginx").join("certs"),
            init_sql_dir: root.join("db").join("init"),
            migrations_dir: root.join("db").join("migrations"),
            retention_days: DEFAULT_RETENTION_DAYS,
            self_contained: true,
            project_root: root,
        }
    }

    /// Settings for the current working directory.
    pub fn discover() -> std::io::Result<Self> {
        Ok(Self::from_root(std::env::current_dir()?))
    }

    /// Apply tunables carried in the environment document.
    ///
    /// `BACKUP_RETENTION_DAYS` overrides the sweep horizon;
    /// `STORAGE_PROVIDER=external` marks the cache/object store as
    /// externally managed (volumes are then skipped by backup/restore).
    pub fn apply_env(&mut self, env: &EnvFile) {
        if let Some(days) = env.get("BACKUP_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
            self.retention_days = days;
        }
        if let Some(provider) = env.get("STORAGE_PROVIDER") {
            self.self_contained = provider != "external";
        }
    }

    /// Path of the rendered proxy configuration.
    pub fn nginx_conf(&self) -> PathBuf {
        self.nginx_dir.join("nginx.conf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_hangs_off_root() {
        let s = Settings::from_root("/srv/app");
        assert_eq!(s.env_file, PathBuf::from("/srv/app/.env"));
        assert_eq!(s.backup_dir, PathBuf::from("/srv/app/backups"));
        assert_eq!(s.nginx_conf(), PathBuf::from("/srv/app/nginx/nginx.conf"));
        assert_eq!(s.retention_days, DEFAULT_RETENTION_DAYS);
        assert!(s.self_contained);
    }
}
