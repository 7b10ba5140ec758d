//! Test harness utilities for dockhand integration tests.
//!
//! Provides an isolated project directory and preconfigured commands.

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use std::process::Output;
use tempfile::TempDir;

/// A realistic environment template for a three-tier stack.
pub const ENV_TEMPLATE: &str = "\
# deployment
DOMAIN=localhost
ACME_EMAIL=

# database
POSTGRES_USER=app
POSTGRES_DB=app
POSTGRES_PASSWORD=CHANGE_THIS_DB_PASSWORD

# cache and object store
REDIS_PASSWORD=CHANGE_THIS_REDIS
MINIO_ROOT_USER=minio
MINIO_ROOT_PASSWORD=CHANGE_THIS_MINIO

# application secrets
JWT_SECRET=CHANGE_THIS_JWT
SESSION_SECRET=CHANGE_THIS_SESSION
COOKIE_SECRET=CHANGE_THIS_COOKIE

# external URLs
API_URL=https://localhost
SOCKET_URL=wss://localhost
FRONTEND_URL=https://localhost
CORS_ORIGINS=https://localhost
OAUTH_CALLBACK_URL=https://localhost/oauth/callback
";

/// Test environment with an isolated project directory.
pub struct TestEnv {
    /// Temporary directory standing in for the project root
    pub dir: TempDir,
}

impl TestEnv {
    /// Create a fresh, empty project directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self { dir }
    }

    /// Create a project directory that already has an environment
    /// template, as a checked-out deployment would.
    pub fn with_template() -> Self {
        let env = Self::new();
        env.write(".env.example", ENV_TEMPLATE);
        env
    }

    /// Create a dockhand command rooted at the project directory.
    ///
    /// Stdin is closed and colors are disabled so assertions see plain
    /// text.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("dockhand").expect("failed to find dockhand binary");
        cmd.current_dir(self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd
    }

    /// Write a file relative to the project directory.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(path, contents).expect("failed to write file");
    }

    /// Read a file relative to the project directory.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("failed to read file")
    }

    /// Absolute path of a file in the project directory.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Value of `key` in the project's `.env`, if present.
    pub fn env_value(&self, key: &str) -> Option<String> {
        let contents = self.read(".env");
        contents.lines().find_map(|line| {
            line.split_once('=')
                .filter(|(k, _)| k.trim() == key)
                .map(|(_, v)| v.to_string())
        })
    }
}

/// Assert the command exited successfully, printing output on failure.
#[allow(dead_code)]
pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed\nstdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

/// Assert the command exited with a non-zero code.
#[allow(dead_code)]
pub fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "command unexpectedly succeeded\nstdout: {}",
        stdout(output)
    );
}

#[allow(dead_code)]
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[allow(dead_code)]
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
