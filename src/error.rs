//! Error types.
//!
//! Layered per concern: each core module has its own error enum, wrapped by
//! the top-level [`Error`]. `main` maps selected variants to remediation
//! hints.

use thiserror::Error;

/// Top-level error type for all dockhand operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error("image build failed: {0}")]
    BuildFailed(String),

    #[error("image push failed: {0}")]
    PushFailed(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("another dockhand command is already running (lock file: {0})")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Environment configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no environment file or template found (looked for {document} and {template})")]
    Missing { document: String, template: String },

    #[error("failed to read environment file: {0}")]
    ReadFile(std::io::Error),

    #[error("failed to write environment file: {0}")]
    WriteFile(std::io::Error),
}

/// Orchestration facade errors.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("required binary not found: {0}")]
    BinaryNotFound(String),

    #[error("command failed ({command}): {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("service {service} did not become ready within {waited_secs}s")]
    ServiceNotReady { service: String, waited_secs: u64 },
}

/// Certificate provisioning errors.
#[derive(Error, Debug)]
pub enum TlsError {
    #[error("no contact email configured for certificate issuance")]
    MissingContact,

    #[error("ACME order failed:\n{transcript}")]
    AcmeOrderFailed { transcript: String },

    #[error("openssl failed: {0}")]
    OpensslFailed(String),
}

/// Backup engine errors.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("database dump failed: {0}")]
    DatabaseDumpFailed(String),

    #[error("failed to write archive {name}: {source}")]
    ArchiveWrite {
        name: String,
        source: std::io::Error,
    },

    #[error("no backup archives found in {0}")]
    NoArchives(String),
}

/// Restore engine errors.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("restore refused: archive selection and data-loss acknowledgement are both required")]
    NotConfirmed,

    #[error("archive {0} does not contain a database dump")]
    DumpMissing(String),

    #[error("restore failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
