//! Advisory command lock.
//!
//! The environment document and proxy config are mutated in place, so only
//! one dockhand command may run at a time. The lock is a file created with
//! `create_new`; it is removed on drop.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use crate::core::settings::Settings;
use crate::error::{Error, Result};

const LOCK_FILE: &str = ".dockhand.lock";

/// Held for the duration of a mutating command.
#[derive(Debug)]
pub struct CommandLock {
    path: PathBuf,
}

impl CommandLock {
    /// Take the lock, failing fast when another invocation holds it.
    pub fn acquire(settings: &Settings) -> Result<Self> {
        let path = settings.project_root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Locked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CommandLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
