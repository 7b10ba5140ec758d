//! Flat `KEY=value` environment store.
//!
//! The document is kept as an ordered list of lines so that comments,
//! blank lines, and the ordering of keys dockhand does not know about
//! survive a rewrite byte-for-byte. Only the line carrying a changed key
//! is re-rendered.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};

/// One line of the environment document.
#[derive(Debug, Clone)]
enum Line {
    /// `KEY=value` pair; `raw` is the original text, regenerated only when
    /// the value actually changes.
    Pair {
        key: String,
        value: String,
        raw: String,
    },
    /// Comment, blank line, or anything else we do not interpret.
    Raw(String),
}

/// Ordered, comment-preserving environment document.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<Line>,
}

impl EnvFile {
    /// Load the document at `path`, seeding it from `template` when only
    /// the template exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when neither file exists.
    pub fn load(path: impl AsRef<Path>, template: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = template.as_ref();

        if !path.exists() {
            if !template.exists() {
                return Err(ConfigError::Missing {
                    document: path.display().to_string(),
                    template: template.display().to_string(),
                }
                .into());
            }
            debug!(template = %template.display(), "seeding environment from template");
            fs::copy(template, path).map_err(ConfigError::WriteFile)?;
        }

        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Ok(Self::parse(path, &contents))
    }

    /// Parse an in-memory document. Used by `load` and by tests.
    pub fn parse(path: impl AsRef<Path>, contents: &str) -> Self {
        let lines = contents
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return Line::Raw(line.to_string());
                }
                match line.split_once('=') {
                    Some((key, value)) => Line::Pair {
                        key: key.trim().to_string(),
                        value: value.to_string(),
                        raw: line.to_string(),
                    },
                    None => Line::Raw(line.to_string()),
                }
            })
            .collect();

        Self {
            path: path.as_ref().to_path_buf(),
            lines,
        }
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Pair { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Set `key` to `value`, rewriting exactly the matching line in place
    /// and appending the key when absent. Unrelated lines are untouched;
    /// setting a key to its current value is a no-op.
    pub fn set(&mut self, key: &str, value: &str) {
        for line in &mut self.lines {
            if let Line::Pair {
                key: k,
                value: v,
                raw,
            } = line
            {
                if k == key {
                    if v == value {
                        return;
                    }
                    *v = value.to_string();
                    *raw = format!("{}={}", key, value);
                    return;
                }
            }
        }
        self.lines.push(Line::Pair {
            key: key.to_string(),
            value: value.to_string(),
            raw: format!("{}={}", key, value),
        });
    }

    /// All `(key, value)` pairs in document order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Pair { key, value, .. } => Some((key.as_str(), value.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Render the document text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Pair { raw, .. } | Line::Raw(raw) => {
                    out.push_str(raw);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Persist the document to its path.
    pub fn save(&self) -> Result<()> {
        debug!(path = %self.path.display(), "saving environment");
        fs::write(&self.path, self.render()).map_err(ConfigError::WriteFile)?;
        Ok(())
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
