//! Command-line interface.

pub mod backup;
pub mod configure;
pub mod image;
pub mod lifecycle;
pub mod menu;
pub mod output;
pub mod restore;
pub mod ssl;

use clap::{Parser, Subcommand};

use crate::core::env::EnvFile;
use crate::core::settings::Settings;
use crate::error::{Error, Result};

/// Dockhand - operations CLI for a containerized web stack.
#[derive(Parser)]
#[command(
    name = "dockhand",
    about = "Operations CLI for a containerized web stack",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// First-time setup: seed configuration, start services, initialize the database
    Install,

    /// Start services
    Start {
        /// Compose profiles to start
        #[arg(long)]
        profile: Vec<String>,
    },

    /// Stop services
    Stop {
        /// Compose profiles to stop
        #[arg(long)]
        profile: Vec<String>,
    },

    /// Restart one service, or everything
    Restart {
        /// Service to restart (all services when omitted)
        service: Option<String>,
    },

    /// Show service status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Tail a service's logs
    Logs {
        /// Service name
        service: String,
        /// Number of lines
        #[arg(long, default_value_t = 100)]
        tail: usize,
    },

    /// Create a backup archive
    Backup,

    /// Restore from a backup archive (destructive; double confirmation)
    Restore {
        /// Archive name (interactive selection when omitted)
        archive: Option<String>,
        /// Confirm the archive selection (first confirmation)
        #[arg(long)]
        confirm_archive: bool,
        /// Acknowledge that unbacked-up data will be lost (second confirmation)
        #[arg(long)]
        acknowledge_data_loss: bool,
        /// Also overwrite the environment configuration from the archive
        #[arg(long)]
        restore_env: bool,
    },

    /// Pull newer images, restart, apply pending migrations
    Upgrade,

    /// Set a single configuration key
    Configure {
        /// Key to set (prompted when omitted)
        key: Option<String>,
        /// Value to set (prompted when omitted)
        value: Option<String>,
    },

    /// Generate missing secrets and rewrite external URLs
    AutoConfigure {
        /// Domain to configure (defaults to the configured DOMAIN)
        #[arg(long)]
        domain: Option<String>,
    },

    /// Provision or renew TLS certificates
    Ssl {
        /// Renew the existing certificate instead of provisioning
        #[arg(long)]
        renew: bool,
        /// Contact email for ACME issuance
        #[arg(long)]
        email: Option<String>,
    },

    /// Build the application image
    Build {
        /// Image tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Push the application image
    Push {
        /// Image tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Build and push the application image
    BuildPush {
        /// Image tag
        #[arg(long)]
        tag: Option<String>,
    },
}

/// Load settings and the environment document for the current directory.
pub(crate) fn context() -> Result<(Settings, EnvFile)> {
    let mut settings = Settings::discover()?;
    let env = EnvFile::load(&settings.env_file, &settings.env_template)?;
    settings.apply_env(&env);
    Ok((settings, env))
}

/// Execute the parsed invocation.
///
/// With no subcommand, an interactive menu runs on a TTY; a
/// non-interactive invocation without a subcommand is an error.
pub fn execute(command: Option<Command>) -> Result<()> {
    match command {
        Some(command) => dispatch(command),
        None if atty::is(atty::Stream::Stdin) => menu::run(),
        None => Err(Error::InvalidSelection(
            "no subcommand given (see dockhand --help)".to_string(),
        )),
    }
}

/// Dispatch one command.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Install => lifecycle::install(),
        Command::Start { profile } => lifecycle::start(&profile),
        Command::Stop { profile } => lifecycle::stop(&profile),
        Command::Restart { service } => lifecycle::restart(service.as_deref()),
        Command::Status { json } => lifecycle::status(json),
        Command::Logs { service, tail } => lifecycle::logs(&service, tail),
        Command::Backup => backup::execute(),
        Command::Restore {
            archive,
            confirm_archive,
            acknowledge_data_loss,
            restore_env,
        } => restore::execute(
            archive.as_deref(),
            confirm_archive,
            acknowledge_data_loss,
            restore_env,
        ),
        Command::Upgrade => lifecycle::upgrade(),
        Command::Configure { key, value } => configure::set(key, value),
        Command::AutoConfigure { domain } => configure::auto(domain.as_deref()),
        Command::Ssl { renew, email } => ssl::execute(renew, email.as_deref()),
        Command::Build { tag } => image::build(tag.as_deref()),
        Command::Push { tag } => image::push(tag.as_deref()),
        Command::BuildPush { tag } => image::build_push(tag.as_deref()),
    }
}
