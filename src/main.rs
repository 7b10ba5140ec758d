//! Dockhand - operations CLI for a containerized web stack.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dockhand::cli::output;
use dockhand::cli::{execute, Cli};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("DOCKHAND_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("dockhand=debug")
        } else {
            EnvFilter::new("dockhand=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .init();

    if let Err(e) = execute(cli.command) {
        let error_msg = e.to_string();
        let suggestion = match &e {
            dockhand::error::Error::Config(dockhand::error::ConfigError::Missing { .. }) => {
                Some("run: dockhand install")
            }
            dockhand::error::Error::Compose(dockhand::error::ComposeError::BinaryNotFound(_)) => {
                Some("install docker and make sure it is on PATH")
            }
            dockhand::error::Error::Tls(dockhand::error::TlsError::MissingContact) => {
                Some("set ACME_EMAIL in .env or pass --email")
            }
            dockhand::error::Error::Tls(dockhand::error::TlsError::AcmeOrderFailed { .. }) => {
                Some("check DNS for the domain and that ports 80/443 are reachable")
            }
            dockhand::error::Error::Restore(dockhand::error::RestoreError::NotConfirmed) => {
                Some("pass --confirm-archive and --acknowledge-data-loss, or run interactively")
            }
            _ => None,
        };

        output::error(&error_msg);
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
