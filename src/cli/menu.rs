//! Interactive menu shown when dockhand runs without a subcommand.
//!
//! Errors from a chosen action are printed and the menu comes back; only
//! quitting leaves the loop. Exit code stays zero so a wrapper script
//! driving the menu does not mistake a failed action for a crashed tool.

use dialoguer::Select;

use crate::cli::{self, output, Command};
use crate::error::Result;

const MENU_ITEMS: &[&str] = &[
    "Status",
    "Start services",
    "Stop services",
    "Restart services",
    "Install (first-time setup)",
    "Upgrade",
    "Backup",
    "Restore",
    "Auto-configure",
    "Provision TLS",
    "Build & push image",
    "Quit",
];

/// Run the menu loop.
pub fn run() -> Result<()> {
    output::header("dockhand");
    output::rule();

    loop {
        println!();
        let choice = Select::new()
            .with_prompt("Select an action")
            .items(MENU_ITEMS)
            .default(0)
            .interact()?;

        let command = match choice {
            0 => Command::Status { json: false },
            1 => Command::Start { profile: vec![] },
            2 => Command::Stop { profile: vec![] },
            3 => Command::Restart { service: None },
            4 => Command::Install,
            5 => Command::Upgrade,
            6 => Command::Backup,
            7 => Command::Restore {
                archive: None,
                confirm_archive: false,
                acknowledge_data_loss: false,
                restore_env: false,
            },
            8 => Command::AutoConfigure { domain: None },
            9 => Command::Ssl {
                renew: false,
                email: None,
            },
            10 => Command::BuildPush { tag: None },
            _ => return Ok(()),
        };

        if let Err(err) = cli::dispatch(command) {
            output::error(&err.to_string());
        }
    }
}
