//! Dockhand - operations CLI for a containerized three-tier web stack.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── menu          # Interactive menu (no-args invocation)
//! │   ├── lifecycle     # install/start/stop/restart/status/logs/upgrade
//! │   ├── backup        # Backup command
//! │   ├── restore       # Restore command (double confirmation)
//! │   ├── ssl           # Certificate provisioning commands
//! │   ├── configure     # configure / auto-configure
//! │   └── image         # build / push
//! └── core/             # Core engine components
//!     ├── settings      # Explicit per-run configuration object
//!     ├── env           # Flat KEY=value environment store
//!     ├── secrets       # Secret generation and placeholder detection
//!     ├── domain        # Deployment target classification
//!     ├── configure     # Auto-configuration over env + secrets
//!     ├── compose       # Orchestration facade (docker compose)
//!     ├── tls           # Certificate provisioner (self-signed / ACME)
//!     ├── proxy         # Proxy config rendering
//!     ├── backup        # Backup engine
//!     ├── restore       # Restore engine
//!     ├── migrate       # Database init and migration runner
//!     └── lock          # Advisory command lock
//! ```
//!
//! # Features
//!
//! - Versioned, timestamped backup archives covering database, cache,
//!   object store, and configuration
//! - Restore with per-data-class outcome reporting
//! - Self-signed or ACME-issued TLS, selected from the deployment target
//! - Idempotent secret and URL auto-configuration
//! - Narrow orchestration facade over docker compose

pub mod cli;
pub mod core;
pub mod error;
