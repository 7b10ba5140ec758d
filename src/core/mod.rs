//! Core engine components.

pub mod backup;
pub mod compose;
pub mod configure;
pub mod domain;
pub mod env;
pub mod lock;
pub mod migrate;
pub mod proxy;
pub mod restore;
pub mod secrets;
pub mod settings;
pub mod tls;
