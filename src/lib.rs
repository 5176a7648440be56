// certman - certbot orchestration for DNS-01 certificates
//
// This is the library crate containing configuration loading, credential
// resolution, certificate lifecycle logic, and command implementations.
// The binary crate (main.rs) provides the CLI entry point.

pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use commands::{CommandContext, CommandError};
pub use config::{ConfigError, Runtime};
pub use models::{AppConfig, Entry, GlobalSettings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
