//! Data models for certman.
//!
//! - [`AppConfig`]: the merged configuration (global settings + entries) built by
//!   [`crate::config::load_merged_config`]
//! - [`Entry`]: one domain set bound to a DNS provider, with optional inline
//!   [`CredentialSpec`] or an `account_id` reference
//! - [`DnsProvider`]: the closed set of supported providers and their
//!   environment naming conventions
//! - [`CertificateStatus`], [`Classification`], [`EntryResult`]: check-run
//!   values produced by [`crate::services::lifecycle`]
//!
//! Config structs derive `Serialize`/`Deserialize`; TOML and YAML documents
//! both deserialize into the same types.

pub mod config;
pub mod provider;
pub mod status;

pub use config::{
    AcmeServer, AppConfig, CredentialSpec, Entry, GlobalOnlyConfig, GlobalSettings,
    DEFAULT_SCAN_ITEMS_GLOB,
};
pub use provider::{CredentialField, DnsProvider, UnknownProvider, ENV_PREFIX};
pub use status::{CertificateStatus, Classification, EntryResult};
