//! Services module - certificate operations independent of the CLI.
//!
//! - [`credentials`]: resolve DNS provider credentials and write credentials files
//! - [`secrets`]: report which environment keys the configuration still needs
//! - [`certs`]: read certificate expiry from certbot's live directory
//! - [`lifecycle`]: classify certificates and plan/execute fixes
//! - [`acme`]: build and run certbot invocations
//! - [`exporter`]: copy issued certificates to the output directory

pub mod acme;
pub mod certs;
pub mod credentials;
pub mod exporter;
pub mod lifecycle;
pub mod secrets;

pub use acme::{AcmeClient, AcmeError, AcmeOutcome, AcmePaths, IssueRequest, RenewRequest};
pub use certs::{CertError, CertificateSource, LiveCertificates, read_not_after};
pub use credentials::{CredentialError, ResolvedCredentials, SecretValue};
pub use exporter::{EXPORT_FILES, ExportError, export_entry};
pub use lifecycle::{
    Evaluation, FixAction, FixKind, FixOutcome, FixReason, Thresholds, evaluate, execute_fixes,
    plan_fixes,
};
pub use secrets::{entry_missing_keys, required_missing_keys};
