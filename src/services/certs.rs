//! Certificate expiry lookup.

use crate::models::{CertificateStatus, Entry};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use std::fs;
use thiserror::Error;
use x509_parser::pem::parse_x509_pem;

/// File certbot keeps the leaf certificate in.
pub const CERT_FILE: &str = "cert.pem";

#[derive(Error, Debug)]
pub enum CertError {
    #[error("failed to read certificate {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM in {path}: {reason}")]
    Pem { path: Utf8PathBuf, reason: String },

    #[error("invalid X.509 certificate in {path}: {reason}")]
    X509 { path: Utf8PathBuf, reason: String },

    #[error("notAfter out of range in {0}")]
    Timestamp(Utf8PathBuf),
}

/// Read the "not valid after" instant of the first certificate in a PEM file.
pub fn read_not_after(cert_pem_path: &Utf8Path) -> Result<DateTime<Utc>, CertError> {
    let data = fs::read(cert_pem_path).map_err(|source| CertError::Io {
        path: cert_pem_path.to_path_buf(),
        source,
    })?;

    let (_, pem) = parse_x509_pem(&data).map_err(|e| CertError::Pem {
        path: cert_pem_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let cert = pem.parse_x509().map_err(|e| CertError::X509 {
        path: cert_pem_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let timestamp = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| CertError::Timestamp(cert_pem_path.to_path_buf()))
}

/// Where the lifecycle engine gets certificate status from.
#[cfg_attr(test, mockall::automock)]
pub trait CertificateSource {
    /// Path checked for `entry`, reported in results.
    fn cert_path(&self, entry: &Entry) -> Utf8PathBuf;

    /// `Ok(None)` when no certificate exists for `entry`.
    fn status(&self, entry: &Entry) -> Result<Option<CertificateStatus>, CertError>;
}

/// Certificates in certbot's live directory: `<config_dir>/live/<primary>/cert.pem`.
#[derive(Debug, Clone)]
pub struct LiveCertificates {
    acme_config_dir: Utf8PathBuf,
}

impl LiveCertificates {
    pub fn new(acme_config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            acme_config_dir: acme_config_dir.into(),
        }
    }
}

impl CertificateSource for LiveCertificates {
    fn cert_path(&self, entry: &Entry) -> Utf8PathBuf {
        self.acme_config_dir
            .join("live")
            .join(&entry.primary_domain)
            .join(CERT_FILE)
    }

    fn status(&self, entry: &Entry) -> Result<Option<CertificateStatus>, CertError> {
        let path = self.cert_path(entry);
        if !path.exists() {
            tracing::debug!("No certificate at {}", path);
            return Ok(None);
        }
        read_not_after(&path).map(|not_after| Some(CertificateStatus::new(not_after)))
    }
}
