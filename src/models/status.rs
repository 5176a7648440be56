use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Expiry information for one issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateStatus {
    pub not_after: DateTime<Utc>,
}

impl CertificateStatus {
    pub fn new(not_after: DateTime<Utc>) -> Self {
        Self { not_after }
    }

    /// Whole days until expiry, floored. Negative once expired.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
    }
}

/// Per-entry outcome of a check run, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Ok,
    Warn,
    ForceRenew,
    Missing,
}

impl Classification {
    /// Process exit code contributed by this classification.
    pub fn weight(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warn => 10,
            Self::ForceRenew => 20,
            Self::Missing => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::ForceRenew => "force-renew",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result row for one evaluated entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryResult {
    pub entry: String,
    pub primary_domain: String,
    pub status: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    pub cert_path: Utf8PathBuf,
}
