use crate::models::provider::{CredentialField, DnsProvider, UnknownProvider};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Default glob for sibling item files next to the global config.
pub const DEFAULT_SCAN_ITEMS_GLOB: &str = "item_*";

/// Global settings from the `[global]` section.
///
/// Every field has a default, so the section may be omitted entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Overrides the base data directory when set.
    pub data_dir: Option<String>,
    pub conf_dir: String,
    pub run_dir: String,
    pub log_dir: String,
    pub output_dir: String,
    /// certbot state directory, relative to `run_dir`.
    pub letsencrypt_dir: String,

    pub acme_server: AcmeServer,
    pub email: String,

    /// ACME client executable.
    pub acme_client: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            conf_dir: "conf".to_string(),
            run_dir: "run".to_string(),
            log_dir: "log".to_string(),
            output_dir: "output".to_string(),
            letsencrypt_dir: "letsencrypt".to_string(),
            acme_server: AcmeServer::Staging,
            email: "admin@example.com".to_string(),
            acme_client: "certbot".to_string(),
        }
    }
}

/// ACME directory the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcmeServer {
    #[default]
    Staging,
    Prod,
}

/// Inline credentials: literal values or `${ENV_VAR}` references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSpec {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub api_token: Option<String>,
}

impl CredentialSpec {
    pub fn get(&self, field: CredentialField) -> Option<&str> {
        let value = match field {
            CredentialField::AccessKeyId => self.access_key_id.as_deref(),
            CredentialField::AccessKeySecret => self.access_key_secret.as_deref(),
            CredentialField::ApiToken => self.api_token.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Populated fields in declaration order.
    pub fn populated(&self) -> impl Iterator<Item = &str> {
        [
            CredentialField::AccessKeyId,
            CredentialField::AccessKeySecret,
            CredentialField::ApiToken,
        ]
        .into_iter()
        .filter_map(move |field| self.get(field))
    }
}

/// One configured domain set bound to a DNS provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub primary_domain: String,

    #[serde(default)]
    pub secondary_domains: Vec<String>,

    #[serde(default = "default_wildcard")]
    pub wildcard: bool,

    /// Kept as written; see [`Entry::provider`].
    pub dns_provider: String,

    /// References an account in the environment (`CERTMAN_<PROVIDER>_<id>_*`).
    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub credentials: CredentialSpec,
}

fn default_wildcard() -> bool {
    true
}

impl Entry {
    pub fn provider(&self) -> Result<DnsProvider, UnknownProvider> {
        self.dns_provider.parse()
    }

    /// Account id, treating an empty string as unset.
    pub fn account(&self) -> Option<&str> {
        self.account_id.as_deref().filter(|a| !a.is_empty())
    }

    /// Domains to request: primary, secondaries, then `*.primary` if wildcard.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: IndexSet<String> = IndexSet::new();
        domains.insert(self.primary_domain.clone());
        domains.extend(self.secondary_domains.iter().cloned());
        if self.wildcard {
            domains.insert(format!("*.{}", self.primary_domain));
        }
        domains.into_iter().collect()
    }
}

/// The merged configuration: global settings plus every discovered entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "global", default)]
    pub global: GlobalSettings,

    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl AppConfig {
    /// First entry with `name`; later duplicates are never selected.
    pub fn find_entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Lighter view of the global config file, used only for item discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalOnlyConfig {
    #[serde(default = "default_scan_items_glob")]
    pub scan_items_glob: String,
}

fn default_scan_items_glob() -> String {
    DEFAULT_SCAN_ITEMS_GLOB.to_string()
}
