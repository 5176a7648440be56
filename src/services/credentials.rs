//! Provider credential resolution for one entry.
//!
//! Precedence, first match wins:
//! 1. inline credentials covering the provider's explicit fields, each a
//!    literal or a `${ENV_VAR}` reference
//! 2. `account_id`, read through the `CERTMAN_<PROVIDER>_<id>_<FIELD>`
//!    convention
//! 3. otherwise a [`CredentialError::CredentialConfiguration`] error

use crate::config::{Environment, lookup};
use crate::models::{DnsProvider, Entry, UnknownProvider};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("missing environment variable(s): {}", .0.join(", "))]
    MissingEnvironmentVariable(Vec<String>),

    #[error("entry '{0}' has neither credentials nor account_id")]
    CredentialConfiguration(String),

    #[error("unsupported dns_provider: {0}")]
    UnsupportedProvider(String),

    #[error("failed to write credentials file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<UnknownProvider> for CredentialError {
    fn from(err: UnknownProvider) -> Self {
        Self::UnsupportedProvider(err.0)
    }
}

/// A configured credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretValue<'a> {
    Literal(&'a str),
    /// `${NAME}`, holding `NAME`.
    Reference(&'a str),
}

impl<'a> SecretValue<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let value = raw.trim();
        match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            Some(name) if !name.trim().is_empty() => Self::Reference(name.trim()),
            _ => Self::Literal(value),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    pub fn resolve(&self, env: &Environment) -> Result<String, CredentialError> {
        match self {
            Self::Literal(value) => Ok((*value).to_string()),
            Self::Reference(name) => lookup(env, name).map(str::to_string).ok_or_else(|| {
                CredentialError::MissingEnvironmentVariable(vec![(*name).to_string()])
            }),
        }
    }
}

/// Concrete credentials handed to the ACME client's DNS plugin.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedCredentials {
    Cloudflare {
        api_token: String,
    },
    Route53 {
        access_key_id: String,
        secret_access_key: String,
        region: Option<String>,
    },
    Aliyun {
        access_key_id: String,
        access_key_secret: String,
    },
}

// Secrets stay out of logs.
impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("provider", &self.provider())
            .finish_non_exhaustive()
    }
}

impl ResolvedCredentials {
    pub fn provider(&self) -> DnsProvider {
        match self {
            Self::Cloudflare { .. } => DnsProvider::Cloudflare,
            Self::Route53 { .. } => DnsProvider::Route53,
            Self::Aliyun { .. } => DnsProvider::Aliyun,
        }
    }

    /// Contents of the provider-specific credentials file.
    pub fn render(&self) -> String {
        match self {
            Self::Cloudflare { api_token } => format!("dns_cloudflare_api_token = {api_token}\n"),
            Self::Route53 {
                access_key_id,
                secret_access_key,
                region,
            } => {
                let mut out = format!(
                    "[default]\naws_access_key_id = {access_key_id}\naws_secret_access_key = {secret_access_key}\n"
                );
                if let Some(region) = region {
                    out.push_str(&format!("region = {region}\n"));
                }
                out
            }
            Self::Aliyun {
                access_key_id,
                access_key_secret,
            } => format!(
                "dns_aliyun_access_key = {access_key_id}\ndns_aliyun_access_key_secret = {access_key_secret}\n"
            ),
        }
    }

    /// Extra environment for the ACME subprocess when the plugin has no
    /// credentials flag.
    pub fn subprocess_env(&self, credentials_file: &Utf8Path) -> Vec<(String, String)> {
        match self {
            Self::Route53 { region, .. } => {
                let mut vars = vec![(
                    "AWS_SHARED_CREDENTIALS_FILE".to_string(),
                    credentials_file.to_string(),
                )];
                if let Some(region) = region {
                    vars.push(("AWS_DEFAULT_REGION".to_string(), region.clone()));
                }
                vars
            }
            Self::Cloudflare { .. } | Self::Aliyun { .. } => Vec::new(),
        }
    }
}

/// Resolve concrete credentials for `entry`.
pub fn resolve(entry: &Entry, env: &Environment) -> Result<ResolvedCredentials, CredentialError> {
    let provider = entry.provider()?;

    let explicit: Option<Vec<SecretValue<'_>>> = provider
        .explicit_fields()
        .iter()
        .map(|field| entry.credentials.get(*field).map(SecretValue::parse))
        .collect();

    if let Some(values) = explicit {
        let resolved = values
            .iter()
            .map(|value| value.resolve(env))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Using inline credentials for entry '{}'", entry.name);
        return Ok(from_explicit(provider, resolved));
    }

    if let Some(account) = entry.account() {
        tracing::debug!(
            "Using account '{}' credentials for entry '{}'",
            account,
            entry.name
        );
        return resolve_account(provider, account, env);
    }

    Err(CredentialError::CredentialConfiguration(entry.name.clone()))
}

fn from_explicit(provider: DnsProvider, values: Vec<String>) -> ResolvedCredentials {
    let mut values = values.into_iter();
    let mut next = || values.next().unwrap_or_default();
    match provider {
        DnsProvider::Cloudflare => ResolvedCredentials::Cloudflare { api_token: next() },
        DnsProvider::Route53 => ResolvedCredentials::Route53 {
            access_key_id: next(),
            secret_access_key: next(),
            region: None,
        },
        DnsProvider::Aliyun => ResolvedCredentials::Aliyun {
            access_key_id: next(),
            access_key_secret: next(),
        },
    }
}

fn resolve_account(
    provider: DnsProvider,
    account: &str,
    env: &Environment,
) -> Result<ResolvedCredentials, CredentialError> {
    let keys = provider.account_env_keys(account);
    let missing: Vec<String> = keys
        .iter()
        .filter(|key| lookup(env, key).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CredentialError::MissingEnvironmentVariable(missing));
    }

    let mut values = keys
        .iter()
        .map(|key| lookup(env, key).unwrap_or_default().to_string());
    let mut next = || values.next().unwrap_or_default();

    Ok(match provider {
        DnsProvider::Cloudflare => ResolvedCredentials::Cloudflare { api_token: next() },
        DnsProvider::Route53 => ResolvedCredentials::Route53 {
            access_key_id: next(),
            secret_access_key: next(),
            region: Some(next()),
        },
        DnsProvider::Aliyun => ResolvedCredentials::Aliyun {
            access_key_id: next(),
            access_key_secret: next(),
        },
    })
}

/// `<credentials_dir>/<provider>_<account_id or entry name>.ini`
pub fn credentials_file_path(credentials_dir: &Utf8Path, entry: &Entry, provider: DnsProvider) -> Utf8PathBuf {
    let owner = entry.account().unwrap_or(&entry.name);
    credentials_dir.join(format!("{}_{}.ini", provider.as_str(), owner))
}

/// Write `creds` to `path`, restricting it to the owner where supported.
pub fn write_credentials_file(path: &Utf8Path, creds: &ResolvedCredentials) -> Result<(), CredentialError> {
    let io_err = |source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, creds.render()).map_err(io_err)?;
    restrict_permissions(path);

    tracing::debug!("Wrote {} credentials to {}", creds.provider(), path);
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Utf8Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::debug!("Could not restrict permissions on {}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Utf8Path) {}

/// The credential fields `entry` carries inline, parsed.
pub fn inline_values(entry: &Entry) -> Vec<SecretValue<'_>> {
    entry.credentials.populated().map(SecretValue::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CredentialSpec;

    fn aliyun_entry() -> Entry {
        Entry {
            name: "site".to_string(),
            description: String::new(),
            primary_domain: "a.test".to_string(),
            secondary_domains: Vec::new(),
            wildcard: true,
            dns_provider: "aliyun".to_string(),
            account_id: None,
            credentials: CredentialSpec::default(),
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_secret_value_parse() {
        assert_eq!(SecretValue::parse("plain"), SecretValue::Literal("plain"));
        assert_eq!(SecretValue::parse(" ${ AK } "), SecretValue::Reference("AK"));
        assert_eq!(SecretValue::parse("${}"), SecretValue::Literal("${}"));
        assert_eq!(SecretValue::parse("$AK"), SecretValue::Literal("$AK"));
    }

    #[test]
    fn test_inline_literal_and_reference() {
        let mut entry = aliyun_entry();
        entry.credentials.access_key_id = Some("literal-ak".to_string());
        entry.credentials.access_key_secret = Some("${SK}".to_string());

        let creds = resolve(&entry, &env(&[("SK", "secret")])).unwrap();
        assert_eq!(
            creds,
            ResolvedCredentials::Aliyun {
                access_key_id: "literal-ak".to_string(),
                access_key_secret: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_inline_reference_missing_or_empty() {
        let mut entry = aliyun_entry();
        entry.credentials.access_key_id = Some("ak".to_string());
        entry.credentials.access_key_secret = Some("${SK}".to_string());

        for environment in [env(&[]), env(&[("SK", "")])] {
            match resolve(&entry, &environment) {
                Err(CredentialError::MissingEnvironmentVariable(names)) => {
                    assert_eq!(names, vec!["SK".to_string()])
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn test_inline_takes_precedence_over_account() {
        let mut entry = aliyun_entry();
        entry.account_id = Some("main".to_string());
        entry.credentials.access_key_id = Some("inline-ak".to_string());
        entry.credentials.access_key_secret = Some("inline-sk".to_string());

        let creds = resolve(&entry, &env(&[])).unwrap();
        assert!(matches!(
            creds,
            ResolvedCredentials::Aliyun { ref access_key_id, .. } if access_key_id == "inline-ak"
        ));
    }

    #[test]
    fn test_partial_inline_falls_through_to_account() {
        let mut entry = aliyun_entry();
        entry.account_id = Some("main".to_string());
        entry.credentials.access_key_id = Some("only-id".to_string());

        let creds = resolve(
            &entry,
            &env(&[
                ("CERTMAN_ALIYUN_main_ACCESS_KEY_ID", "env-ak"),
                ("CERTMAN_ALIYUN_main_ACCESS_KEY_SECRET", "env-sk"),
            ]),
        )
        .unwrap();
        assert_eq!(
            creds,
            ResolvedCredentials::Aliyun {
                access_key_id: "env-ak".to_string(),
                access_key_secret: "env-sk".to_string(),
            }
        );
    }

    #[test]
    fn test_account_reports_all_missing_names() {
        let mut entry = aliyun_entry();
        entry.account_id = Some("main".to_string());

        match resolve(&entry, &env(&[])) {
            Err(CredentialError::MissingEnvironmentVariable(names)) => assert_eq!(
                names,
                vec![
                    "CERTMAN_ALIYUN_main_ACCESS_KEY_ID".to_string(),
                    "CERTMAN_ALIYUN_main_ACCESS_KEY_SECRET".to_string(),
                ]
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_route53_account_includes_region() {
        let mut entry = aliyun_entry();
        entry.dns_provider = "route53".to_string();
        entry.account_id = Some("ops".to_string());

        let creds = resolve(
            &entry,
            &env(&[
                ("CERTMAN_AWS_ops_ACCESS_KEY_ID", "AKIA"),
                ("CERTMAN_AWS_ops_SECRET_ACCESS_KEY", "sk"),
                ("CERTMAN_AWS_ops_REGION", "us-east-1"),
            ]),
        )
        .unwrap();

        let vars = creds.subprocess_env(Utf8Path::new("/run/credentials/route53_ops.ini"));
        assert_eq!(
            vars,
            vec![
                (
                    "AWS_SHARED_CREDENTIALS_FILE".to_string(),
                    "/run/credentials/route53_ops.ini".to_string()
                ),
                ("AWS_DEFAULT_REGION".to_string(), "us-east-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_cloudflare_inline_token() {
        let mut entry = aliyun_entry();
        entry.dns_provider = "cloudflare".to_string();
        entry.credentials.api_token = Some("${CF_TOKEN}".to_string());

        let creds = resolve(&entry, &env(&[("CF_TOKEN", "tok")])).unwrap();
        assert_eq!(creds.render(), "dns_cloudflare_api_token = tok\n");
    }

    #[test]
    fn test_no_credentials_no_account() {
        let entry = aliyun_entry();
        assert!(matches!(
            resolve(&entry, &env(&[])),
            Err(CredentialError::CredentialConfiguration(name)) if name == "site"
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let mut entry = aliyun_entry();
        entry.dns_provider = "gandi".to_string();
        assert!(matches!(
            resolve(&entry, &env(&[])),
            Err(CredentialError::UnsupportedProvider(name)) if name == "gandi"
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = ResolvedCredentials::Aliyun {
            access_key_id: "ak".to_string(),
            access_key_secret: "very-secret".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("Aliyun"));
    }

    #[test]
    fn test_credentials_file_path() {
        let mut entry = aliyun_entry();
        let dir = Utf8Path::new("/data/run/credentials");
        assert_eq!(
            credentials_file_path(dir, &entry, DnsProvider::Aliyun),
            Utf8PathBuf::from("/data/run/credentials/aliyun_site.ini")
        );
        entry.account_id = Some("main".to_string());
        assert_eq!(
            credentials_file_path(dir, &entry, DnsProvider::Aliyun),
            Utf8PathBuf::from("/data/run/credentials/aliyun_main.ini")
        );
    }
}
