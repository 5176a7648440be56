use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every account-convention environment variable.
pub const ENV_PREFIX: &str = "CERTMAN";

/// DNS providers with a certbot DNS-01 authenticator plugin.
///
/// Each variant owns its environment naming convention and the shape of the
/// credentials it needs, so adding a provider means adding a variant here plus
/// a renderer in [`crate::services::credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsProvider {
    Cloudflare,
    Route53,
    Aliyun,
}

/// A credential field an entry can carry inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    AccessKeyId,
    AccessKeySecret,
    ApiToken,
}

impl DnsProvider {
    pub const ALL: [DnsProvider; 3] = [Self::Cloudflare, Self::Route53, Self::Aliyun];

    /// Name used in config files and certbot plugin names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloudflare => "cloudflare",
            Self::Route53 => "route53",
            Self::Aliyun => "aliyun",
        }
    }

    /// Segment used in account-convention variable names.
    ///
    /// Route53 keys live under `AWS` rather than the provider name.
    pub fn env_segment(&self) -> &'static str {
        match self {
            Self::Cloudflare => "CLOUDFLARE",
            Self::Route53 => "AWS",
            Self::Aliyun => "ALIYUN",
        }
    }

    /// Field suffixes of the account-convention variables, in resolution order.
    pub fn account_key_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Cloudflare => &["API_TOKEN"],
            Self::Route53 => &["ACCESS_KEY_ID", "SECRET_ACCESS_KEY", "REGION"],
            Self::Aliyun => &["ACCESS_KEY_ID", "ACCESS_KEY_SECRET"],
        }
    }

    /// Full environment variable names required for `account_id`.
    ///
    /// `{PREFIX}_{SEGMENT}_{account_id}_{FIELD}`, e.g.
    /// `CERTMAN_ALIYUN_main_ACCESS_KEY_ID`.
    pub fn account_env_keys(&self, account_id: &str) -> Vec<String> {
        self.account_key_fields()
            .iter()
            .map(|field| format!("{}_{}_{}_{}", ENV_PREFIX, self.env_segment(), account_id, field))
            .collect()
    }

    /// Inline credential fields that together make an entry self-sufficient.
    pub fn explicit_fields(&self) -> &'static [CredentialField] {
        match self {
            Self::Cloudflare => &[CredentialField::ApiToken],
            Self::Route53 | Self::Aliyun => {
                &[CredentialField::AccessKeyId, CredentialField::AccessKeySecret]
            }
        }
    }

    /// certbot authenticator name (`dns-<provider>`).
    pub fn authenticator(&self) -> String {
        format!("dns-{}", self.as_str())
    }

    /// certbot flag taking a credentials file, if the plugin has one.
    ///
    /// certbot-dns-route53 reads the AWS shared credentials file instead.
    pub fn credentials_flag(&self) -> Option<String> {
        match self {
            Self::Cloudflare | Self::Aliyun => Some(format!("--dns-{}-credentials", self.as_str())),
            Self::Route53 => None,
        }
    }
}

impl fmt::Display for DnsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider name is not one of [`DnsProvider::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported dns_provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for DnsProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloudflare" => Ok(Self::Cloudflare),
            "route53" => Ok(Self::Route53),
            "aliyun" => Ok(Self::Aliyun),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Aliyun".parse::<DnsProvider>().unwrap(), DnsProvider::Aliyun);
        assert_eq!("ROUTE53".parse::<DnsProvider>().unwrap(), DnsProvider::Route53);
        assert_eq!(
            "gandi".parse::<DnsProvider>().unwrap_err(),
            UnknownProvider("gandi".to_string())
        );
    }

    #[test]
    fn test_account_env_keys() {
        assert_eq!(
            DnsProvider::Aliyun.account_env_keys("main"),
            vec![
                "CERTMAN_ALIYUN_main_ACCESS_KEY_ID".to_string(),
                "CERTMAN_ALIYUN_main_ACCESS_KEY_SECRET".to_string(),
            ]
        );
        assert_eq!(
            DnsProvider::Route53.account_env_keys("ops"),
            vec![
                "CERTMAN_AWS_ops_ACCESS_KEY_ID".to_string(),
                "CERTMAN_AWS_ops_SECRET_ACCESS_KEY".to_string(),
                "CERTMAN_AWS_ops_REGION".to_string(),
            ]
        );
        assert_eq!(
            DnsProvider::Cloudflare.account_env_keys("cf"),
            vec!["CERTMAN_CLOUDFLARE_cf_API_TOKEN".to_string()]
        );
    }

    #[test]
    fn test_certbot_plugin_names() {
        assert_eq!(DnsProvider::Aliyun.authenticator(), "dns-aliyun");
        assert_eq!(
            DnsProvider::Cloudflare.credentials_flag().as_deref(),
            Some("--dns-cloudflare-credentials")
        );
        assert!(DnsProvider::Route53.credentials_flag().is_none());
    }
}
