//! Dry-run counterpart of the credential resolver: collects every environment
//! key the configuration still needs instead of failing on the first one.

use super::credentials::{CredentialError, SecretValue, inline_values};
use crate::config::{Environment, lookup};
use crate::models::{AppConfig, Entry};
use std::collections::BTreeSet;

/// Missing environment keys across all entries, sorted.
///
/// An empty set means every entry is actionable. An unknown `dns_provider`
/// on any entry fails the whole call.
pub fn required_missing_keys(
    config: &AppConfig,
    env: &Environment,
) -> Result<BTreeSet<String>, CredentialError> {
    for entry in &config.entries {
        entry.provider()?;
    }

    let mut missing = BTreeSet::new();
    for entry in &config.entries {
        missing.extend(entry_missing_keys(entry, env)?);
    }
    Ok(missing)
}

/// Missing keys for one entry.
///
/// - unresolved `${NAME}` references are reported
/// - any literal value, or any unresolved reference, ends the check there
/// - entries without `account_id` are templates and need nothing
/// - otherwise the provider's account keys that are unset
pub fn entry_missing_keys(entry: &Entry, env: &Environment) -> Result<Vec<String>, CredentialError> {
    let provider = entry.provider()?;
    let values = inline_values(entry);

    let mut missing: Vec<String> = values
        .iter()
        .filter_map(|value| match value {
            SecretValue::Reference(name) if lookup(env, name).is_none() => Some(name.to_string()),
            _ => None,
        })
        .collect();

    let has_literal = values.iter().any(|value| !value.is_reference());
    if !missing.is_empty() || has_literal {
        return Ok(missing);
    }

    let Some(account) = entry.account() else {
        tracing::debug!("Entry '{}' has no credentials or account_id, skipping", entry.name);
        return Ok(missing);
    };

    missing.extend(
        provider
            .account_env_keys(account)
            .into_iter()
            .filter(|key| lookup(env, key).is_none()),
    );
    Ok(missing)
}
