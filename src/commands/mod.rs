//! Command implementations behind the CLI.
//!
//! Each command takes a [`CommandContext`] and returns a report value; the
//! binary decides how to print it. Commands that run certbot or evaluate
//! certificates also write a JSON run log into the log directory.
//!
//! Failures specific to command orchestration are [`CommandError`]; lower
//! layers' errors pass through `anyhow` unchanged so the binary can still
//! inspect them.

pub mod check;
pub mod export;
pub mod issue;
pub mod renew;

pub use check::{CheckOptions, CheckReport, check};
pub use export::{ExportOptions, ExportReport, export};
pub use issue::{IssueOptions, IssueReport, issue};
pub use renew::{RenewOptions, RenewReport, renew};

use crate::config::Runtime;
use crate::logging;
use crate::models::Entry;
use crate::services::acme::{AcmeClient, AcmeOutcome, AcmePaths};
use crate::services::certs::LiveCertificates;
use crate::services::credentials::{self, CredentialError};
use crate::services::secrets;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("must provide --all or --name")]
    MissingTarget,

    #[error("{command} failed with exit code {returncode} (log={log_path})")]
    AcmeFailed {
        command: String,
        returncode: i32,
        log_path: Utf8PathBuf,
        elevation_required: bool,
    },

    #[error("{failed} of {total} fix action(s) failed (log={log_path})")]
    FixFailed {
        failed: usize,
        total: usize,
        log_path: Utf8PathBuf,
    },
}

impl CommandError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AcmeFailed {
                elevation_required: true,
                ..
            } => 2,
            _ => 1,
        }
    }
}

/// Which entries a multi-entry command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Name(String),
}

impl Target {
    pub fn from_flags(all: bool, name: Option<String>) -> Result<Self, CommandError> {
        match (all, name) {
            (true, _) => Ok(Self::All),
            (false, Some(name)) => Ok(Self::Name(name)),
            (false, None) => Err(CommandError::MissingTarget),
        }
    }
}

/// Loaded runtime plus the ACME client configured for it.
pub struct CommandContext {
    pub runtime: Runtime,
    pub client: AcmeClient,
}

impl CommandContext {
    pub fn new(runtime: Runtime) -> Self {
        let client = AcmeClient::new(runtime.config.global.acme_client.clone());
        Self { runtime, client }
    }

    pub fn acme_paths(&self) -> AcmePaths {
        AcmePaths::from_paths(&self.runtime.paths)
    }

    pub fn certificates(&self) -> LiveCertificates {
        LiveCertificates::new(self.runtime.paths.acme_config_dir())
    }

    /// First entry named `name`.
    pub fn entry(&self, name: &str) -> Result<&Entry, CommandError> {
        self.runtime
            .config
            .find_entry(name)
            .ok_or_else(|| CommandError::EntryNotFound(name.to_string()))
    }

    /// Entries selected by `target`. A name selects only its first match.
    pub fn entries_for(&self, target: &Target) -> Result<Vec<&Entry>, CommandError> {
        match target {
            Target::All => Ok(self.runtime.config.entries.iter().collect()),
            Target::Name(name) => Ok(vec![self.entry(name)?]),
        }
    }

    /// Resolve credentials for `entry` and write its credentials file.
    ///
    /// Returns the file path and the extra environment the ACME subprocess
    /// needs for this provider.
    pub fn prepare_credentials(
        &self,
        entry: &Entry,
    ) -> Result<(Utf8PathBuf, Vec<(String, String)>), CredentialError> {
        let creds = credentials::resolve(entry, &self.runtime.env)?;
        let path = credentials::credentials_file_path(
            &self.runtime.paths.credentials_dir(),
            entry,
            creds.provider(),
        );
        credentials::write_credentials_file(&path, &creds)?;
        let env = creds.subprocess_env(&path);
        Ok((path, env))
    }
}

/// `hint` block added to run logs when certbot needs elevated privileges.
pub fn elevation_hint() -> Value {
    json!({
        "reason": "admin_required",
        "suggestions": [
            "Re-run in elevated (Administrator) shell",
            "Or use gsudo to elevate: gsudo <same command>",
            "Or switch to WSL runner (recommended on Windows)",
            "Or switch to docker-compose runner and mount /data",
        ],
    })
}

/// `certbot` block of a run log.
pub(crate) fn certbot_log(outcome: &AcmeOutcome) -> Value {
    json!({
        "returncode": outcome.returncode,
        "cmd": outcome.cmd,
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
    })
}

/// Write `payload` to the run log, adding a hint when relevant, and turn a
/// failed outcome into [`CommandError::AcmeFailed`].
pub(crate) fn finish_acme_run(
    command: &str,
    log_path: &Utf8Path,
    mut payload: Value,
    outcome: &AcmeOutcome,
) -> Result<()> {
    payload["certbot"] = certbot_log(outcome);
    if !outcome.ok() && outcome.elevation_required {
        payload["hint"] = elevation_hint();
    }
    logging::write_command_log(log_path, &payload)?;

    if !outcome.ok() {
        return Err(CommandError::AcmeFailed {
            command: command.to_string(),
            returncode: outcome.returncode,
            log_path: log_path.to_path_buf(),
            elevation_required: outcome.elevation_required,
        }
        .into());
    }
    Ok(())
}

/// Fail with every missing environment key when the configuration isn't
/// actionable.
pub fn config_validate(ctx: &CommandContext) -> Result<()> {
    let missing = secrets::required_missing_keys(&ctx.runtime.config, &ctx.runtime.env)?;
    if !missing.is_empty() {
        return Err(CredentialError::MissingEnvironmentVariable(missing.into_iter().collect()).into());
    }
    tracing::info!(
        "Configuration valid: {} entries from {}",
        ctx.runtime.config.entries.len(),
        ctx.runtime.config_path
    );
    Ok(())
}

/// One listing line per entry, in configuration order.
pub fn entries(ctx: &CommandContext) -> Vec<String> {
    ctx.runtime
        .config
        .entries
        .iter()
        .map(|entry| {
            format!(
                "{}\tprovider={}\tprimary={}\tdomains={}",
                entry.name,
                entry.dns_provider,
                entry.primary_domain,
                entry.domains().join(",")
            )
        })
        .collect()
}

/// Remove run logs older than `keep_days`.
pub fn logs_clean(ctx: &CommandContext, keep_days: u32) -> Result<usize> {
    logging::cleanup_logs(&ctx.runtime.paths.log_dir, keep_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, Paths};
    use crate::models::{AppConfig, CredentialSpec, GlobalSettings};

    fn entry(name: &str, primary: &str) -> Entry {
        Entry {
            name: name.to_string(),
            description: String::new(),
            primary_domain: primary.to_string(),
            secondary_domains: vec!["www.".to_string() + primary],
            wildcard: false,
            dns_provider: "cloudflare".to_string(),
            account_id: Some("cf".to_string()),
            credentials: CredentialSpec::default(),
        }
    }

    fn context(entries: Vec<Entry>, env: Environment) -> CommandContext {
        let global = GlobalSettings::default();
        CommandContext::new(Runtime {
            paths: Paths::new(Utf8Path::new("/data"), &global),
            config: AppConfig { global, entries },
            env,
            config_path: Utf8PathBuf::from("/data/conf/config.toml"),
        })
    }

    #[test]
    fn test_target_from_flags() {
        assert_eq!(Target::from_flags(true, None).unwrap(), Target::All);
        assert_eq!(
            Target::from_flags(false, Some("a".to_string())).unwrap(),
            Target::Name("a".to_string())
        );
        assert!(matches!(
            Target::from_flags(false, None),
            Err(CommandError::MissingTarget)
        ));
    }

    #[test]
    fn test_entry_lookup_returns_first_match() {
        let ctx = context(
            vec![entry("a", "first.test"), entry("a", "second.test")],
            Environment::new(),
        );
        assert_eq!(ctx.entry("a").unwrap().primary_domain, "first.test");
        assert!(matches!(ctx.entry("zzz"), Err(CommandError::EntryNotFound(n)) if n == "zzz"));
        assert_eq!(ctx.entries_for(&Target::All).unwrap().len(), 2);
    }

    #[test]
    fn test_entries_listing_format() {
        let ctx = context(vec![entry("site", "a.test")], Environment::new());
        assert_eq!(
            entries(&ctx),
            vec!["site\tprovider=cloudflare\tprimary=a.test\tdomains=a.test,www.a.test"]
        );
    }

    #[test]
    fn test_config_validate_reports_missing_keys() {
        let ctx = context(vec![entry("site", "a.test")], Environment::new());
        let err = config_validate(&ctx).unwrap_err();
        match err.downcast_ref::<CredentialError>() {
            Some(CredentialError::MissingEnvironmentVariable(keys)) => {
                assert_eq!(keys, &vec!["CERTMAN_CLOUDFLARE_cf_API_TOKEN".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let env = Environment::from([(
            "CERTMAN_CLOUDFLARE_cf_API_TOKEN".to_string(),
            "token".to_string(),
        )]);
        assert!(config_validate(&context(vec![entry("site", "a.test")], env)).is_ok());
    }

    #[test]
    fn test_exit_code_for_elevation() {
        let err = CommandError::AcmeFailed {
            command: "new".to_string(),
            returncode: 1,
            log_path: Utf8PathBuf::from("x.log"),
            elevation_required: true,
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(CommandError::MissingTarget.exit_code(), 1);
    }
}
