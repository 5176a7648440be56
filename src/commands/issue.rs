//! `new`: issue a certificate for one entry.

use super::export::{ExportOptions, ExportReport, export};
use super::{CommandContext, Target, finish_acme_run};
use crate::logging;
use crate::models::AcmeServer;
use crate::services::acme::IssueRequest;
use crate::services::credentials::CredentialError;
use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::Utc;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct IssueOptions {
    pub name: String,
    pub force: bool,
    pub export: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct IssueReport {
    pub entry: String,
    pub domains: Vec<String>,
    pub log_path: Utf8PathBuf,
    pub export: Option<ExportReport>,
}

/// Issue a certificate for the first entry named `options.name`.
///
/// Writes the provider credentials file, runs `certonly` with the DNS
/// authenticator, records a run log, and exports on success when asked.
pub async fn issue(ctx: &CommandContext, options: &IssueOptions) -> Result<IssueReport> {
    let entry = ctx.entry(&options.name)?;
    let provider = entry.provider().map_err(CredentialError::from)?;
    let (credentials_file, extra_env) = ctx.prepare_credentials(entry)?;

    let global = &ctx.runtime.config.global;
    let domains = entry.domains();
    let args = ctx.client.issue_args(&IssueRequest {
        domains: &domains,
        provider,
        credentials_file: &credentials_file,
        email: &global.email,
        staging: global.acme_server == AcmeServer::Staging,
        force: options.force,
    });

    let outcome = ctx
        .client
        .run(&args, &ctx.acme_paths(), &extra_env, options.verbose)
        .await?;
    let log_path = logging::new_run_logfile(&ctx.runtime.paths.log_dir, "new")?;

    let payload = json!({
        "ts": Utc::now().to_rfc3339(),
        "command": "new",
        "entry": entry.name,
        "domains": domains,
        "provider": provider.as_str(),
    });
    finish_acme_run("new", &log_path, payload, &outcome)?;

    tracing::info!("Issued certificate for entry '{}'", entry.name);

    let export = if options.export {
        Some(export(
            ctx,
            &ExportOptions {
                target: Target::Name(entry.name.clone()),
                overwrite: true,
            },
        )?)
    } else {
        None
    };

    Ok(IssueReport {
        entry: entry.name.clone(),
        domains,
        log_path,
        export,
    })
}
