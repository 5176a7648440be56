//! `renew`: renew one lineage or all of them through `certbot renew`.

use super::export::{ExportOptions, ExportReport, export};
use super::{CommandContext, Target, finish_acme_run};
use crate::logging;
use crate::services::acme::RenewRequest;
use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::Utc;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct RenewOptions {
    pub target: Target,
    pub force: bool,
    pub dry_run: bool,
    pub export: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct RenewReport {
    pub dry_run: bool,
    pub log_path: Utf8PathBuf,
    pub export: Option<ExportReport>,
}

/// Run `certbot renew` for one lineage or all of them.
///
/// certbot reuses the authenticator stored in each renewal config, so this
/// only refreshes credentials files (all entries for `--all`) before running.
pub async fn renew(ctx: &CommandContext, options: &RenewOptions) -> Result<RenewReport> {
    let mut extra_env = Vec::new();
    let cert_name = match &options.target {
        Target::All => {
            for entry in &ctx.runtime.config.entries {
                let (_, vars) = ctx.prepare_credentials(entry)?;
                merge_env(&mut extra_env, vars);
            }
            None
        }
        Target::Name(name) => {
            let entry = ctx.entry(name)?;
            let (_, vars) = ctx.prepare_credentials(entry)?;
            extra_env = vars;
            Some(entry.primary_domain.clone())
        }
    };

    let args = ctx.client.renew_args(&RenewRequest {
        cert_name: cert_name.as_deref(),
        force: options.force,
        dry_run: options.dry_run,
    });

    let outcome = ctx
        .client
        .run(&args, &ctx.acme_paths(), &extra_env, options.verbose)
        .await?;
    let log_path = logging::new_run_logfile(&ctx.runtime.paths.log_dir, "renew")?;

    let payload = json!({
        "ts": Utc::now().to_rfc3339(),
        "command": "renew",
        "args": args,
    });
    finish_acme_run("renew", &log_path, payload, &outcome)?;

    let export = if options.export && !options.dry_run {
        Some(export(
            ctx,
            &ExportOptions {
                target: options.target.clone(),
                overwrite: true,
            },
        )?)
    } else {
        None
    };

    Ok(RenewReport {
        dry_run: options.dry_run,
        log_path,
        export,
    })
}

/// Later values win; a conflicting value is logged.
fn merge_env(into: &mut Vec<(String, String)>, vars: Vec<(String, String)>) {
    for (key, value) in vars {
        match into.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) if existing.1 != value => {
                tracing::warn!("Multiple entries set {}, using {}", key, value);
                existing.1 = value;
            }
            Some(_) => {}
            None => into.push((key, value)),
        }
    }
}
