//! `check`: classify certificate expiry and optionally fix what it finds.
//!
//! The run log carries the full result document. With `--fix`, missing
//! certificates are issued and force-renew ones renewed, each through the
//! same code path as the `new` and `renew` commands.

use super::issue::{IssueOptions, issue};
use super::renew::{RenewOptions, renew};
use super::{CommandContext, CommandError, Target};
use crate::logging;
use crate::models::{Classification, Entry};
use crate::services::certs::CertificateSource;
use crate::services::lifecycle::{
    self, Evaluation, FixAction, FixKind, FixOutcome, Thresholds, execute_fixes, plan_fixes,
};
use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub thresholds: Thresholds,
    pub name: Option<String>,
    pub fix: bool,
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub evaluation: Evaluation,
    pub fix: bool,
    pub fix_actions: Vec<FixAction>,
    pub fix_outcomes: Vec<FixOutcome>,
    pub log_path: Utf8PathBuf,
    /// The run-log document, also printed by `--json`.
    pub payload: Value,
}

impl CheckReport {
    /// 0/10/20/30 from the evaluation, before any fixes ran.
    pub fn exit_code(&self) -> i32 {
        self.evaluation.exit_code
    }

    /// Human-readable line per result.
    pub fn result_lines(&self) -> Vec<String> {
        self.evaluation
            .results
            .iter()
            .map(|r| match (r.status, r.days_left, r.not_after) {
                (Classification::Missing, _, _) | (_, None, _) | (_, _, None) => format!(
                    "[{}] {} {} cert={}",
                    r.status, r.entry, r.primary_domain, r.cert_path
                ),
                (status, Some(days_left), Some(not_after)) => format!(
                    "[{}] {} {} days_left={} not_after={}",
                    status,
                    r.entry,
                    r.primary_domain,
                    days_left,
                    not_after.to_rfc3339()
                ),
            })
            .collect()
    }

    /// Command lines equivalent to the planned fixes.
    pub fn fix_lines(&self) -> Vec<String> {
        self.fix_actions
            .iter()
            .map(|a| {
                let verb = match a.action {
                    FixKind::New => "new",
                    FixKind::Renew => "renew",
                };
                format!("- {} --name {} --force", verb, a.entry)
            })
            .collect()
    }

    pub fn ensure_fixes_succeeded(&self) -> Result<(), CommandError> {
        let failed = self.fix_outcomes.iter().filter(|o| !o.ok).count();
        if failed > 0 {
            return Err(CommandError::FixFailed {
                failed,
                total: self.fix_outcomes.len(),
                log_path: self.log_path.clone(),
            });
        }
        Ok(())
    }
}

/// Evaluate certificate expiry against the live directory.
pub async fn check(ctx: &CommandContext, options: &CheckOptions) -> Result<CheckReport> {
    check_with(ctx, &ctx.certificates(), options, Utc::now()).await
}

/// [`check`] with an explicit certificate source and clock.
///
/// With `options.fix`, missing certificates are issued and force-renew ones
/// renewed (forced, with export) after evaluation; every action runs even
/// when an earlier one fails. The run log is written last so it includes
/// fix outcomes.
pub async fn check_with<S>(
    ctx: &CommandContext,
    source: &S,
    options: &CheckOptions,
    now: DateTime<Utc>,
) -> Result<CheckReport>
where
    S: CertificateSource + ?Sized,
{
    let targets: Vec<Entry> = match &options.name {
        Some(name) => vec![ctx.entry(name)?.clone()],
        None => ctx.runtime.config.entries.clone(),
    };

    let evaluation = lifecycle::evaluate(&targets, source, options.thresholds, now)?;
    let log_path = logging::new_run_logfile(&ctx.runtime.paths.log_dir, "check")?;

    let (fix_actions, fix_outcomes) = if options.fix {
        let plan = plan_fixes(&evaluation.results);
        let outcomes = execute_fixes(&plan, |action| run_fix(ctx, action)).await;
        (plan, outcomes)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut payload = json!({
        "ts": now.to_rfc3339(),
        "warn_days": options.thresholds.warn_days,
        "force_renew_days": options.thresholds.force_renew_days,
        "results": evaluation.results,
        "fix": options.fix,
        "fix_actions": fix_actions,
        "exit_code": evaluation.exit_code,
    });
    if options.fix {
        payload["fix_results"] = serde_json::to_value(&fix_outcomes)?;
    }
    logging::write_command_log(&log_path, &payload)?;

    tracing::info!(
        "Checked {} entries, exit code {}",
        evaluation.results.len(),
        evaluation.exit_code
    );

    Ok(CheckReport {
        evaluation,
        fix: options.fix,
        fix_actions,
        fix_outcomes,
        log_path,
        payload,
    })
}

async fn run_fix(ctx: &CommandContext, action: FixAction) -> Result<()> {
    match action.action {
        FixKind::New => issue(
            ctx,
            &IssueOptions {
                name: action.entry,
                force: action.force,
                export: true,
                verbose: false,
            },
        )
        .await
        .map(|_| ()),
        FixKind::Renew => renew(
            ctx,
            &RenewOptions {
                target: Target::Name(action.entry),
                force: action.force,
                dry_run: false,
                export: true,
                verbose: false,
            },
        )
        .await
        .map(|_| ()),
    }
}
