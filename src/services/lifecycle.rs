//! Certificate lifecycle decisions for the `check` command.
//!
//! [`evaluate`] classifies every entry and computes the worst-case exit code;
//! [`plan_fixes`] turns `missing` / `force-renew` results into remediation
//! actions, and [`execute_fixes`] runs them in order through a caller-supplied
//! executor.

use super::certs::{CertError, CertificateSource};
use crate::models::{Classification, Entry, EntryResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;

/// Day thresholds for classification. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub warn_days: i64,
    pub force_renew_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn_days: 30,
            force_renew_days: 7,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, days_left: i64) -> Classification {
        if days_left <= self.force_renew_days {
            Classification::ForceRenew
        } else if days_left <= self.warn_days {
            Classification::Warn
        } else {
            Classification::Ok
        }
    }
}

/// Per-entry results in input order plus the aggregate exit code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub results: Vec<EntryResult>,
    pub exit_code: i32,
}

/// Worst weight across `results`; 0 when empty.
pub fn exit_code(results: &[EntryResult]) -> i32 {
    results
        .iter()
        .map(|r| r.status.weight())
        .max()
        .unwrap_or(0)
}

/// Classify each entry's certificate.
///
/// A missing certificate is a classification, never an error. A certificate
/// that exists but cannot be read aborts the evaluation.
pub fn evaluate<S>(
    entries: &[Entry],
    source: &S,
    thresholds: Thresholds,
    now: DateTime<Utc>,
) -> Result<Evaluation, CertError>
where
    S: CertificateSource + ?Sized,
{
    let mut results = Vec::with_capacity(entries.len());

    for entry in entries {
        let cert_path = source.cert_path(entry);
        let result = match source.status(entry)? {
            None => EntryResult {
                entry: entry.name.clone(),
                primary_domain: entry.primary_domain.clone(),
                status: Classification::Missing,
                days_left: None,
                not_after: None,
                cert_path,
            },
            Some(status) => {
                let days_left = status.days_left(now);
                EntryResult {
                    entry: entry.name.clone(),
                    primary_domain: entry.primary_domain.clone(),
                    status: thresholds.classify(days_left),
                    days_left: Some(days_left),
                    not_after: Some(status.not_after),
                    cert_path,
                }
            }
        };

        tracing::debug!(
            "Entry '{}' classified as {} (days_left={:?})",
            result.entry,
            result.status,
            result.days_left
        );
        results.push(result);
    }

    let exit_code = exit_code(&results);
    Ok(Evaluation { results, exit_code })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    New,
    Renew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixReason {
    Missing,
    ExpiresSoon,
}

/// A planned remediation for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixAction {
    pub entry: String,
    pub action: FixKind,
    pub force: bool,
    pub reason: FixReason,
}

/// Plan forced `new` for missing certificates and forced `renew` for
/// force-renew ones, in result order.
pub fn plan_fixes(results: &[EntryResult]) -> Vec<FixAction> {
    results
        .iter()
        .filter_map(|r| {
            let (action, reason) = match r.status {
                Classification::Missing => (FixKind::New, FixReason::Missing),
                Classification::ForceRenew => (FixKind::Renew, FixReason::ExpiresSoon),
                Classification::Ok | Classification::Warn => return None,
            };
            Some(FixAction {
                entry: r.entry.clone(),
                action,
                force: true,
                reason,
            })
        })
        .collect()
}

/// Outcome of one executed fix action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixOutcome {
    #[serde(flatten)]
    pub action: FixAction,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run every action in order. A failed action is recorded and does not stop
/// the ones after it.
pub async fn execute_fixes<F, Fut>(plan: &[FixAction], mut executor: F) -> Vec<FixOutcome>
where
    F: FnMut(FixAction) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut outcomes = Vec::with_capacity(plan.len());

    for action in plan {
        tracing::info!(
            "Running fix {:?} for entry '{}' ({:?})",
            action.action,
            action.entry,
            action.reason
        );
        let outcome = match executor(action.clone()).await {
            Ok(()) => FixOutcome {
                action: action.clone(),
                ok: true,
                error: None,
            },
            Err(e) => {
                tracing::error!("Fix for entry '{}' failed: {:#}", action.entry, e);
                FixOutcome {
                    action: action.clone(),
                    ok: false,
                    error: Some(format!("{e:#}")),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}
