//! certbot invocation.
//!
//! [`AcmeClient`] builds `certonly` / `renew` argument vectors, appends the
//! directory flags every run needs, and runs the client as a subprocess,
//! either capturing its output or streaming it to the terminal.

use crate::config::Paths;
use crate::models::DnsProvider;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;

/// Errors starting or waiting on the ACME client.
///
/// A non-zero exit is not an error here; it is reported through
/// [`AcmeOutcome`].
#[derive(Error, Debug)]
pub enum AcmeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Directories handed to certbot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmePaths {
    pub config_dir: Utf8PathBuf,
    pub work_dir: Utf8PathBuf,
    pub logs_dir: Utf8PathBuf,
}

impl AcmePaths {
    pub fn from_paths(paths: &Paths) -> Self {
        Self {
            config_dir: paths.acme_config_dir(),
            work_dir: paths.acme_work_dir(),
            logs_dir: paths.log_dir.clone(),
        }
    }
}

/// Result of one ACME client invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcmeOutcome {
    pub returncode: i32,
    pub cmd: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    /// stderr says the client needs elevated privileges.
    #[serde(skip)]
    pub elevation_required: bool,
}

impl AcmeOutcome {
    pub fn ok(&self) -> bool {
        self.returncode == 0
    }
}

/// Parameters for `certonly` with a DNS-01 authenticator.
#[derive(Debug, Clone)]
pub struct IssueRequest<'a> {
    pub domains: &'a [String],
    pub provider: DnsProvider,
    pub credentials_file: &'a Utf8Path,
    pub email: &'a str,
    pub staging: bool,
    pub force: bool,
}

/// Parameters for `renew`.
#[derive(Debug, Clone, Default)]
pub struct RenewRequest<'a> {
    /// Limit renewal to one lineage (certbot names lineages by primary domain).
    pub cert_name: Option<&'a str>,
    pub force: bool,
    pub dry_run: bool,
}

/// Runs the external ACME client (certbot).
///
/// The client is a black box: this type only builds argument vectors, runs
/// the process to completion, and inspects its exit code and stderr. No
/// timeout is applied.
pub struct AcmeClient {
    program: String,

    /// Matches stderr of a client refusing to run without admin rights
    elevation_pattern: Regex,
}

impl AcmeClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            elevation_pattern: Regex::new(r"(?i)administrative rights|administrator")
                .expect("Invalid elevation regex"),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Subcommand arguments for issuing a certificate.
    pub fn issue_args(&self, request: &IssueRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "certonly".to_string(),
            "--authenticator".to_string(),
            request.provider.authenticator(),
        ];

        if let Some(flag) = request.provider.credentials_flag() {
            args.push(flag);
            args.push(request.credentials_file.to_string());
        }

        args.extend([
            "--agree-tos".to_string(),
            "--email".to_string(),
            request.email.to_string(),
        ]);

        if request.staging {
            args.push("--test-cert".to_string());
        }
        if request.force {
            args.push("--force-renewal".to_string());
        }

        for domain in request.domains {
            args.push("-d".to_string());
            args.push(domain.clone());
        }

        args
    }

    /// Subcommand arguments for renewing.
    pub fn renew_args(&self, request: &RenewRequest<'_>) -> Vec<String> {
        let mut args = vec!["renew".to_string()];

        if let Some(cert_name) = request.cert_name {
            args.push("--cert-name".to_string());
            args.push(cert_name.to_string());
        }
        if request.force {
            args.push("--force-renewal".to_string());
        }
        if request.dry_run {
            args.push("--dry-run".to_string());
        }

        args
    }

    /// Full argv: program, subcommand args, then the shared directory flags.
    pub fn build_command(&self, args: &[String], paths: &AcmePaths) -> Vec<String> {
        let mut cmd = Vec::with_capacity(args.len() + 8);
        cmd.push(self.program.clone());
        cmd.extend(args.iter().cloned());
        cmd.extend([
            "--config-dir".to_string(),
            paths.config_dir.to_string(),
            "--work-dir".to_string(),
            paths.work_dir.to_string(),
            "--logs-dir".to_string(),
            paths.logs_dir.to_string(),
            "--non-interactive".to_string(),
        ]);
        cmd
    }

    pub fn is_elevation_error(&self, stderr: &str) -> bool {
        self.elevation_pattern.is_match(stderr)
    }

    /// Run the client and wait for it to exit.
    ///
    /// With `passthrough` the child inherits the terminal and the outcome has
    /// empty stdout/stderr; otherwise both streams are captured.
    pub async fn run(
        &self,
        args: &[String],
        paths: &AcmePaths,
        extra_env: &[(String, String)],
        passthrough: bool,
    ) -> Result<AcmeOutcome, AcmeError> {
        let cmd = self.build_command(args, paths);
        tracing::info!("Executing: {}", cmd.join(" "));

        let start = Instant::now();

        let mut command = Command::new(&cmd[0]);
        command
            .args(&cmd[1..])
            .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            // Never block on a prompt
            .stdin(Stdio::null());

        let (status, stdout, stderr) = if passthrough {
            let status = command
                .status()
                .await
                .map_err(|source| self.spawn_error(source))?;
            (status, String::new(), String::new())
        } else {
            let child = command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|source| self.spawn_error(source))?;
            let output = child
                .wait_with_output()
                .await
                .map_err(|source| AcmeError::Wait {
                    program: self.program.clone(),
                    source,
                })?;
            (
                output.status,
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            )
        };

        // No code when killed by a signal
        let returncode = status.code().unwrap_or(-1);
        let elevation_required = returncode != 0 && self.is_elevation_error(&stderr);

        tracing::info!(
            "{} completed in {:.2}s with exit code {}",
            self.program,
            start.elapsed().as_secs_f32(),
            returncode
        );
        if elevation_required {
            tracing::warn!("{} requires elevated privileges", self.program);
        }

        Ok(AcmeOutcome {
            returncode,
            cmd,
            stdout,
            stderr,
            elevation_required,
        })
    }

    fn spawn_error(&self, source: std::io::Error) -> AcmeError {
        AcmeError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for AcmeClient {
    fn default() -> Self {
        Self::new("certbot")
    }
}
