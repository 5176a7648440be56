//! certman - certbot orchestration for DNS-01 certificates
//!
//! Main entry point for the command-line interface.
//!
//! # Execution Flow
//!
//! 1. Parse arguments (global `--data-dir`, `--config-file`, `--debug`)
//! 2. Load the runtime: `<data_dir>/conf/.env`, merged config, directory layout
//! 3. Initialize logging → `<log_dir>/certman.<date>.log`
//! 4. Run the command on a current-thread tokio runtime
//! 5. Exit with the command's code
//!
//! # Exit Codes
//!
//! - `check`: 0 ok, 10 warn, 20 force-renew, 30 missing
//! - 1: any command failure
//! - 2: certbot requires elevated privileges

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use certman::commands::{
    self, CheckOptions, CommandContext, CommandError, ExportOptions, ExportReport, IssueOptions,
    RenewOptions, Target,
};
use certman::config::{CONFIG_FILE_ENV, DATA_DIR_ENV, Paths};
use certman::services::Thresholds;
use certman::{APP_NAME, GlobalSettings, Runtime, VERSION, logging};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;

/// certman: issue, renew, export, and check certificates through certbot
#[derive(Parser, Debug)]
#[command(name = "certman", author, version, about, long_about = None)]
struct Cli {
    /// Base data directory (conf/, run/, log/, output/)
    #[arg(short = 'D', long, env = DATA_DIR_ENV, default_value = "data", global = true)]
    data_dir: Utf8PathBuf,

    /// Global config file name under <data_dir>/conf
    #[arg(short = 'c', long, env = CONFIG_FILE_ENV, global = true)]
    config_file: Option<String>,

    /// Debug logging, mirrored to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate config and required environment secrets
    ConfigValidate,

    /// List configured entries
    Entries,

    /// Issue a new certificate for one entry
    New {
        /// Entry name
        #[arg(short, long)]
        name: String,

        /// Force re-issue even if a certificate exists
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        export: ExportToggle,

        /// Stream certbot output to the terminal
        #[arg(short, long)]
        verbose: bool,
    },

    /// Renew certificates using `certbot renew`
    Renew {
        /// Renew all entries
        #[arg(short, long, conflicts_with = "name")]
        all: bool,

        /// Renew a single entry
        #[arg(short, long)]
        name: Option<String>,

        /// Force renew even if not due
        #[arg(short, long)]
        force: bool,

        /// Test the renew flow against staging without saving certificates
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        export: ExportToggle,

        /// Stream certbot output to the terminal
        #[arg(short, long)]
        verbose: bool,
    },

    /// Copy issued certificates into the output directory
    Export {
        /// Export all entries
        #[arg(short, long, conflicts_with = "name")]
        all: bool,

        /// Export a single entry
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        overwrite: OverwriteToggle,
    },

    /// Check certificate expiry; exit 0/10/20/30 for ok/warn/force-renew/missing
    Check {
        /// Warn when a certificate expires within N days
        #[arg(short, long, default_value_t = 30)]
        warn_days: i64,

        /// Require renewal when a certificate expires within N days
        #[arg(short = 'F', long, default_value_t = 7)]
        force_renew_days: i64,

        /// Check a single entry
        #[arg(short, long)]
        name: Option<String>,

        /// Issue missing and renew expiring certificates
        #[arg(long)]
        fix: bool,

        /// Print the result document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove run logs older than N days
    LogsClean {
        #[arg(short, long, default_value_t = 30)]
        keep_days: u32,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::ConfigValidate => "config-validate",
            Self::Entries => "entries",
            Self::New { .. } => "new",
            Self::Renew { .. } => "renew",
            Self::Export { .. } => "export",
            Self::Check { .. } => "check",
            Self::LogsClean { .. } => "logs-clean",
        }
    }
}

#[derive(Args, Debug)]
struct ExportToggle {
    /// Export artifacts to output after success (default)
    #[arg(long = "export", overrides_with = "no_export")]
    export: bool,

    /// Don't export artifacts
    #[arg(long = "no-export", overrides_with = "export")]
    no_export: bool,
}

impl ExportToggle {
    fn enabled(&self) -> bool {
        self.export || !self.no_export
    }
}

#[derive(Args, Debug)]
struct OverwriteToggle {
    /// Overwrite existing files in output (default)
    #[arg(long = "overwrite", overrides_with = "no_overwrite")]
    overwrite: bool,

    /// Keep existing files in output
    #[arg(long = "no-overwrite", overrides_with = "overwrite")]
    no_overwrite: bool,
}

impl OverwriteToggle {
    fn enabled(&self) -> bool {
        self.overwrite || !self.no_overwrite
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command_name = cli.command.name();

    let runtime = match Runtime::from_process(&cli.data_dir, cli.config_file.as_deref()) {
        Ok(runtime) => runtime,
        Err(e) => {
            // No runtime yet: the diagnostic goes to the default log layout.
            let log_dir = Paths::new(&cli.data_dir, &GlobalSettings::default()).log_dir;
            let err = anyhow::Error::from(e);
            return ExitCode::from(report_failure(&log_dir, command_name, &err));
        }
    };

    let _guard = match logging::setup_logging(&runtime.paths.log_dir, cli.debug) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };

    tracing::info!("Starting {} v{} ({})", APP_NAME, VERSION, command_name);

    let log_dir = runtime.paths.log_dir.clone();
    let ctx = CommandContext::new(runtime);

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(execute(&ctx, cli.command)));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => ExitCode::from(report_failure(&log_dir, command_name, &err)),
    }
}

async fn execute(ctx: &CommandContext, command: Command) -> Result<u8> {
    match command {
        Command::ConfigValidate => {
            commands::config_validate(ctx)?;
            println!("OK");
        }

        Command::Entries => {
            for line in commands::entries(ctx) {
                println!("{line}");
            }
        }

        Command::New {
            name,
            force,
            export,
            verbose,
        } => {
            let report = commands::issue(
                ctx,
                &IssueOptions {
                    name,
                    force,
                    export: export.enabled(),
                    verbose,
                },
            )
            .await?;
            println!(
                "ok: issued entry={} domains={}",
                report.entry,
                report.domains.join(",")
            );
            println!("log={}", report.log_path);
            if let Some(export) = &report.export {
                print_export(export);
            }
        }

        Command::Renew {
            all,
            name,
            force,
            dry_run,
            export,
            verbose,
        } => {
            let report = commands::renew(
                ctx,
                &RenewOptions {
                    target: Target::from_flags(all, name)?,
                    force,
                    dry_run,
                    export: export.enabled(),
                    verbose,
                },
            )
            .await?;
            if report.dry_run {
                println!("ok: renew completed (dry-run)");
            } else {
                println!("ok: renew completed");
            }
            println!("log={}", report.log_path);
            if let Some(export) = &report.export {
                print_export(export);
            }
        }

        Command::Export {
            all,
            name,
            overwrite,
        } => {
            let report = commands::export(
                ctx,
                &ExportOptions {
                    target: Target::from_flags(all, name)?,
                    overwrite: overwrite.enabled(),
                },
            )?;
            print_export(&report);
        }

        Command::Check {
            warn_days,
            force_renew_days,
            name,
            fix,
            json,
        } => {
            let report = commands::check(
                ctx,
                &CheckOptions {
                    thresholds: Thresholds {
                        warn_days,
                        force_renew_days,
                    },
                    name,
                    fix,
                },
            )
            .await?;

            if json {
                println!("{}", report.payload);
            } else {
                for line in report.result_lines() {
                    println!("{line}");
                }
                println!("log={}", report.log_path);
            }
            // The JSON document already carries `fix_actions`.
            if !json && report.fix && !report.fix_actions.is_empty() {
                println!("fix actions:");
                for line in report.fix_lines() {
                    println!("{line}");
                }
            }

            report.ensure_fixes_succeeded()?;
            return Ok(u8::try_from(report.exit_code()).unwrap_or(1));
        }

        Command::LogsClean { keep_days } => {
            let removed = commands::logs_clean(ctx, keep_days)?;
            println!("Removed {removed} log file(s)");
        }
    }

    Ok(0)
}

fn print_export(report: &ExportReport) {
    println!("Exported {} file(s)", report.files.len());
    if !report.files.is_empty() {
        println!("output_dir={}", report.output_dir);
        for path in report.display_paths() {
            println!("- {path}");
        }
    }
}

/// Print the failure, write a diagnostic run log when the command didn't
/// already, and return the process exit code.
///
/// Also used for configuration errors, before tracing is initialized.
fn report_failure(log_dir: &Utf8Path, command: &str, err: &anyhow::Error) -> u8 {
    tracing::error!("{} failed: {:#}", command, err);

    match err.downcast_ref::<CommandError>() {
        Some(CommandError::AcmeFailed {
            elevation_required: true,
            log_path,
            ..
        }) => {
            eprintln!("certbot requires administrative rights.");
            eprintln!(
                "Next steps: run in an Administrator shell; or use gsudo; \
                 or switch to WSL; or switch to docker-compose."
            );
            eprintln!("log={log_path}");
        }
        Some(
            CommandError::AcmeFailed { log_path, .. } | CommandError::FixFailed { log_path, .. },
        ) => {
            eprintln!("error: {err}");
            eprintln!("log={log_path}");
        }
        _ => {
            eprintln!("error: {err:#}");
            if let Some(path) = write_diagnostic_log(log_dir, command, err) {
                eprintln!("log={path}");
            }
        }
    }

    err.downcast_ref::<CommandError>()
        .map(CommandError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}

fn write_diagnostic_log(log_dir: &Utf8Path, command: &str, err: &anyhow::Error) -> Option<Utf8PathBuf> {
    let path = logging::new_run_logfile(log_dir, command).ok()?;
    let payload = json!({
        "ts": Utc::now().to_rfc3339(),
        "command": command,
        "error": format!("{err:#}"),
    });
    match logging::write_command_log(&path, &payload) {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!("Could not write diagnostic log: {:#}", e);
            None
        }
    }
}
