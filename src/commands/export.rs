//! `export`: copy live certificates into `<output_dir>/<entry>/`.

use super::{CommandContext, Target};
use crate::services::exporter;
use anyhow::Result;
use camino::Utf8PathBuf;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub target: Target,
    pub overwrite: bool,
}

/// Files written by one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub output_dir: Utf8PathBuf,
    pub data_dir: Utf8PathBuf,
    pub files: Vec<Utf8PathBuf>,
}

impl ExportReport {
    /// Copied files relative to the data directory where possible.
    pub fn display_paths(&self) -> Vec<Utf8PathBuf> {
        self.files
            .iter()
            .map(|path| {
                path.strip_prefix(&self.data_dir)
                    .map(|rel| rel.to_path_buf())
                    .unwrap_or_else(|_| path.clone())
            })
            .collect()
    }
}

/// Copy live certificate files of the selected entries into the output dir.
pub fn export(ctx: &CommandContext, options: &ExportOptions) -> Result<ExportReport> {
    let paths = &ctx.runtime.paths;
    let mut files = Vec::new();

    for entry in ctx.entries_for(&options.target)? {
        let copied = exporter::export_entry(
            &paths.live_dir(&entry.primary_domain),
            &paths.output_entry_dir(&entry.name),
            options.overwrite,
        )?;
        files.extend(copied);
    }

    Ok(ExportReport {
        output_dir: paths.output_dir.clone(),
        data_dir: paths.data_dir.clone(),
        files,
    })
}
