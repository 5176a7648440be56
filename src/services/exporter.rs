//! Copies issued certificate files out of certbot's `live/` tree.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Files copied out of a certbot live directory, in copy order.
pub const EXPORT_FILES: [&str; 4] = ["cert.pem", "chain.pem", "fullchain.pem", "privkey.pem"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copy the certificate files of one lineage into `output_entry_dir`.
///
/// Source files that don't exist are skipped. Existing destinations are left
/// alone unless `overwrite` is set. Returns the destination paths written.
pub fn export_entry(
    live_dir: &Utf8Path,
    output_entry_dir: &Utf8Path,
    overwrite: bool,
) -> Result<Vec<Utf8PathBuf>, ExportError> {
    fs::create_dir_all(output_entry_dir).map_err(|source| ExportError::CreateDir {
        path: output_entry_dir.to_path_buf(),
        source,
    })?;

    let mut copied = Vec::new();
    for name in EXPORT_FILES {
        let src = live_dir.join(name);
        // chain.pem is absent for some clients
        if !src.exists() {
            tracing::debug!("Skipping {}, not present", src);
            continue;
        }

        let dst = output_entry_dir.join(name);
        if dst.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", dst);
            continue;
        }

        fs::copy(&src, &dst).map_err(|source| ExportError::Copy {
            from: src.clone(),
            to: dst.clone(),
            source,
        })?;
        copied.push(dst);
    }

    tracing::info!("Exported {} file(s) to {}", copied.len(), output_entry_dir);
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_export_copies_present_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        let live = root.join("live/a.test");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("cert.pem"), "CERT").unwrap();
        fs::write(live.join("privkey.pem"), "KEY").unwrap();

        let out = root.join("output/a");
        let copied = export_entry(&live, &out, false).unwrap();

        assert_eq!(copied, vec![out.join("cert.pem"), out.join("privkey.pem")]);
        assert_eq!(fs::read_to_string(out.join("privkey.pem")).unwrap(), "KEY");
    }

    #[test]
    fn test_export_respects_overwrite_flag() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        let live = root.join("live");
        let out = root.join("out");
        fs::create_dir_all(&live).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(live.join("fullchain.pem"), "NEW").unwrap();
        fs::write(out.join("fullchain.pem"), "OLD").unwrap();

        assert!(export_entry(&live, &out, false).unwrap().is_empty());
        assert_eq!(fs::read_to_string(out.join("fullchain.pem")).unwrap(), "OLD");

        assert_eq!(export_entry(&live, &out, true).unwrap().len(), 1);
        assert_eq!(fs::read_to_string(out.join("fullchain.pem")).unwrap(), "NEW");
    }

    #[test]
    fn test_export_missing_live_dir_creates_empty_output() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8(&temp_dir);
        let out = root.join("out/a");

        assert!(export_entry(&root.join("nope"), &out, false).unwrap().is_empty());
        assert!(out.is_dir());
    }
}
