//! Configuration loading and merging.
//!
//! The global config (`<data>/conf/config.toml` by default) carries global
//! settings, an optional `entries` list, and `scan_items_glob`. Sibling item
//! files matching the glob are merged after it: an item file is either a full
//! document (`global` / `entries` keys) or a single bare entry whose name
//! defaults from the file name (`item_<name>.toml` -> `<name>`).
//!
//! TOML and YAML documents are both read into an untyped [`serde_json::Value`]
//! first, then deserialized into the same typed schema.

pub mod env;
pub mod runtime;

pub use env::{Environment, lookup, process_environment};
pub use runtime::{CONFIG_FILE_ENV, DATA_DIR_ENV, DEFAULT_CONFIG_FILE, Paths, Runtime};

use crate::models::{AppConfig, Entry, GlobalOnlyConfig, GlobalSettings};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use std::fs;
use thiserror::Error;

const ITEM_NAME_PREFIX: &str = "item_";
const EXAMPLE_MARKER: &str = ".example";

/// Errors raised while loading configuration. All of them abort the command.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("unsupported config format '{extension}': {path}")]
    UnsupportedFormat { path: Utf8PathBuf, extension: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: Utf8PathBuf, reason: String },

    #[error("invalid config {path}: {field}: {reason}")]
    SchemaValidation {
        path: Utf8PathBuf,
        field: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn schema(path: &Utf8Path, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            path: path.to_path_buf(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Supported on-disk formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let extension = path.extension().unwrap_or_default().to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Read a config file into an untyped document.
pub fn load_document(path: &Utf8Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let format = ConfigFormat::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = match format {
        ConfigFormat::Toml => toml::from_str::<Value>(&text).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml_ng::from_str::<Value>(&text).map_err(|e| e.to_string()),
    };

    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Load a single config document without merging item files.
pub fn load_config(path: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let document = load_document(path)?;
    parse_app_config(path, &document)
}

/// Load the global config and merge item files from the same directory.
///
/// Entries keep discovery order: the global file's own entries first, then
/// item files in lexicographic file-name order. Entries are not deduplicated
/// by name.
pub fn load_merged_config(global_config_path: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let document = load_document(global_config_path)?;
    let base = parse_app_config(global_config_path, &document)?;

    let view = if document.is_null() {
        Value::Object(Map::new())
    } else {
        document
    };
    let global_only: GlobalOnlyConfig = serde_json::from_value(view)
        .map_err(|e| ConfigError::schema(global_config_path, "scan_items_glob", e.to_string()))?;

    let mut entries = base.entries;
    let item_paths = discover_item_files(global_config_path, &global_only.scan_items_glob)?;

    for item_path in &item_paths {
        let item_document = load_document(item_path)?;
        let Some(map) = item_document.as_object() else {
            return Err(ConfigError::schema(item_path, "<root>", "expected a mapping"));
        };

        if map.contains_key("entries") || map.contains_key("global") {
            let item_config = parse_app_config(item_path, &item_document)?;
            tracing::debug!(
                "Merging {} entries from {}",
                item_config.entries.len(),
                item_path
            );
            entries.extend(item_config.entries);
        } else {
            let mut single = map.clone();
            single
                .entry("name")
                .or_insert_with(|| Value::String(default_name_from_item(item_path)));
            let entry = parse_entry(item_path, "<entry>", Value::Object(single))?;
            tracing::debug!("Merging entry '{}' from {}", entry.name, item_path);
            entries.push(entry);
        }
    }

    tracing::info!(
        "Loaded config from {} ({} entries, {} item files)",
        global_config_path,
        entries.len(),
        item_paths.len()
    );

    Ok(AppConfig {
        global: base.global,
        entries,
    })
}

/// Sibling files of the global config matching `scan_glob`, sorted.
///
/// The global file itself and `*.example.*` files are excluded.
pub fn discover_item_files(
    global_config_path: &Utf8Path,
    scan_glob: &str,
) -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let conf_dir = match global_config_path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let pattern = format!("{}/{}", glob::Pattern::escape(conf_dir.as_str()), scan_glob);

    let matches = glob::glob(&pattern)
        .map_err(|e| ConfigError::schema(global_config_path, "scan_items_glob", e.to_string()))?;

    let mut items = Vec::new();
    for matched in matches {
        let path = matched.map_err(|e| ConfigError::Io {
            path: Utf8PathBuf::from(e.path().to_string_lossy().into_owned()),
            source: e.into_error(),
        })?;
        let path = match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => path,
            Err(path) => {
                tracing::warn!("Skipping non UTF-8 item path: {}", path.display());
                continue;
            }
        };

        if !path.is_file() || path.file_name() == global_config_path.file_name() {
            continue;
        }
        if is_example_file(&path) {
            tracing::debug!("Skipping example item file: {}", path);
            continue;
        }
        items.push(path);
    }

    items.sort();
    Ok(items)
}

fn is_example_file(path: &Utf8Path) -> bool {
    let name_marked = path
        .file_name()
        .is_some_and(|name| name.ends_with(EXAMPLE_MARKER));
    let stem_marked = path
        .file_stem()
        .is_some_and(|stem| stem.ends_with(EXAMPLE_MARKER));
    name_marked || stem_marked
}

/// `item_foo.toml` -> `foo`; other stems are used as-is.
pub fn default_name_from_item(item_path: &Utf8Path) -> String {
    let stem = item_path.file_stem().unwrap_or_default();
    stem.strip_prefix(ITEM_NAME_PREFIX).unwrap_or(stem).to_string()
}

fn parse_app_config(path: &Utf8Path, document: &Value) -> Result<AppConfig, ConfigError> {
    let empty = Map::new();
    let map = match document {
        Value::Object(map) => map,
        // an empty YAML document
        Value::Null => &empty,
        _ => return Err(ConfigError::schema(path, "<root>", "expected a mapping")),
    };

    let global = match map.get("global") {
        None | Some(Value::Null) => GlobalSettings::default(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::schema(path, "global", e.to_string()))?,
    };

    let entries = match map.get("entries") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_entry(path, &format!("entries[{i}]"), item.clone()))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(ConfigError::schema(path, "entries", "expected a list")),
    };

    Ok(AppConfig { global, entries })
}

fn parse_entry(path: &Utf8Path, field: &str, value: Value) -> Result<Entry, ConfigError> {
    let entry: Entry =
        serde_json::from_value(value).map_err(|e| ConfigError::schema(path, field, e.to_string()))?;

    if entry.name.trim().is_empty() {
        return Err(ConfigError::schema(path, format!("{field}.name"), "must not be empty"));
    }
    if entry.primary_domain.trim().is_empty() {
        return Err(ConfigError::schema(
            path,
            format!("{field}.primary_domain"),
            "must not be empty",
        ));
    }

    Ok(entry)
}
