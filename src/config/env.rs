//! Environment mapping used for credential resolution.
//!
//! Resolution and validation never read the process environment directly;
//! callers pass an [`Environment`] snapshot instead.

use super::ConfigError;
use camino::Utf8Path;
use std::collections::HashMap;
use std::fs;

pub type Environment = HashMap<String, String>;

/// Snapshot of the process environment. Non UTF-8 variables are skipped.
pub fn process_environment() -> Environment {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Value of `key`, treating an empty value as unset.
pub fn lookup<'a>(env: &'a Environment, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Parse `KEY=VALUE` lines of a dotenv file.
///
/// Blank lines and `#` comments are ignored, an `export ` prefix is allowed,
/// and one pair of matching surrounding quotes is removed from the value.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!("Ignoring malformed .env line {}", number + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            tracing::warn!("Ignoring .env line {} with empty key", number + 1);
            continue;
        }

        pairs.push((key.to_string(), unquote(value.trim()).to_string()));
    }

    pairs
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Merge a dotenv file into `env` without overriding existing keys.
///
/// A missing file is not an error. Returns the number of keys added.
pub fn merge_dotenv(path: &Utf8Path, env: &mut Environment) -> Result<usize, ConfigError> {
    if !path.exists() {
        return Ok(0);
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut added = 0;
    for (key, value) in parse_dotenv(&content) {
        if !env.contains_key(&key) {
            env.insert(key, value);
            added += 1;
        }
    }

    tracing::debug!("Loaded {} variable(s) from {}", added, path);
    Ok(added)
}
