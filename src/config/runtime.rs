use super::env::{self, Environment};
use super::{ConfigError, load_merged_config};
use crate::models::{AppConfig, GlobalSettings};
use camino::{Utf8Path, Utf8PathBuf};

/// Environment variable naming the global config file under the conf dir.
pub const CONFIG_FILE_ENV: &str = "CERTMAN_CONFIG_FILE";
/// Environment variable overriding the base data directory.
pub const DATA_DIR_ENV: &str = "CERTMAN_DATA_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Directory layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: Utf8PathBuf,
    pub conf_dir: Utf8PathBuf,
    pub run_dir: Utf8PathBuf,
    pub log_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    letsencrypt_dir: String,
}

impl Paths {
    pub fn new(data_dir: &Utf8Path, global: &GlobalSettings) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            conf_dir: data_dir.join(&global.conf_dir),
            run_dir: data_dir.join(&global.run_dir),
            log_dir: data_dir.join(&global.log_dir),
            output_dir: data_dir.join(&global.output_dir),
            letsencrypt_dir: global.letsencrypt_dir.clone(),
        }
    }

    /// certbot `--config-dir`.
    pub fn acme_config_dir(&self) -> Utf8PathBuf {
        self.run_dir.join(&self.letsencrypt_dir)
    }

    /// certbot `--work-dir`.
    pub fn acme_work_dir(&self) -> Utf8PathBuf {
        self.run_dir.join("work")
    }

    pub fn credentials_dir(&self) -> Utf8PathBuf {
        self.run_dir.join("credentials")
    }

    /// Live directory certbot keeps for `primary_domain`.
    pub fn live_dir(&self, primary_domain: &str) -> Utf8PathBuf {
        self.acme_config_dir().join("live").join(primary_domain)
    }

    pub fn output_entry_dir(&self, entry_name: &str) -> Utf8PathBuf {
        self.output_dir.join(entry_name)
    }
}

/// Everything a command needs: layout, merged config, environment snapshot.
///
/// Built fresh on every invocation.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub paths: Paths,
    pub config: AppConfig,
    pub env: Environment,
    pub config_path: Utf8PathBuf,
}

impl Runtime {
    /// Load with the process environment.
    pub fn from_process(data_dir: &Utf8Path, config_file: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(data_dir, config_file, env::process_environment())
    }

    /// Load the runtime for `data_dir` with an explicit environment.
    ///
    /// `<data_dir>/conf/.env` is merged into `env` first without overriding
    /// keys already present. The config file name comes from `config_file`,
    /// then `CERTMAN_CONFIG_FILE`, then `config.toml`. A `global.data_dir` in
    /// the loaded config rebases every directory.
    pub fn load(
        data_dir: &Utf8Path,
        config_file: Option<&str>,
        mut env: Environment,
    ) -> Result<Self, ConfigError> {
        let conf_dir = data_dir.join(GlobalSettings::default().conf_dir);
        env::merge_dotenv(&conf_dir.join(".env"), &mut env)?;

        let config_filename = config_file
            .map(str::to_string)
            .or_else(|| env::lookup(&env, CONFIG_FILE_ENV).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let config_path = conf_dir.join(config_filename);

        let config = load_merged_config(&config_path)?;

        let base = match config.global.data_dir.as_deref() {
            Some(dir) if !dir.is_empty() && Utf8Path::new(dir) != data_dir => {
                tracing::info!("Data directory overridden by config: {}", dir);
                Utf8PathBuf::from(dir)
            }
            _ => data_dir.to_path_buf(),
        };
        let paths = Paths::new(&base, &config.global);

        Ok(Self {
            paths,
            config,
            env,
            config_path,
        })
    }
}
