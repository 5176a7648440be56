//! Integration tests for configuration loading and merging
//!
//! These tests verify:
//! - Merging the global file with sibling item files
//! - Example-file exclusion and default entry names
//! - TOML and YAML producing the same schema
//! - Runtime loading with `.env` and data-dir rebasing

use camino::Utf8PathBuf;
use certman::config::{ConfigError, Environment, Runtime, load_config, load_merged_config};
use certman::models::AcmeServer;
use std::fs;
use tempfile::TempDir;

fn create_conf_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let conf_dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, conf_dir)
}

const GLOBAL_TOML: &str = r#"
[global]
email = "ops@a.test"
acme_server = "prod"

[[entries]]
name = "main"
primary_domain = "a.test"
dns_provider = "aliyun"
account_id = "acct"

[[entries]]
name = "second"
primary_domain = "b.test"
dns_provider = "cloudflare"
wildcard = false
"#;

#[test]
fn test_global_only_without_item_files() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, GLOBAL_TOML).unwrap();

    let merged = load_merged_config(&path).unwrap();
    let single = load_config(&path).unwrap();

    assert_eq!(merged, single);
    let names: Vec<_> = merged.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["main", "second"]);
    assert_eq!(merged.global.email, "ops@a.test");
    assert_eq!(merged.global.acme_server, AcmeServer::Prod);
}

#[test]
fn test_example_item_file_is_never_merged() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, GLOBAL_TOML).unwrap();
    fs::write(
        conf_dir.join("item_example.example.toml"),
        "name = \"should-not-appear\"\nprimary_domain = \"x.test\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();

    let merged = load_merged_config(&path).unwrap();
    assert_eq!(merged.entries.len(), 2);
    assert!(merged.entries.iter().all(|e| e.name != "should-not-appear"));
}

#[test]
fn test_bare_item_gets_name_from_file() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, "[global]\nemail = \"ops@a.test\"\n").unwrap();
    fs::write(
        conf_dir.join("item_foo.toml"),
        "dns_provider = \"cloudflare\"\nprimary_domain = \"a.test\"\n",
    )
    .unwrap();

    let merged = load_merged_config(&path).unwrap();
    assert_eq!(merged.entries.len(), 1);
    assert_eq!(merged.entries[0].name, "foo");
    assert_eq!(merged.entries[0].primary_domain, "a.test");
    assert!(merged.entries[0].wildcard);
}

#[test]
fn test_items_merge_in_sorted_order_across_formats() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, GLOBAL_TOML).unwrap();
    fs::write(
        conf_dir.join("item_b.yaml"),
        "primary_domain: c.test\ndns_provider: route53\nsecondary_domains: [www.c.test]\n",
    )
    .unwrap();
    fs::write(
        conf_dir.join("item_a.toml"),
        "[[entries]]\nname = \"bundle-1\"\nprimary_domain = \"d.test\"\ndns_provider = \"aliyun\"\n\n\
         [[entries]]\nname = \"bundle-2\"\nprimary_domain = \"e.test\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();

    let merged = load_merged_config(&path).unwrap();
    let names: Vec<_> = merged.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["main", "second", "bundle-1", "bundle-2", "b"]);
    assert_eq!(
        merged.entries[4].domains(),
        vec!["c.test", "www.c.test", "*.c.test"]
    );
}

#[test]
fn test_duplicate_names_are_kept() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, GLOBAL_TOML).unwrap();
    fs::write(
        conf_dir.join("item_main.toml"),
        "primary_domain = \"other.test\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();

    let merged = load_merged_config(&path).unwrap();
    let mains: Vec<_> = merged.entries.iter().filter(|e| e.name == "main").collect();
    assert_eq!(mains.len(), 2);
    assert_eq!(merged.find_entry("main").unwrap().primary_domain, "a.test");
}

#[test]
fn test_custom_scan_glob() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, "scan_items_glob = \"site-*.toml\"\n").unwrap();
    fs::write(
        conf_dir.join("site-x.toml"),
        "name = \"x\"\nprimary_domain = \"x.test\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();
    fs::write(
        conf_dir.join("item_ignored.toml"),
        "primary_domain = \"i.test\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();

    let merged = load_merged_config(&path).unwrap();
    let names: Vec<_> = merged.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["x"]);
}

#[test]
fn test_yaml_global_config() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.yaml");
    fs::write(
        &path,
        "global:\n  email: ops@y.test\nentries:\n  - name: y\n    primary_domain: y.test\n    dns_provider: cloudflare\n    credentials:\n      api_token: ${CF_TOKEN}\n",
    )
    .unwrap();

    let config = load_merged_config(&path).unwrap();
    assert_eq!(config.global.email, "ops@y.test");
    assert_eq!(
        config.entries[0].credentials.api_token.as_deref(),
        Some("${CF_TOKEN}")
    );
}

#[test]
fn test_missing_and_unsupported_files() {
    let (_temp_dir, conf_dir) = create_conf_dir();

    let missing = load_merged_config(&conf_dir.join("config.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::NotFound(_)));

    let ini = conf_dir.join("config.ini");
    fs::write(&ini, "[global]\n").unwrap();
    assert!(matches!(
        load_merged_config(&ini).unwrap_err(),
        ConfigError::UnsupportedFormat { .. }
    ));
}

#[test]
fn test_schema_error_carries_field_path() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(
        &path,
        "[[entries]]\nname = \"ok\"\nprimary_domain = \"a.test\"\ndns_provider = \"aliyun\"\n\n\
         [[entries]]\nname = \"bad\"\nprimary_domain = \"\"\ndns_provider = \"aliyun\"\n",
    )
    .unwrap();

    match load_merged_config(&path).unwrap_err() {
        ConfigError::SchemaValidation { field, .. } => {
            assert_eq!(field, "entries[1].primary_domain");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_parse_error() {
    let (_temp_dir, conf_dir) = create_conf_dir();
    let path = conf_dir.join("config.toml");
    fs::write(&path, "[global\nemail = ").unwrap();

    assert!(matches!(
        load_merged_config(&path).unwrap_err(),
        ConfigError::Parse { .. }
    ));
}

#[test]
fn test_runtime_load_merges_dotenv_without_overriding() {
    let (_temp_dir, data_dir) = create_conf_dir();
    let conf_dir = data_dir.join("conf");
    fs::create_dir_all(&conf_dir).unwrap();
    fs::write(conf_dir.join("certman.toml"), GLOBAL_TOML).unwrap();
    fs::write(
        conf_dir.join(".env"),
        "# secrets\nexport CERTMAN_ALIYUN_acct_ACCESS_KEY_ID=from-file\nCERTMAN_CONFIG_FILE=certman.toml\nOTHER=\"quoted\"\n",
    )
    .unwrap();

    let env = Environment::from([(
        "CERTMAN_ALIYUN_acct_ACCESS_KEY_ID".to_string(),
        "from-process".to_string(),
    )]);
    let runtime = Runtime::load(&data_dir, None, env).unwrap();

    assert_eq!(runtime.config_path, conf_dir.join("certman.toml"));
    assert_eq!(runtime.config.entries.len(), 2);
    assert_eq!(
        runtime.env["CERTMAN_ALIYUN_acct_ACCESS_KEY_ID"],
        "from-process"
    );
    assert_eq!(runtime.env["OTHER"], "quoted");
    assert_eq!(runtime.paths.log_dir, data_dir.join("log"));
}

#[test]
fn test_runtime_rebases_on_configured_data_dir() {
    let (_temp_dir, data_dir) = create_conf_dir();
    let conf_dir = data_dir.join("conf");
    fs::create_dir_all(&conf_dir).unwrap();
    fs::write(
        conf_dir.join("config.toml"),
        "[global]\ndata_dir = \"/srv/certman\"\nlog_dir = \"logs\"\n",
    )
    .unwrap();

    let runtime = Runtime::load(&data_dir, None, Environment::new()).unwrap();
    assert_eq!(runtime.paths.data_dir, Utf8PathBuf::from("/srv/certman"));
    assert_eq!(runtime.paths.log_dir, Utf8PathBuf::from("/srv/certman/logs"));
}
