//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use cord_client::bin_common::{load_config_from_env, ClientConfig, ConfigError, ConfigType};
use cord_client::cordgate::Intents;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("cord-client-{}-{}.yaml", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_gateway_config_default() {
    // Clear env var to test default
    env::remove_var("CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Gateway);
    assert_eq!(config_path.to_str().unwrap(), "config/gateway.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_parses() {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/gateway.yaml")).unwrap();
    let config = ClientConfig::parse(&yaml).unwrap();

    assert_eq!(
        config.intents().unwrap(),
        Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES
    );
    assert_eq!(config.connect_stagger(), Duration::from_secs(5));
    assert!(!config.rest.fail_fast);
    assert_eq!(config.shard_info(2).unwrap().count(), 2);
}

#[test]
fn test_load_reads_token_from_env() {
    let path = write_config("token", "log_level: debug\n");

    env::set_var("DISCORD_TOKEN", "abc.def");
    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.token, "abc.def");
    assert_eq!(config.log_level, "debug");

    env::set_var("DISCORD_TOKEN", "   ");
    assert!(matches!(
        ClientConfig::load(&path),
        Err(ConfigError::ValidationError(_))
    ));

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        ClientConfig::load("does/not/exist.yaml"),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
fn test_malformed_yaml() {
    assert!(matches!(
        ClientConfig::parse("gateway: [unclosed"),
        Err(ConfigError::YamlError(_))
    ));
}
