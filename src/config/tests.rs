use super::settings::Settings;
use super::{load_config, load_config_from};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 5000);
    assert_eq!(settings.server.addr(), "127.0.0.1:5000");
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.max_history_per_topic, 1000);
    assert!(!settings.broker.deduplicate_fanout);
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let missing = tmp.path().join("nope");

    let cfg = load_config_from(missing.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.port, 5000);
    assert_eq!(cfg.broker.max_history_per_topic, 1000);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        max_history_per_topic = 5
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.max_history_per_topic, 5);
    // untouched keys keep their defaults
    assert_eq!(cfg.broker.max_connections, 1000);
    assert!(!cfg.broker.deduplicate_fanout);
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let base = tmp.path().join("broker.toml");
    fs::write(&base, "[server]\nport = 7000\n").expect("write config file");
    let base = tmp.path().join("broker");

    temp_env::with_vars(
        [
            ("PUBSUB__SERVER__PORT", Some("7100")),
            ("PUBSUB__BROKER__DEDUPLICATE_FANOUT", Some("true")),
        ],
        || {
            let cfg = load_config_from(base.to_str().unwrap()).expect("load_config failed");
            assert_eq!(cfg.server.port, 7100);
            assert!(cfg.broker.deduplicate_fanout);
        },
    );
}
