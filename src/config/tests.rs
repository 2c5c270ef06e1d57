use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert!(!settings.server.enable_ssl);
    assert_eq!(settings.client.packet_id_limit, 99999);
    assert_eq!(settings.client.control_prefix, "$");
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_server_address_scheme() {
    let mut settings = Settings::default();
    assert_eq!(settings.server.address(), "ws://127.0.0.1:8080/");

    settings.server.enable_ssl = true;
    settings.server.host = "jmqt.example.com".to_string();
    settings.server.port = 443;
    assert_eq!(settings.server.address(), "wss://jmqt.example.com:443/");
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "10.0.0.5"
        port = 9000
        enable_ssl = true

        [client]
        packet_id_limit = 100
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "10.0.0.5");
    assert_eq!(cfg.server.port, 9000);
    assert!(cfg.server.enable_ssl);
    assert_eq!(cfg.client.packet_id_limit, 100);
    // untouched values keep their defaults
    assert_eq!(cfg.client.control_prefix, "$");
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn test_load_config_from_environment() {
    temp_env::with_vars(
        [
            ("JMQT_SERVER__PORT", Some("7001")),
            ("JMQT_LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 7001);
            assert_eq!(cfg.server.host, "127.0.0.1");
            assert_eq!(cfg.log.level, "debug");
        },
    );
}
