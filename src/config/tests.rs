use std::env;
use std::fs;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::TempDir;

use super::{PartialDispatcherSettings, PartialSettings, Settings, load_config, load_config_from};
use crate::utils::TopicbusError;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("topicbus.toml");
    fs::write(&path, contents).expect("write config file");
    path
}

/// Switches the working directory for the lifetime of the value.
struct CurrentDir {
    original: PathBuf,
}

impl CurrentDir {
    fn enter(dir: &TempDir) -> Self {
        let original = env::current_dir().expect("current_dir");
        env::set_current_dir(dir.path()).expect("set current dir");
        Self { original }
    }
}

impl Drop for CurrentDir {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.original);
    }
}

const ENV_KEYS: [&str; 4] = [
    "TOPICBUS_LOGGING__LEVEL",
    "TOPICBUS_DISPATCHER__LOG_FAILURES",
    "TOPICBUS_DISPATCHER__COLLECT_FAILURES",
    "TOPICBUS_DISPATCHER__FAILURE_HISTORY",
];

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.logging.level, "info");
    assert!(settings.dispatcher.log_failures);
    assert!(!settings.dispatcher.collect_failures);
    assert_eq!(settings.dispatcher.failure_history, 256);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_merge_keeps_defaults_for_missing_values() {
    let partial = PartialSettings {
        logging: None,
        dispatcher: Some(PartialDispatcherSettings {
            collect_failures: Some(true),
            ..Default::default()
        }),
    };
    let settings = Settings::merge(partial);
    assert_eq!(settings.logging.level, "info");
    assert!(settings.dispatcher.collect_failures);
    assert!(settings.dispatcher.log_failures);
    assert_eq!(settings.dispatcher.failure_history, 256);
}

#[test]
fn test_validate_rejects_unknown_level() {
    let mut settings = Settings::default();
    settings.logging.level = "loud".to_string();
    assert!(matches!(
        settings.validate(),
        Err(TopicbusError::InvalidConfig(_))
    ));
}

#[test]
fn test_validate_rejects_empty_history_when_collecting() {
    let mut settings = Settings::default();
    settings.dispatcher.collect_failures = true;
    settings.dispatcher.failure_history = 0;
    assert!(settings.validate().is_err());

    // without collection the history size is irrelevant
    settings.dispatcher.collect_failures = false;
    assert!(settings.validate().is_ok());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = write_config(
        &tmp,
        r#"
            [logging]
            level = "debug"

            [dispatcher]
            log_failures = false
            collect_failures = true
            failure_history = 10
        "#,
    );

    temp_env::with_vars_unset(
        [
            "TOPICBUS_LOGGING__LEVEL",
            "TOPICBUS_DISPATCHER__FAILURE_HISTORY",
            "TOPICBUS_DISPATCHER__COLLECT_FAILURES",
        ],
        || {
            let cfg = load_config_from(&path).expect("load_config_from failed");
            assert_eq!(cfg.logging.level, "debug");
            assert!(!cfg.dispatcher.log_failures);
            assert!(cfg.dispatcher.collect_failures);
            assert_eq!(cfg.dispatcher.failure_history, 10);
        },
    );
}

#[test]
#[serial]
fn load_config_partial_file_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = write_config(
        &tmp,
        r#"
            [dispatcher]
            failure_history = 3
        "#,
    );

    temp_env::with_vars_unset(["TOPICBUS_LOGGING__LEVEL"], || {
        let cfg = load_config_from(&path).expect("load_config_from failed");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.dispatcher.log_failures);
        assert_eq!(cfg.dispatcher.failure_history, 3);
    });
}

#[test]
#[serial]
fn load_config_env_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = write_config(
        &tmp,
        r#"
            [logging]
            level = "warn"

            [dispatcher]
            failure_history = 10
        "#,
    );

    temp_env::with_vars(
        [
            ("TOPICBUS_LOGGING__LEVEL", Some("trace")),
            ("TOPICBUS_DISPATCHER__FAILURE_HISTORY", Some("64")),
            ("TOPICBUS_DISPATCHER__COLLECT_FAILURES", Some("true")),
        ],
        || {
            let cfg = load_config_from(&path).expect("load_config_from failed");
            assert_eq!(cfg.logging.level, "trace");
            assert_eq!(cfg.dispatcher.failure_history, 64);
            assert!(cfg.dispatcher.collect_failures);
        },
    );
}

#[test]
#[serial]
fn load_config_invalid_level_is_rejected() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = write_config(
        &tmp,
        r#"
            [logging]
            level = "shouting"
        "#,
    );

    temp_env::with_vars_unset(["TOPICBUS_LOGGING__LEVEL"], || {
        let err = load_config_from(&path).unwrap_err();
        assert_eq!(err.as_label(), "invalid_config");
    });
}

#[test]
#[serial]
fn load_config_missing_file_is_an_error() {
    let tmp = TempDir::new().expect("create tempdir");
    let err = load_config_from(tmp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TopicbusError::Config(_)));
}

#[test]
#[serial]
fn load_config_reads_default_file_in_working_dir() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::create_dir_all(tmp.path().join("config")).expect("create config dir");
    fs::write(
        tmp.path().join("config/default.toml"),
        r#"
            [logging]
            level = "warn"

            [dispatcher]
            collect_failures = true
            failure_history = 12
        "#,
    )
    .expect("write config file");

    let _cwd = CurrentDir::enter(&tmp);
    temp_env::with_vars_unset(ENV_KEYS, || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.dispatcher.log_failures);
        assert!(cfg.dispatcher.collect_failures);
        assert_eq!(cfg.dispatcher.failure_history, 12);
    });
}

#[test]
#[serial]
fn load_config_without_default_file_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");

    let _cwd = CurrentDir::enter(&tmp);
    temp_env::with_vars_unset(ENV_KEYS, || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg, Settings::default());
    });
}

#[test]
#[serial]
fn load_config_ignores_malformed_dotenv() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::write(tmp.path().join(".env"), "this line has no equals sign\n").expect("write .env");
    fs::create_dir_all(tmp.path().join("config")).expect("create config dir");
    fs::write(
        tmp.path().join("config/default.toml"),
        r#"
            [dispatcher]
            failure_history = 5
        "#,
    )
    .expect("write config file");

    let _cwd = CurrentDir::enter(&tmp);
    temp_env::with_vars_unset(ENV_KEYS, || {
        let cfg = load_config().expect("malformed .env must not fail loading");
        assert_eq!(cfg.dispatcher.failure_history, 5);
    });
}
