use std::fs;

use crm_insights::config::{ConfigError, ENV_BASE_URL, ENV_TOKEN, load_config_path, token_from_env};
use secrecy::ExposeSecret;
use serial_test::serial;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("crm_insights.toml");
    fs::write(&path, body).unwrap();
    path
}

// SAFETY (all env mutation below): every test in this file is #[serial].
fn clear_env() {
    unsafe {
        std::env::remove_var(ENV_BASE_URL);
        std::env::remove_var(ENV_TOKEN);
    }
}

#[test]
#[serial]
fn file_values_load() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        base_url = "https://crm.example.com"
        timezone = "Asia/Yekaterinburg"
        token_store = "session.json"

        [progressive]
        poll_interval_ms = 500
        max_polls = 10
        "#,
    );

    let cfg = load_config_path(&path).unwrap();
    assert_eq!(cfg.base_url, "https://crm.example.com");
    assert_eq!(cfg.tz().unwrap(), chrono_tz::Asia::Yekaterinburg);
    assert_eq!(cfg.progressive.total_budget_ms(), 5_000);
    assert_eq!(cfg.token_store.as_deref(), Some(std::path::Path::new("session.json")));
}

#[test]
#[serial]
fn env_overrides_base_url() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "base_url = \"https://file.example.com\"");

    unsafe { std::env::set_var(ENV_BASE_URL, " https://env.example.com ") };
    let cfg = load_config_path(&path).unwrap();
    clear_env();

    assert_eq!(cfg.base_url, "https://env.example.com");
}

#[test]
#[serial]
fn invalid_env_url_fails_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    unsafe { std::env::set_var(ENV_BASE_URL, "not a url") };
    let result = load_config_path(&path);
    clear_env();

    assert!(matches!(result, Err(ConfigError::Invalid { field: "base_url", .. })));
}

#[test]
#[serial]
fn token_comes_from_env() {
    clear_env();
    assert!(token_from_env().is_none());

    unsafe { std::env::set_var(ENV_TOKEN, "  abc123\n") };
    let token = token_from_env();
    clear_env();

    assert_eq!(token.unwrap().expose_secret(), "abc123");
}

#[test]
#[serial]
fn missing_file_is_a_read_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_config_path(dir.path().join("absent.toml")),
        Err(ConfigError::Read { .. })
    ));
}
