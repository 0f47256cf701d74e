//! Settings loading through every layer: defaults, global file, explicit file, environment.

use dynframe::config::{global_config_path, ConfigLoader, DEFAULT_TRACE_BANNER};
use dynframe::SettingsError;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

// Environment variables are process-wide
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "DYNFRAME_DEFAULT_NAME",
    "DYNFRAME_TRACE_BANNER",
    "DYNFRAME_ORIGIN_LOCATIONS",
    "DYNFRAME_LOGGING__LEVEL",
];

struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}

impl EnvSnapshot {
    fn take(extra: &[&str]) -> Self {
        let saved = ENV_KEYS
            .iter()
            .chain(extra)
            .map(|key| (key.to_string(), std::env::var(key).ok()))
            .collect();
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        EnvSnapshot { saved }
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn write_settings(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_file_then_environment_override() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _env = EnvSnapshot::take(&["XDG_CONFIG_HOME"]);
    let home = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        "dynframe.toml",
        r#"
default_name = "from-file"
trace_banner = "== file =="

[logging]
level = "debug"
"#,
    );

    std::env::set_var("DYNFRAME_TRACE_BANNER", "== env ==");
    std::env::set_var("DYNFRAME_ORIGIN_LOCATIONS", "false");

    let settings = ConfigLoader::load_with_file(&path).unwrap();
    assert_eq!(settings.default_name, "from-file");
    assert_eq!(settings.trace_banner, "== env ==");
    assert!(!settings.origin_locations);
    assert_eq!(settings.logging.level, "debug");
}

#[test]
fn test_global_file_is_layered_under_explicit_file() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _env = EnvSnapshot::take(&["XDG_CONFIG_HOME"]);
    let home = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    let global = global_config_path().unwrap();
    assert!(global.starts_with(home.path()));
    fs::create_dir_all(global.parent().unwrap()).unwrap();
    fs::write(
        &global,
        "default_name = \"global\"\ntrace_banner = \"-- global --\"\n",
    )
    .unwrap();

    let only_global = ConfigLoader::load().unwrap();
    assert_eq!(only_global.default_name, "global");
    assert_eq!(only_global.trace_banner, "-- global --");

    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "local.toml", "default_name = \"local\"\n");
    let layered = ConfigLoader::load_with_file(&path).unwrap();
    assert_eq!(layered.default_name, "local");
    assert_eq!(layered.trace_banner, "-- global --");
}

#[test]
fn test_load_without_any_files_gives_defaults() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _env = EnvSnapshot::take(&["XDG_CONFIG_HOME"]);
    let home = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    let settings = ConfigLoader::load().unwrap();
    assert_eq!(settings.default_name, "unnamed");
    assert_eq!(settings.trace_banner, DEFAULT_TRACE_BANNER);
    assert!(settings.origin_locations);
    assert_eq!(settings.logging.format, "text");
}

#[test]
fn test_invalid_environment_value_is_rejected() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _env = EnvSnapshot::take(&["XDG_CONFIG_HOME"]);
    let home = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", home.path());
    std::env::set_var("DYNFRAME_DEFAULT_NAME", "   ");

    let result = ConfigLoader::load();
    assert!(matches!(result, Err(SettingsError::Invalid(_))));
}
