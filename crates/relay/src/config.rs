use std::{fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub max_message_bytes: usize,
    pub event_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3005".into(),
            max_message_bytes: 16 * 1024,
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    max_message_bytes: Option<usize>,
    event_capacity: Option<usize>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(
                path = %config_path.display(),
                %err,
                "config: ignoring invalid relay config file"
            ),
        }
    }

    apply_env(&mut settings, env);
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.max_message_bytes {
        settings.max_message_bytes = v;
    }
    if let Some(v) = file_cfg.event_capacity {
        settings.event_capacity = v;
    }
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("APP__MAX_MESSAGE_BYTES") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.max_message_bytes = parsed,
            Err(_) => warn!(value = %v, "config: APP__MAX_MESSAGE_BYTES is not a number"),
        }
    }

    if let Some(v) = env("APP__EVENT_CAPACITY") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.event_capacity = parsed,
            Err(_) => warn!(value = %v, "config: APP__EVENT_CAPACITY is not a number"),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
