use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use client_core::TransportSettings;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "chat.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub relay_url: String,
    pub reconnect: bool,
    pub reconnect_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            relay_url: transport.relay_url,
            reconnect: transport.reconnect,
            reconnect_delay_ms: transport.reconnect_delay.as_millis() as u64,
        }
    }
}

impl ClientSettings {
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            relay_url: self.relay_url.clone(),
            reconnect: self.reconnect,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    relay_url: Option<String>,
    reconnect: Option<bool>,
    reconnect_delay_ms: Option<u64>,
}

/// Defaults, then the config file, then environment. An explicitly requested
/// file must exist; the default `chat.toml` is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<ClientSettings> {
    load_settings_from(explicit_path, |key| std::env::var(key).ok())
}

fn load_settings_from(
    explicit_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    let (path, required) = match explicit_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        Err(err) if required => {
            return Err(err)
                .with_context(|| format!("failed to read config file {}", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, env);
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.relay_url {
        settings.relay_url = v;
    }
    if let Some(v) = file_cfg.reconnect {
        settings.reconnect = v;
    }
    if let Some(v) = file_cfg.reconnect_delay_ms {
        settings.reconnect_delay_ms = v;
    }
}

fn apply_env(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("CHAT_RELAY_URL") {
        settings.relay_url = v;
    }
    if let Some(v) = env("APP__RELAY_URL") {
        settings.relay_url = v;
    }

    if let Some(v) = env("APP__RECONNECT") {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => settings.reconnect = true,
            "0" | "false" | "no" => settings.reconnect = false,
            _ => warn!(value = %v, "config: APP__RECONNECT must be true or false"),
        }
    }

    if let Some(v) = env("APP__RECONNECT_DELAY_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.reconnect_delay_ms = parsed,
            Err(_) => warn!(value = %v, "config: APP__RECONNECT_DELAY_MS is not a number"),
        }
    }
}
