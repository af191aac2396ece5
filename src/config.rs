use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_ENV: &str = "KAIWA_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub stream: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let path = config_path()?;
    load_profile_from(&path, name)
}

fn load_profile_from(path: &Path, name: &str) -> Result<ProfileConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;

    let config: ConfigFile = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;

    let profiles = config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })?;

    profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })
}

fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("kaiwa").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        "Cannot resolve config path: set KAIWA_CONFIG or HOME/XDG_CONFIG_HOME.".to_string()
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("kaiwa")
        .join("config.toml"))
}

/// Relay server settings, loaded from a JSON file at startup. Endpoint and
/// key are required; their absence is fatal, never defaulted.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl RelaySettings {
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("Failed to read settings file '{}': {err}", path.display()))?;
        let settings: RelaySettings = serde_json::from_str(&raw)
            .map_err(|err| format!("Failed to parse settings file '{}': {err}", path.display()))?;

        if settings.endpoint.trim().is_empty() {
            return Err(format!(
                "Settings file '{}' does not set 'endpoint'.",
                path.display()
            ));
        }
        if settings.api_key.trim().is_empty() {
            return Err(format!(
                "Settings file '{}' does not set 'api_key'.",
                path.display()
            ));
        }
        Ok(settings)
    }
}
