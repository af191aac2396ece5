use std::env;
use std::str::FromStr;

use crate::chat::request::GenerationParams;
use crate::config::{self, ProfileConfig};

pub(crate) const MODEL_ENV: &str = "KAIWA_MODEL";
pub(crate) const SYSTEM_ENV: &str = "KAIWA_SYSTEM";
pub(crate) const TEMPERATURE_ENV: &str = "KAIWA_TEMPERATURE";
pub(crate) const TOP_P_ENV: &str = "KAIWA_TOP_P";
pub(crate) const MAX_TOKENS_ENV: &str = "KAIWA_MAX_TOKENS";
pub(crate) const TIMEOUT_ENV: &str = "KAIWA_TIMEOUT";

pub(crate) const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

/// Values the command line supplied explicitly. They win over environment
/// variables, which win over the profile file.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedSettings {
    pub model: String,
    pub system: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub timeout_secs: Option<u64>,
    /// Profile-level streaming preference; the command decides the default.
    pub stream: Option<bool>,
}

impl ResolvedSettings {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }
}

pub(crate) fn resolve(
    profile: Option<&str>,
    overrides: Overrides,
) -> Result<ResolvedSettings, String> {
    let profile = profile
        .map(config::load_profile)
        .transpose()?
        .unwrap_or_else(ProfileConfig::default);

    let model = overrides
        .model
        .or_else(|| env_string(MODEL_ENV))
        .or(profile.model)
        .ok_or_else(|| format!("No model provided. Use --model or set {MODEL_ENV}."))?;

    let system = overrides
        .system
        .or_else(|| env_string(SYSTEM_ENV))
        .or(profile.system)
        .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string());

    let temperature = overrides
        .temperature
        .or(env_parse(TEMPERATURE_ENV)?)
        .or(profile.temperature)
        .unwrap_or(1.0);

    let top_p = overrides
        .top_p
        .or(env_parse(TOP_P_ENV)?)
        .or(profile.top_p)
        .unwrap_or(1.0);

    let max_tokens = overrides
        .max_tokens
        .or(env_parse(MAX_TOKENS_ENV)?)
        .or(profile.max_tokens)
        .unwrap_or(1000);

    let timeout_secs = overrides
        .timeout
        .or(env_parse(TIMEOUT_ENV)?)
        .or(profile.timeout);

    Ok(ResolvedSettings {
        model,
        system,
        temperature,
        top_p,
        max_tokens,
        timeout_secs,
        stream: profile.stream,
    })
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, String> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("Invalid {key} '{raw}'.")),
    }
}
