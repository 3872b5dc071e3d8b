use anyhow::{Context, Result};
use keyring::Entry;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DB_FILE: &str = "fitness_data.db";
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
pub const DEFAULT_API_KEY_REF: &str = "env:GROQ_API_KEY";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

const KEYRING_SERVICE: &str = "fitcoach_api_key";

/// Settings for the hosted completion service.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionConfig {
    pub api_url: String,
    pub model: String,
    // Reference to the key, e.g. 'env:GROQ_API_KEY' or 'keyring'
    pub api_key_ref: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub completion: CompletionConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment, after loading
    /// an optional `.env` file from the working directory.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => log::debug!("No .env file found"),
            Err(e) => return Err(e).context("Failed to read .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let temperature: f32 = parse_var(
            "FITCOACH_TEMPERATURE",
            lookup("FITCOACH_TEMPERATURE"),
            DEFAULT_TEMPERATURE,
        )?;
        if !(0.0..=1.0).contains(&temperature) {
            anyhow::bail!("FITCOACH_TEMPERATURE must be between 0.0 and 1.0, got {temperature}");
        }
        let max_tokens: u32 = parse_var(
            "FITCOACH_MAX_TOKENS",
            lookup("FITCOACH_MAX_TOKENS"),
            DEFAULT_MAX_TOKENS,
        )?;

        Ok(Self {
            database_path: PathBuf::from(get("FITCOACH_DB", DEFAULT_DB_FILE)),
            completion: CompletionConfig {
                api_url: get("FITCOACH_API_URL", DEFAULT_API_URL),
                model: get("FITCOACH_MODEL", DEFAULT_MODEL),
                api_key_ref: get("FITCOACH_API_KEY_REF", DEFAULT_API_KEY_REF),
                temperature,
                max_tokens,
            },
        })
    }
}

fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid value for {name}: '{value}'")),
        None => Ok(default),
    }
}

// --- API Key Retrieval ---

/// Resolves the completion API key named by `config.api_key_ref`, reading
/// either an environment variable (`env:NAME`) or the OS keyring (`keyring`).
pub fn get_api_key(config: &CompletionConfig) -> Result<String> {
    get_api_key_with(config, |name| std::env::var(name).ok())
}

pub(crate) fn get_api_key_with(
    config: &CompletionConfig,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    let key = match config.api_key_ref.as_str() {
        ref_str if ref_str.starts_with("env:") => {
            let env_var_name = ref_str.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            env_lookup(env_var_name).with_context(|| {
                format!(
                    "API key not found. Set {env_var_name} in the environment or a .env file \
                     (e.g. {env_var_name}='your_key_here')."
                )
            })?
        }
        "keyring" => {
            let entry = Entry::new(KEYRING_SERVICE, &config.model)
                .context("Failed to create keyring entry")?;
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            entry.get_password().with_context(|| {
                format!("Failed to get API key from keyring for model '{}'.", config.model)
            })?
        }
        other => anyhow::bail!("Unsupported api key reference format: {}", other),
    };

    if key.trim().is_empty() {
        anyhow::bail!("API key referenced by '{}' is empty", config.api_key_ref);
    }
    Ok(key.trim().to_string())
}

/// Stores an API key in the OS keyring for the configured model.
pub fn set_api_key_in_keyring(config: &CompletionConfig, api_key: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, &config.model)
        .context("Failed to create keyring entry for setting password")?;
    log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
    entry
        .set_password(api_key)
        .with_context(|| format!("Failed to set API key in keyring for model '{}'", config.model))
}
