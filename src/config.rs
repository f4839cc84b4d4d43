//! Configuration parsing and validation for quickgpt.
//!
//! Configuration is resolved once at startup from built-in defaults, an
//! optional TOML file, and the process environment (highest precedence).
//! The resulting [`Config`] is immutable and shared by reference.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co/models";

const GROQ_TEXT_MODEL: &str = "llama-3.1-8b-instant";
const HUGGINGFACE_TEXT_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";

/// Default vision model, also the first built-in fallback.
pub const SCOUT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
/// Second built-in vision fallback.
pub const MAVERICK_VISION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen: String,
}

/// Which hosted API the relay talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    #[serde(alias = "hf")]
    HuggingFace,
}

impl ProviderKind {
    /// Parse a provider name as accepted in `QUICKGPT_PROVIDER`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "huggingface" | "hf" => Some(Self::HuggingFace),
            _ => None,
        }
    }

    /// Lowercase identifier reported by `/health`.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Human-readable name used as the prefix of upstream error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::HuggingFace => "HuggingFace",
        }
    }

    /// Environment variable holding the API credential.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::HuggingFace => "HF_TOKEN",
        }
    }

    fn text_model_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_MODEL",
            Self::HuggingFace => "HF_MODEL",
        }
    }

    fn vision_model_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_VISION_MODEL",
            Self::HuggingFace => "HF_VISION_MODEL",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => GROQ_BASE_URL,
            Self::HuggingFace => HUGGINGFACE_BASE_URL,
        }
    }

    fn default_text_model(&self) -> &'static str {
        match self {
            Self::Groq => GROQ_TEXT_MODEL,
            Self::HuggingFace => HUGGINGFACE_TEXT_MODEL,
        }
    }

    fn default_max_tokens(&self) -> u32 {
        match self {
            Self::Groq => 450,
            Self::HuggingFace => 250,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Absent keys are reported on the first request, not at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
    /// Base URL of the provider API, without the endpoint path.
    pub base_url: String,
    /// Model used when the conversation carries no images.
    pub text_model: String,
    /// Preferred model when the conversation carries images.
    pub vision_model: String,
    /// Ordered vision candidates, starting with `vision_model`. Never empty.
    pub vision_fallbacks: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout for the upstream HTTP client, in seconds.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pacing of the simulated SSE stream.
#[derive(Debug, Clone, Serialize)]
pub struct RelayConfig {
    /// Characters per `delta` event.
    pub chunk_chars: usize,
    /// Pause between consecutive `delta` events, in milliseconds.
    pub chunk_delay_ms: u64,
    /// Upper bound on the upstream phase of a streamed request, in seconds.
    pub max_duration_secs: u64,
}

impl RelayConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 22,
            chunk_delay_ms: 20,
            max_duration_secs: 120,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "quickgpt=info,tower_http=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' referenced by {field}: {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Raw configuration deserialized directly from TOML.
///
/// Every field is optional; gaps are filled from the environment and then
/// from provider-specific defaults in [`Config::resolve`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub server: RawServerConfig,
    #[serde(default)]
    pub provider: RawProviderConfig,
    #[serde(default)]
    pub relay: RawRelayConfig,
    #[serde(default)]
    pub logging: RawLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    pub listen: Option<String>,
}

/// `api_key` is a plain string so it may contain `${VAR}` references.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProviderConfig {
    pub kind: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub text_model: Option<String>,
    pub vision_model: Option<String>,
    pub vision_fallbacks: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRelayConfig {
    pub chunk_chars: Option<usize>,
    pub chunk_delay_ms: Option<u64>,
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple references in one string. Fails on the first missing
/// variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: String::new(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!("'{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Build the ordered vision candidate list, dropping repeats and blanks.
fn vision_candidates(primary: &str, extra: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(extra.len() + 1);
    for model in std::iter::once(primary).chain(extra.iter().map(String::as_str)) {
        let model = model.trim();
        if !model.is_empty() && !out.iter().any(|m| m == model) {
            out.push(model.to_string());
        }
    }
    out
}

/// Read a variable, treating empty or whitespace-only values as unset.
fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Parse a TOML string and resolve it against the process environment.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::resolve(raw, |name| std::env::var(name).ok())
    }

    /// Load configuration from an optional TOML file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => Self::read_raw(path)?,
            None => RawConfig::default(),
        };
        Self::resolve(raw, |name| std::env::var(name).ok())
    }

    fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Merge raw file values with variables from `lookup` and fill defaults.
    ///
    /// Environment values take precedence over file values. The closure keeps
    /// this testable without touching global env state.
    pub fn resolve<F>(raw: RawConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = match non_empty(&lookup, "QUICKGPT_PROVIDER") {
            Some(name) => ProviderKind::parse(&name).ok_or_else(|| {
                ConfigError::Validation(format!("Unknown provider '{}' in QUICKGPT_PROVIDER", name))
            })?,
            None => raw.provider.kind.unwrap_or_default(),
        };

        let listen = match non_empty(&lookup, "PORT") {
            Some(port) => {
                let port: u16 = port.parse().map_err(|_| {
                    ConfigError::Validation(format!("PORT '{}' is not a valid port number", port))
                })?;
                format!("0.0.0.0:{}", port)
            }
            None => raw
                .server
                .listen
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let api_key = match non_empty(&lookup, kind.api_key_var()) {
            Some(key) => Some(ApiKey::from(key)),
            None => match raw.provider.api_key {
                Some(raw_key) => {
                    let expanded = expand_env_vars_with(&raw_key, "provider.api_key", &lookup)?;
                    Some(expanded)
                        .filter(|k| !k.trim().is_empty())
                        .map(ApiKey::from)
                }
                None => None,
            },
        };

        let text_model = non_empty(&lookup, kind.text_model_var())
            .or(raw.provider.text_model)
            .unwrap_or_else(|| kind.default_text_model().to_string());

        // Hugging Face inference has no multimodal path; images are flattened away.
        let default_vision = match kind {
            ProviderKind::Groq => SCOUT_VISION_MODEL.to_string(),
            ProviderKind::HuggingFace => text_model.clone(),
        };
        let vision_model = non_empty(&lookup, kind.vision_model_var())
            .or(raw.provider.vision_model)
            .unwrap_or(default_vision);

        let extra_fallbacks = raw.provider.vision_fallbacks.unwrap_or_else(|| match kind {
            ProviderKind::Groq => vec![
                SCOUT_VISION_MODEL.to_string(),
                MAVERICK_VISION_MODEL.to_string(),
            ],
            ProviderKind::HuggingFace => Vec::new(),
        });
        let vision_fallbacks = vision_candidates(&vision_model, &extra_fallbacks);

        let relay_defaults = RelayConfig::default();
        let config = Config {
            server: ServerConfig { listen },
            provider: ProviderConfig {
                kind,
                api_key,
                base_url: raw
                    .provider
                    .base_url
                    .unwrap_or_else(|| kind.default_base_url().to_string()),
                text_model,
                vision_model,
                vision_fallbacks,
                temperature: raw.provider.temperature.unwrap_or(0.7),
                max_tokens: raw
                    .provider
                    .max_tokens
                    .unwrap_or_else(|| kind.default_max_tokens()),
                timeout_secs: raw.provider.timeout_secs.unwrap_or(120),
            },
            relay: RelayConfig {
                chunk_chars: raw.relay.chunk_chars.unwrap_or(relay_defaults.chunk_chars),
                chunk_delay_ms: raw
                    .relay
                    .chunk_delay_ms
                    .unwrap_or(relay_defaults.chunk_delay_ms),
                max_duration_secs: raw
                    .relay
                    .max_duration_secs
                    .unwrap_or(relay_defaults.max_duration_secs),
            },
            logging: LoggingConfig {
                level: raw
                    .logging
                    .level
                    .unwrap_or_else(|| LoggingConfig::default().level),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("provider.base_url is empty".to_string()));
        }
        if self.provider.text_model.trim().is_empty() {
            return Err(ConfigError::Validation("provider.text_model is empty".to_string()));
        }
        if self.provider.vision_fallbacks.is_empty() {
            return Err(ConfigError::Validation(
                "provider.vision_model is empty".to_string(),
            ));
        }
        if self.relay.chunk_chars == 0 {
            return Err(ConfigError::Validation(
                "relay.chunk_chars must be greater than zero".to_string(),
            ));
        }
        if self.provider.api_key.is_none() {
            tracing::warn!(
                var = self.provider.kind.api_key_var(),
                "No API key configured - chat requests will fail until one is set"
            );
        }
        Ok(())
    }
}
