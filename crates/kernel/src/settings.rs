use std::path::PathBuf;

use anyhow::{anyhow, Context};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "QUILL_ENV";
const CONFIG_DIR_ENV: &str = "QUILL_CONFIG_DIR";
const ENV_PREFIX: &str = "QUILL";
const ENV_SEPARATOR: &str = "__";
/// Conventional variable name for the Gemini key, honoured when the
/// generator section carries none.
const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub media: MediaSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment file
    /// and `QUILL__SECTION__KEY` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment: Environment = std::env::var(ENV_VAR_NAME)
            .unwrap_or_else(|_| DEFAULT_ENV.to_string())
            .parse()?;

        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let mut settings = Self::load_from(&config_dir, &environment)?;
        settings.environment = environment;

        if settings.generator.api_key.is_none() {
            settings.generator.api_key = non_blank_key(std::env::var(GEMINI_KEY_ENV).ok().map(Secret::new));
        }

        Ok(settings)
    }

    /// Build settings from `base.toml` and `{environment}.toml` in `config_dir`,
    /// overlaid with prefixed environment variables. Missing files are skipped.
    pub fn load_from(config_dir: &std::path::Path, environment: &Environment) -> anyhow::Result<Self> {
        let environment_name = match environment {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment_name));

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Self = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;
        settings.generator.api_key = non_blank_key(settings.generator.api_key.take());
        Ok(settings)
    }
}

/// An empty or whitespace-only key counts as no key.
fn non_blank_key(key: Option<Secret<String>>) -> Option<Secret<String>> {
    key.filter(|key| !key.expose_secret().trim().is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    // Generation round-trips routinely take tens of seconds.
    fn default_request_timeout_ms() -> u64 {
        120_000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://quill.db?mode=rwc".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// Default directive when `RUST_LOG` is unset
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info,sqlx=warn".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_min_password_length")]
    pub min_password_length: usize,
}

impl AuthSettings {
    fn default_min_password_length() -> usize {
        8
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            min_password_length: Self::default_min_password_length(),
        }
    }
}

/// Connection details for the hosted text-generation provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "GeneratorSettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "GeneratorSettings::default_model")]
    pub model: String,
    #[serde(default = "GeneratorSettings::default_temperature")]
    pub temperature: f32,
}

impl GeneratorSettings {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com".to_string()
    }

    fn default_model() -> String {
        "gemini-2.0-flash".to_string()
    }

    fn default_temperature() -> f32 {
        0.7
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            temperature: Self::default_temperature(),
        }
    }
}

/// Where uploaded images live and how they are exposed.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "MediaSettings::default_root")]
    pub root: PathBuf,
    #[serde(default = "MediaSettings::default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "MediaSettings::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl MediaSettings {
    fn default_root() -> PathBuf {
        PathBuf::from("media")
    }

    fn default_url_prefix() -> String {
        "/media".to_string()
    }

    fn default_max_upload_bytes() -> usize {
        10 * 1024 * 1024
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            url_prefix: Self::default_url_prefix(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}
