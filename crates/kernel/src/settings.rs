use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "DBSEED_ENV";
const CONFIG_DIR_ENV: &str = "DBSEED_CONFIG_DIR";
const ENV_PREFIX: &str = "DBSEED";

/// Variables read by the service this bootstrapper was split out of, mapped
/// onto their `database.*` keys so existing deployments keep working.
const LEGACY_DATABASE_VARS: &[(&str, &str)] = &[
    ("MONGODB_URL", "database.host"),
    ("MONGODB_PORT", "database.port"),
    ("MONGODB_USERNAME", "database.username"),
    ("MONGODB_PASSWORD", "database.password"),
];

/// Deployment environment the bootstrapper is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
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
    pub database: DatabaseSettings,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `DBSEED_*` variables, and the legacy `MONGODB_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        let builder = Self::env_sources(
            Self::file_sources(&config_dir, &environment),
            Self::prefixed_env(),
            |var| std::env::var(var).ok(),
        )?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        Self::from_config(cfg, &environment)
    }

    fn file_sources(
        config_dir: &Path,
        environment: &str,
    ) -> config::ConfigBuilder<config::builder::DefaultState> {
        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
    }

    fn prefixed_env() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Layer the `DBSEED_*` source, then the legacy variables on top of it.
    fn env_sources<F>(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        prefixed: config::Environment,
        legacy_var: F,
    ) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = builder.add_source(prefixed);
        for &(var, key) in LEGACY_DATABASE_VARS {
            builder = builder
                .set_override_option(key, legacy_var(var))
                .with_context(|| format!("failed to apply {}", var))?;
        }
        Ok(builder)
    }

    /// Deserialize an already-built configuration and stamp the environment.
    pub fn from_config(cfg: config::Config, environment: &str) -> anyhow::Result<Self> {
        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = Environment::parse(environment)?;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Full connection string; when set, host/port/credentials are ignored.
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "DatabaseSettings::default_auth_source")]
    pub auth_source: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        27017
    }

    fn default_auth_source() -> String {
        "admin".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        10000
    }

    fn default_app_name() -> String {
        "dbseed".to_string()
    }

    /// `host:port` or the configured URI with any password masked.
    pub fn display_target(&self) -> String {
        match &self.uri {
            Some(uri) => redact_uri(uri),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: None,
            host: Self::default_host(),
            port: Self::default_port(),
            username: None,
            password: None,
            auth_source: Self::default_auth_source(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            app_name: Self::default_app_name(),
        }
    }
}

fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => {
            let user = rest[..at].split(':').next().unwrap_or_default();
            format!("{}://{}:****@{}", scheme, user, &rest[at + 1..])
        }
        None => uri.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BootstrapSettings {
    /// JSON spec file; the embedded default spec is used when unset.
    #[serde(default)]
    pub spec_path: Option<String>,
    #[serde(default)]
    pub halt_on_first_failure: bool,
    /// Exit zero even when some actions failed.
    #[serde(default)]
    pub allow_partial_failure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
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
