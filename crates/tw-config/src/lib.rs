//! # tw-config
//!
//! Layered settings for the Tech World server.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. optional TOML file (`config/techworld.toml`, or the path in `TW_CONFIG`)
//! 3. legacy deployment variables (`PORT`, `DB_USER`, `DB_PASS`, `ACCESS_TOKEN_SECRET`)
//! 4. `TW__SECTION__KEY` environment variables
//!
//! A `.env` file in the working directory is loaded into the process
//! environment before any of the above is read.

use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config/techworld";

/// Legacy variable name → settings key. Kept so existing deployments keep working.
const LEGACY_VARS: [(&str, &str); 4] = [
    ("PORT", "server.port"),
    ("DB_USER", "database.user"),
    ("DB_PASS", "database.password"),
    ("ACCESS_TOKEN_SECRET", "auth.token_secret"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
    /// The `.env` file merged into the environment by `load`, if any.
    #[serde(skip)]
    pub dotenv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbBackend {
    Mongo,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub backend: DbBackend,
    /// Full MongoDB connection string; takes priority over the credential fields.
    #[serde(default)]
    pub uri: Option<SecretString>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Atlas cluster host used with `user`/`password` (e.g. `cluster0.abcde.mongodb.net`).
    #[serde(default)]
    pub cluster: Option<String>,
    /// Database name holding the collections.
    pub name: String,
    pub sqlite_url: String,
}

impl DatabaseSettings {
    /// Resolves the MongoDB connection string.
    ///
    /// Credentials are percent-encoded so that passwords containing `@` or `:`
    /// survive URI parsing.
    pub fn mongo_uri(&self) -> SecretString {
        if let Some(uri) = &self.uri {
            return SecretString::from(uri.expose_secret().to_owned());
        }
        match (&self.user, &self.password, &self.cluster) {
            (Some(user), Some(password), Some(cluster)) => SecretString::from(format!(
                "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
                urlencoding::encode(user),
                urlencoding::encode(password.expose_secret()),
                cluster
            )),
            _ => SecretString::from("mongodb://localhost:27017".to_owned()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub token_secret: SecretString,
    pub token_ttl_secs: u64,
    /// When set, mutating routes require a bearer token issued by `/jwt`.
    pub enforce: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Settings {
    /// Loads settings from `.env`, the config file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is the normal case in containers.
        let dotenv = dotenvy::dotenv().ok();

        let vars: HashMap<String, String> = std::env::vars().collect();
        let file = vars
            .get("TW_CONFIG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut settings = Self::from_sources(Some(&file), vars)?;
        settings.dotenv_path = dotenv;
        Ok(settings)
    }

    /// Builds settings from an optional file and an explicit variable map.
    ///
    /// `TW__` values stay strings until deserialization so secrets such as
    /// `007` are never reinterpreted as numbers.
    pub fn from_sources(file: Option<&str>, vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.backend", "mongo")?
            .set_default("database.name", "techDB")?
            .set_default("database.sqlite_url", "sqlite://techworld.db")?
            .set_default("auth.token_secret", "")?
            .set_default("auth.token_ttl_secs", 7200)?
            .set_default("auth.enforce", false)?
            .set_default("log.format", "pretty")?
            .set_default("log.filter", "info,tower_http=info")?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        for (var, key) in LEGACY_VARS {
            let prefixed = format!("TW__{}", key.replace('.', "__").to_uppercase());
            if vars.contains_key(&prefixed) {
                continue;
            }
            builder = builder.set_override_option(key, vars.get(var).cloned())?;
        }

        builder = builder.add_source(
            Environment::with_prefix("TW")
                .separator("__")
                .source(Some(vars)),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid {
                key: "auth.token_secret",
                reason: "must be set (ACCESS_TOKEN_SECRET or TW__AUTH__TOKEN_SECRET)".into(),
            });
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "auth.token_ttl_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.database.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "database.name",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
