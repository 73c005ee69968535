use std::{env, fmt::Display, fs::read_to_string, path::Path, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_COLLECTION: &str = "responses";
pub const DEFAULT_PROGRESSIVE_COLLECTION: &str = "progressive_responses";
pub const DEFAULT_DATABASE: &str = "(default)";

const ACCESS_TOKEN: &str = "FIRESTORE_ACCESS_TOKEN";
const SECRETS_DIR: &str = "/run/secrets";
const SECRET_KEYS: [&str; 1] = [ACCESS_TOKEN];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
    Disabled,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            "none" | "disabled" => Ok(StoreBackend::Disabled),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub project_id: Option<String>,
    pub database_id: String,
    pub collection: String,
    pub progressive_collection: String,
    pub allowed_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub require_audience_type: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            project_id: None,
            database_id: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            progressive_collection: DEFAULT_PROGRESSIVE_COLLECTION.to_string(),
            allowed_origins: vec!["*".to_string()],
            store_backend: StoreBackend::Firestore,
            emulator_host: None,
            access_token: None,
            require_audience_type: false,
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        Self::from_lookup(|key| env_or_secret(key, Path::new(SECRETS_DIR)))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: try_load(&lookup, "PORT", "8080")?,
            project_id: optional(&lookup, "PROJECT_ID"),
            database_id: try_load(&lookup, "FIRESTORE_DATABASE", DEFAULT_DATABASE)?,
            collection: try_load(&lookup, "FS_COLLECTION", DEFAULT_COLLECTION)?,
            progressive_collection: try_load(
                &lookup,
                "FS_PROGRESSIVE_COLLECTION",
                DEFAULT_PROGRESSIVE_COLLECTION,
            )?,
            allowed_origins: parse_origins(&try_load::<String, _>(&lookup, "ALLOWED_ORIGINS", "*")?),
            store_backend: try_load(&lookup, "STORE_BACKEND", "firestore")?,
            emulator_host: optional(&lookup, "FIRESTORE_EMULATOR_HOST"),
            access_token: optional(&lookup, ACCESS_TOKEN),
            require_audience_type: try_load(&lookup, "REQUIRE_AUDIENCE_TYPE", "false")?,
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        warn!("ALLOWED_ORIGINS is empty, allowing any origin");
        return vec!["*".to_string()];
    }

    origins
}

/// Environment first, then a mounted secret for the keys that may hold credentials.
fn env_or_secret(key: &str, secrets_dir: &Path) -> Option<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            SECRET_KEYS
                .iter()
                .any(|secret| *secret == key)
                .then(|| read_secret(secrets_dir, key))
                .flatten()
        })
}

fn read_secret(secrets_dir: &Path, secret_name: &str) -> Option<String> {
    read_to_string(secrets_dir.join(secret_name))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}
