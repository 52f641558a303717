/// `load_config` module: merges an optional static YAML file with secrets from the environment
/// into the [`AppConfig`] the service runs with.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file (no secrets) into type-safe structs
/// - Inject secrets and overrides from environment variables (`.env` is honoured by `main`)
/// - Validate everything up front: time zone, admin key format, Admin API URL, port
/// - Produce clear diagnostics; all errors are `anyhow::Error` surfaced at the CLI boundary
///
/// # Environment
/// - `HOOK_BEARER_TOKEN` (required): token webhook callers must present
/// - `GHOST_ADMIN_API_KEY` (required): `<id>:<secret>` Admin API key
/// - `GHOST_ADMIN_API_URL`: Admin API root; required unless set in YAML
/// - `WEEK_TIMEZONE`: IANA zone for week buckets, default `Asia/Kolkata`
/// - `PORT`: listen port, default 8787
///
/// Environment values win over YAML values. Blank values count as unset.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use url::Url;
use weekly_digest_core::config::EngineConfig;
use weekly_digest_core::week::DEFAULT_TIME_ZONE;

use crate::ghost::AdminKey;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    ghost: GhostSection,
    #[serde(default)]
    week: WeekSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct GhostSection {
    admin_api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WeekSection {
    time_zone: Option<String>,
}

/// Fully merged runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub hook_bearer_token: String,
    pub ghost_admin_api_url: Url,
    pub ghost_admin_api_key: AdminKey,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("hook_bearer_token", &"<redacted>")
            .field("ghost_admin_api_url", &self.ghost_admin_api_url.as_str())
            .field("ghost_admin_api_key", &self.ghost_admin_api_key)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Loads the optional YAML file and injects required env vars for secrets.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`], reading variables through `lookup` instead of the process environment.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let static_conf = match path {
        Some(path) => read_static_config(path)?,
        None => {
            info!("No config file given, using environment only");
            StaticConfig::default()
        }
    };
    let env = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let hook_bearer_token = env("HOOK_BEARER_TOKEN").ok_or_else(|| {
        error!("HOOK_BEARER_TOKEN environment variable not set");
        anyhow::anyhow!("Missing required environment variable: HOOK_BEARER_TOKEN")
    })?;

    let raw_key = env("GHOST_ADMIN_API_KEY").ok_or_else(|| {
        error!("GHOST_ADMIN_API_KEY environment variable not set");
        anyhow::anyhow!("Missing required environment variable: GHOST_ADMIN_API_KEY")
    })?;
    let ghost_admin_api_key = AdminKey::parse(&raw_key).map_err(|e| {
        error!(error = %e, "GHOST_ADMIN_API_KEY is malformed");
        anyhow::Error::new(e)
    })?;

    let raw_url = env("GHOST_ADMIN_API_URL")
        .or(static_conf.ghost.admin_api_url)
        .ok_or_else(|| {
            error!("Ghost Admin API URL set neither in env nor config file");
            anyhow::anyhow!(
                "Missing required environment variable: GHOST_ADMIN_API_URL (or ghost.admin_api_url in the config file)"
            )
        })?;
    let ghost_admin_api_url = Url::parse(raw_url.trim_end_matches('/'))
        .with_context(|| format!("GHOST_ADMIN_API_URL is not a valid URL: {raw_url}"))?;

    let time_zone = env("WEEK_TIMEZONE")
        .or(static_conf.week.time_zone)
        .unwrap_or_else(|| DEFAULT_TIME_ZONE.name().to_string());
    let engine = EngineConfig::from_time_zone_name(&time_zone).map_err(|e| {
        error!(error = %e, time_zone = %time_zone, "Unsupported week time zone");
        anyhow::Error::new(e)
    })?;

    let port = match env("PORT") {
        Some(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?,
        None => static_conf.server.port.unwrap_or(DEFAULT_PORT),
    };
    let host = static_conf
        .server
        .host
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let config = AppConfig {
        host,
        port,
        hook_bearer_token,
        ghost_admin_api_url,
        ghost_admin_api_key,
        engine,
    };
    info!(
        host = %config.host,
        port = config.port,
        ghost_admin_api_url = %config.ghost_admin_api_url,
        time_zone = %config.engine.default_time_zone,
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn read_static_config(path: &Path) -> Result<StaticConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let config_content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    // An empty file is a valid, empty configuration.
    if config_content.trim().is_empty() {
        return Ok(StaticConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
