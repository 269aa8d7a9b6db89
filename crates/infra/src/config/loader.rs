//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. Individual environment variables override file values
//!
//! ## Environment Variables
//! Required when loading from the environment alone:
//! - `ENTSYNC_API_BASE_URL`: Entitlement API base URL
//! - `ENTSYNC_NETWORK`: `WHATSAPP` or `WECHAT`
//! - `ENTSYNC_PRIVATE_KEY_PATH`: PEM signing key
//! - `ENTSYNC_PUBLIC_KEY_ID`: Customer public key identifier
//!
//! Optional:
//! - `ENTSYNC_POD_ID`, `ENTSYNC_REQUEST_TIMEOUT_SECS`, `ENTSYNC_MAX_PAGES`,
//!   `ENTSYNC_TOKEN_TTL_SECS`
//! - `ENTSYNC_HTTP_PROXY`, `ENTSYNC_HTTPS_PROXY`, `ENTSYNC_TRUSTSTORE_PATH`
//! - `ENTSYNC_INPUT`, `ENTSYNC_OUTPUT`, `ENTSYNC_ROSTER`, `ENTSYNC_FORMAT`
//! - `ENTSYNC_POD_BASE_URL` enables the pod section, together with
//!   `ENTSYNC_POD_BOT_USERNAME`, `ENTSYNC_POD_PRIVATE_KEY_PATH`,
//!   `ENTSYNC_POD_SESSION_AUTH_URL`, `ENTSYNC_POD_APP_ID` and
//!   `ENTSYNC_POD_PAGE_SIZE`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./entsync.json` or `./entsync.toml` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use entsync_domain::constants::{
    DEFAULT_MAX_PAGES, DEFAULT_POD_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_TTL_SECS,
};
use entsync_domain::{
    ApiConfig, AppConfig, CredentialConfig, EntsyncError, FileConfig, PodConfig, ProxyConfig,
    Result,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["config.json", "config.toml", "entsync.json", "entsync.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file, on top
/// of which individual variables are applied.
///
/// # Errors
/// Returns `EntsyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            let mut config = load_from_file(None)?;
            apply_env_overrides(&mut config)?;
            Ok(config)
        }
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present. Returns an error
/// if any are missing.
///
/// # Errors
/// Returns `EntsyncError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<AppConfig> {
    let mut config = AppConfig {
        api: ApiConfig {
            base_url: env_var("ENTSYNC_API_BASE_URL")?,
            network: env_parse("ENTSYNC_NETWORK")?,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_pages: DEFAULT_MAX_PAGES,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        },
        credentials: CredentialConfig {
            private_key_path: PathBuf::from(env_var("ENTSYNC_PRIVATE_KEY_PATH")?),
            public_key_id: env_var("ENTSYNC_PUBLIC_KEY_ID")?,
            pod_id: None,
        },
        proxy: ProxyConfig::default(),
        truststore_path: None,
        pod: None,
        files: FileConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply any `ENTSYNC_*` variables that are set on top of `config`.
///
/// # Errors
/// Returns `EntsyncError::Config` when a set variable has an invalid value,
/// or when `ENTSYNC_POD_BASE_URL` enables a pod section that is missing its
/// bot username or key.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Some(url) = env_opt("ENTSYNC_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(network) = env_opt_parse("ENTSYNC_NETWORK")? {
        config.api.network = network;
    }
    if let Some(secs) = env_opt_parse("ENTSYNC_REQUEST_TIMEOUT_SECS")? {
        config.api.request_timeout_secs = secs;
    }
    if let Some(pages) = env_opt_parse("ENTSYNC_MAX_PAGES")? {
        config.api.max_pages = pages;
    }
    if let Some(ttl) = env_opt_parse("ENTSYNC_TOKEN_TTL_SECS")? {
        config.api.token_ttl_secs = ttl;
    }

    if let Some(path) = env_opt("ENTSYNC_PRIVATE_KEY_PATH") {
        config.credentials.private_key_path = PathBuf::from(path);
    }
    if let Some(id) = env_opt("ENTSYNC_PUBLIC_KEY_ID") {
        config.credentials.public_key_id = id;
    }
    if let Some(pod_id) = env_opt("ENTSYNC_POD_ID") {
        config.credentials.pod_id = Some(pod_id);
    }

    if let Some(proxy) = env_opt("ENTSYNC_HTTP_PROXY") {
        config.proxy.http = Some(proxy);
    }
    if let Some(proxy) = env_opt("ENTSYNC_HTTPS_PROXY") {
        config.proxy.https = Some(proxy);
    }
    if let Some(path) = env_opt("ENTSYNC_TRUSTSTORE_PATH") {
        config.truststore_path = Some(PathBuf::from(path));
    }

    if let Some(path) = env_opt("ENTSYNC_INPUT") {
        config.files.input = PathBuf::from(path);
    }
    if let Some(path) = env_opt("ENTSYNC_OUTPUT") {
        config.files.output = PathBuf::from(path);
    }
    if let Some(path) = env_opt("ENTSYNC_ROSTER") {
        config.files.roster = PathBuf::from(path);
    }
    if let Some(format) = env_opt_parse("ENTSYNC_FORMAT")? {
        config.files.format = format;
    }

    apply_pod_overrides(config)
}

fn apply_pod_overrides(config: &mut AppConfig) -> Result<()> {
    if config.pod.is_none() {
        let Some(base_url) = env_opt("ENTSYNC_POD_BASE_URL") else {
            return Ok(());
        };
        config.pod = Some(PodConfig {
            base_url,
            session_auth_url: None,
            bot_username: env_var("ENTSYNC_POD_BOT_USERNAME")?,
            private_key_path: PathBuf::from(env_var("ENTSYNC_POD_PRIVATE_KEY_PATH")?),
            app_id: None,
            page_size: DEFAULT_POD_PAGE_SIZE,
        });
    }

    let Some(pod) = config.pod.as_mut() else {
        return Ok(());
    };
    if let Some(url) = env_opt("ENTSYNC_POD_BASE_URL") {
        pod.base_url = url;
    }
    if let Some(url) = env_opt("ENTSYNC_POD_SESSION_AUTH_URL") {
        pod.session_auth_url = Some(url);
    }
    if let Some(bot) = env_opt("ENTSYNC_POD_BOT_USERNAME") {
        pod.bot_username = bot;
    }
    if let Some(path) = env_opt("ENTSYNC_POD_PRIVATE_KEY_PATH") {
        pod.private_key_path = PathBuf::from(path);
    }
    if let Some(app_id) = env_opt("ENTSYNC_POD_APP_ID") {
        pod.app_id = Some(app_id);
    }
    if let Some(size) = env_opt_parse("ENTSYNC_POD_PAGE_SIZE")? {
        pod.page_size = size;
    }
    Ok(())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `EntsyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(EntsyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            EntsyncError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| EntsyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `EntsyncError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| EntsyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| EntsyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(EntsyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe well-known paths for a configuration file
///
/// Searches the current working directory first, then the directory of the
/// executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `EntsyncError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        EntsyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty environment variable, if set
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt_parse(key)?.ok_or_else(|| {
        EntsyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_opt_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| EntsyncError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
