//! Configuration structures
//!
//! The configuration is resolved once, before any row is processed, and is
//! treated as read-only afterwards. Loading lives in the infra crate.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INPUT_FILE, DEFAULT_MAX_PAGES, DEFAULT_OUTPUT_FILE, DEFAULT_POD_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_ROSTER_FILE, DEFAULT_TOKEN_TTL_SECS,
};
use crate::{EntsyncError, InputFormat, Network, Result};

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// PEM bundle that replaces the built-in TLS roots
    #[serde(default)]
    pub truststore_path: Option<PathBuf>,
    /// Pod admin API, enables email resolution and app provisioning
    #[serde(default)]
    pub pod: Option<PodConfig>,
    #[serde(default)]
    pub files: FileConfig,
}

/// Entitlement API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL prepended to every resolved path (e.g. "https://ces.example.com")
    pub base_url: String,
    pub network: Network,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Hard cap on listing pages
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Signing key material and customer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub private_key_path: PathBuf,
    pub public_key_id: String,
    #[serde(default)]
    pub pod_id: Option<String>,
}

/// Outbound proxy settings, applied to every session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.as_deref().map_or(true, str::is_empty)
            && self.https.as_deref().map_or(true, str::is_empty)
    }
}

/// Pod admin API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodConfig {
    pub base_url: String,
    /// Host serving the pubkey authentication endpoint; defaults to `base_url`
    #[serde(default)]
    pub session_auth_url: Option<String>,
    pub bot_username: String,
    pub private_key_path: PathBuf,
    /// App toggled on ADD/REMOVE; no app side effects when absent
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default = "default_pod_page_size")]
    pub page_size: usize,
}

impl PodConfig {
    pub fn session_auth_url(&self) -> &str {
        self.session_auth_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Input/output locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_roster")]
    pub roster: PathBuf,
    #[serde(default)]
    pub format: InputFormat,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            roster: default_roster(),
            format: InputFormat::default(),
        }
    }
}

impl AppConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(EntsyncError::Config("api.base_url must not be empty".into()));
        }
        if self.api.max_pages == 0 {
            return Err(EntsyncError::Config("api.max_pages must be at least 1".into()));
        }
        if self.api.token_ttl_secs <= 0 {
            return Err(EntsyncError::Config("api.token_ttl_secs must be positive".into()));
        }
        if self.credentials.public_key_id.trim().is_empty() {
            return Err(EntsyncError::Config(
                "credentials.public_key_id must not be empty".into(),
            ));
        }
        if self.api.network == Network::WeChat
            && self.credentials.pod_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(EntsyncError::Config(format!(
                "credentials.pod_id is required for network {}",
                self.api.network
            )));
        }
        if let Some(pod) = &self.pod {
            if pod.page_size == 0 {
                return Err(EntsyncError::Config("pod.page_size must be at least 1".into()));
            }
        }
        Ok(())
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_token_ttl_secs() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_pod_page_size() -> usize {
    DEFAULT_POD_PAGE_SIZE
}

fn default_input() -> PathBuf {
    PathBuf::from(DEFAULT_INPUT_FILE)
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_roster() -> PathBuf {
    PathBuf::from(DEFAULT_ROSTER_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(network: &str) -> String {
        format!(
            r#"{{
                "api": {{ "base_url": "https://ces.example.com", "network": "{network}" }},
                "credentials": {{ "private_key_path": "rsa/key.pem", "public_key_id": "acme" }}
            }}"#
        )
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let config: AppConfig = serde_json::from_str(&minimal_json("WHATSAPP")).unwrap();
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.api.max_pages, 1000);
        assert_eq!(config.api.token_ttl_secs, 290);
        assert!(config.proxy.is_empty());
        assert!(config.pod.is_none());
        assert_eq!(config.files.input, PathBuf::from("whatsapp_user_entitlements.csv"));
        assert_eq!(config.files.format, InputFormat::Legacy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wechat_requires_pod_id() {
        let mut config: AppConfig = serde_json::from_str(&minimal_json("WECHAT")).unwrap();
        assert!(matches!(config.validate(), Err(EntsyncError::Config(msg)) if msg.contains("pod_id")));

        config.credentials.pod_id = Some("pod-7".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_page_cap_is_rejected() {
        let mut config: AppConfig = serde_json::from_str(&minimal_json("WHATSAPP")).unwrap();
        config.api.max_pages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_proxy_entries_count_as_empty() {
        let proxy = ProxyConfig { http: Some(String::new()), https: None };
        assert!(proxy.is_empty());
        let proxy = ProxyConfig { http: None, https: Some("http://proxy:3128".into()) };
        assert!(!proxy.is_empty());
    }
}
