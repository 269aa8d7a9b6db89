//! Pod admin API client
//!
//! Resolves email addresses to pod user ids and toggles the companion app
//! for a user. Authentication is a bot JWT exchanged for a session token,
//! which every call then sends in a `sessionToken` header.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use entsync_core::{AppProvisioner, UserDirectory};
use entsync_domain::{AppConfig, EntsyncError, PodConfig, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::api::{sign_rs512, Claims};
use crate::errors::map_infra;
use crate::http::SessionFactory;

const AUTHENTICATE_PATH: &str = "/login/pubkey/authenticate";
// Header names are case-insensitive; `HeaderName::from_static` needs lowercase.
const SESSION_TOKEN_HEADER: &str = "sessiontoken";
const ENABLED: &str = "ENABLED";

/// Active pod users keyed by lower-cased email and username.
#[derive(Debug, Default)]
struct UserIndex {
    by_email: HashMap<String, u64>,
    by_username: HashMap<String, u64>,
}

impl UserIndex {
    fn lookup(&self, key: &str) -> Option<u64> {
        let key = key.trim().to_lowercase();
        self.by_email.get(&key).or_else(|| self.by_username.get(&key)).copied()
    }
}

/// Blocking client for the pod admin API.
pub struct PodClient {
    base_url: String,
    auth_url: String,
    bot_username: String,
    private_key_path: PathBuf,
    app_id: Option<String>,
    page_size: usize,
    max_pages: usize,
    ttl: Duration,
    sessions: SessionFactory,
    session_token: Mutex<Option<String>>,
    users: OnceCell<UserIndex>,
}

impl PodClient {
    pub fn new(pod: &PodConfig, sessions: SessionFactory, token_ttl_secs: i64, max_pages: usize) -> Self {
        Self {
            base_url: pod.base_url.trim_end_matches('/').to_string(),
            auth_url: pod.session_auth_url().trim_end_matches('/').to_string(),
            bot_username: pod.bot_username.clone(),
            private_key_path: pod.private_key_path.clone(),
            app_id: pod.app_id.clone().filter(|id| !id.is_empty()),
            page_size: pod.page_size,
            max_pages,
            ttl: Duration::seconds(token_ttl_secs),
            sessions,
            session_token: Mutex::new(None),
            users: OnceCell::new(),
        }
    }

    /// Client for the configured pod, or `None` when no pod section is set.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` if the trust store cannot be loaded.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let Some(pod) = &config.pod else {
            return Ok(None);
        };

        let sessions = SessionFactory::builder()
            .timeout(config.api.request_timeout())
            .proxy(config.proxy.clone())
            .trust_store(config.truststore_path.clone())
            .build()?;

        Ok(Some(Self::new(pod, sessions, config.api.token_ttl_secs, config.api.max_pages)))
    }

    /// Exchange a signed bot JWT for a session token.
    #[instrument(skip(self), fields(bot = %self.bot_username))]
    fn authenticate(&self) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: self.bot_username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let jwt = sign_rs512(&self.private_key_path, &claims)?;

        let session = self.sessions.build_with_headers(HeaderMap::new())?;
        let url = format!("{}{AUTHENTICATE_PATH}", self.auth_url);
        let request = session.request(Method::POST, &url).json(&json!({ "token": jwt }));
        let response = session.send(request)?;
        let status = response.status();
        let body = response.text().map_err(map_infra)?;

        if !status.is_success() {
            return Err(EntsyncError::AuthExpired(format!(
                "pod authentication failed with status {status}: {body}"
            )));
        }

        let token = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("token").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| {
                EntsyncError::AuthExpired("pod authentication response has no token".into())
            })?;

        info!("pod session established");
        Ok(token)
    }

    fn session_token(&self) -> Result<String> {
        let mut slot = self.session_token.lock();
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.authenticate()?;
        *slot = Some(token.clone());
        Ok(token)
    }

    fn reauthenticate(&self, stale: &str) -> Result<String> {
        let mut slot = self.session_token.lock();
        if let Some(token) = slot.as_ref().filter(|token| token.as_str() != stale) {
            return Ok(token.clone());
        }
        slot.take();
        let token = self.authenticate()?;
        *slot = Some(token.clone());
        Ok(token)
    }

    fn send(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<(StatusCode, String)> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token)
            .map_err(|_| EntsyncError::AuthExpired("session token is not a valid header".into()))?;
        headers.insert(HeaderName::from_static(SESSION_TOKEN_HEADER), value);

        let session = self.sessions.build_with_headers(headers)?;
        let url = format!("{}{path}", self.base_url);
        let mut request = session.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = session.send(request)?;
        let status = response.status();
        let text = response.text().map_err(map_infra)?;
        Ok((status, text))
    }

    /// Authenticated call with one re-authentication on 401. Successful
    /// bodies are decoded as JSON; an empty body is `null`.
    fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.session_token()?;
        let (mut status, mut text) = self.send(&method, path, body, &token)?;

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "pod session rejected, re-authenticating once");
            let fresh = self.reauthenticate(&token)?;
            (status, text) = self.send(&method, path, body, &fresh)?;
            if status == StatusCode::UNAUTHORIZED {
                self.session_token.lock().take();
                return Err(EntsyncError::AuthExpired(format!(
                    "{method} {path} rejected the refreshed pod session"
                )));
            }
        }

        if !status.is_success() {
            warn!(path, status = status.as_u16(), body = %text, "pod call failed");
            return Err(EntsyncError::RemoteCall { status: status.as_u16(), body: text });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            EntsyncError::RemoteCall {
                status: status.as_u16(),
                body: format!("undecodable pod response ({e}): {text}"),
            }
        })
    }

    fn users(&self) -> Result<&UserIndex> {
        self.users.get_or_try_init(|| self.load_users())
    }

    #[instrument(skip(self))]
    fn load_users(&self) -> Result<UserIndex> {
        let mut index = UserIndex::default();
        let mut skip = 0usize;
        let mut pages = 0usize;

        loop {
            let path = format!("/pod/v2/admin/user/list?skip={skip}&limit={}", self.page_size);
            let page = self.execute(Method::GET, &path, None)?;
            pages += 1;

            let users = match &page {
                Value::Array(users) => users.as_slice(),
                Value::Null => &[][..],
                _ => {
                    return Err(EntsyncError::Pagination(format!(
                        "user list page {pages} is not an array"
                    )))
                }
            };
            if users.is_empty() {
                break;
            }

            skip += users.len();
            for user in users {
                index_user(&mut index, user);
            }

            if pages >= self.max_pages {
                return Err(EntsyncError::Pagination(format!(
                    "user list still returned users after {} pages",
                    self.max_pages
                )));
            }
        }

        info!(users = skip, active = index.by_email.len(), "loaded pod users");
        Ok(index)
    }

    /// Set the configured app's install flag for a user. Returns whether the
    /// app list was changed.
    #[instrument(skip(self))]
    fn set_app_installed(&self, user_id: u64, install: bool) -> Result<bool> {
        let Some(app_id) = self.app_id.as_deref() else {
            debug!("no app id configured, skipping app update");
            return Ok(false);
        };

        let path = format!("/pod/v1/admin/user/{user_id}/app/entitlement/list");
        let mut apps = self.execute(Method::GET, &path, None)?;
        let Some(list) = apps.as_array_mut() else {
            return Err(EntsyncError::RemoteCall {
                status: 200,
                body: format!("app list for user {user_id} is not an array"),
            });
        };

        let target = list.iter_mut().find(|app| {
            app.get("appId").and_then(Value::as_str) == Some(app_id)
                && app.get("install").and_then(Value::as_bool) == Some(!install)
        });
        let Some(app) = target else {
            return Ok(false);
        };
        app["install"] = Value::Bool(install);

        self.execute(Method::POST, &path, Some(&apps))?;
        info!(user_id, app_id, install, "updated app entitlement");
        Ok(true)
    }
}

fn index_user(index: &mut UserIndex, user: &Value) {
    if user.pointer("/userSystemInfo/status").and_then(Value::as_str) != Some(ENABLED) {
        return;
    }
    let Some(id) = user.pointer("/userSystemInfo/id").and_then(Value::as_u64) else {
        warn!("skipping pod user without numeric id");
        return;
    };

    if let Some(email) = user.pointer("/userAttributes/emailAddress").and_then(Value::as_str) {
        index.by_email.insert(email.to_lowercase(), id);
    }
    if let Some(username) = user.pointer("/userAttributes/userName").and_then(Value::as_str) {
        index.by_username.insert(username.to_lowercase(), id);
    }
}

impl UserDirectory for PodClient {
    fn lookup_user_by_email(&self, email: &str) -> Result<Option<u64>> {
        Ok(self.users()?.lookup(email))
    }
}

impl AppProvisioner for PodClient {
    fn install_app(&self, user_id: u64) -> Result<bool> {
        self.set_app_installed(user_id, true)
    }

    fn uninstall_app(&self, user_id: u64) -> Result<bool> {
        self.set_app_installed(user_id, false)
    }
}
