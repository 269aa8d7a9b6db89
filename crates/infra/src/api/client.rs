//! Entitlement API client
//!
//! Drives one logical operation at a time: resolve the endpoint, attach the
//! cached credential, send, classify the response. A 401 gets exactly one
//! re-authentication and retry. Listings are drained page by page up to a
//! configured page cap.

use std::sync::Arc;

use entsync_core::EntitlementGateway;
use entsync_domain::{
    AppConfig, EntitlementRecord, EntsyncError, Network, PermissionRecord, RemoteOutcome,
    Result,
};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::auth::{CredentialCache, TokenIssuer};
use super::endpoints::{EndpointResolver, Operation, ResolvedEndpoint};
use crate::errors::map_infra;
use crate::http::SessionFactory;

/// Blocking client for one network's entitlement API.
pub struct EntitlementClient {
    base_url: String,
    resolver: EndpointResolver,
    sessions: SessionFactory,
    credentials: CredentialCache,
    max_pages: usize,
}

impl EntitlementClient {
    /// Create a client for the configured network.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated application configuration
    /// * `issuer` - Token source; its tokens are cached by the client
    ///
    /// # Errors
    ///
    /// Returns `EntsyncError::Config` if the trust store cannot be loaded
    pub fn new(config: &AppConfig, issuer: Arc<dyn TokenIssuer>) -> Result<Self> {
        let sessions = SessionFactory::builder()
            .timeout(config.api.request_timeout())
            .proxy(config.proxy.clone())
            .trust_store(config.truststore_path.clone())
            .build()?;

        Ok(Self::with_sessions(config, issuer, sessions))
    }

    /// Create a client around an existing session factory.
    pub fn with_sessions(
        config: &AppConfig,
        issuer: Arc<dyn TokenIssuer>,
        sessions: SessionFactory,
    ) -> Self {
        let network = config.api.network;
        Self {
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            resolver: EndpointResolver::new(network),
            sessions,
            credentials: CredentialCache::new(issuer, network),
            max_pages: config.api.max_pages,
        }
    }

    /// Endpoint table for the configured network.
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Issue and cache the first credential.
    ///
    /// Run before any row so unusable key material stops the run up front.
    ///
    /// # Errors
    /// Returns `EntsyncError::Config` when the signing key cannot be read or
    /// parsed.
    #[instrument(skip(self), fields(network = %self.resolver.network()))]
    pub fn authenticate(&self) -> Result<()> {
        let credential = self.credentials.current()?;
        info!(expires_at = %credential.expires_at, "credential issued");
        Ok(())
    }

    /// Permissions held by one entitled user.
    ///
    /// # Errors
    /// `Unsupported` on networks without permissions, `RemoteCall` when the
    /// server answers with an error payload.
    pub fn permissions_of(&self, identifier: &str) -> Result<Vec<PermissionRecord>> {
        let outcome = self.list_permissions(identifier)?;
        self.decode_permissions(&outcome, Some(identifier))
    }

    /// Every permission granted across the customer.
    ///
    /// # Errors
    /// As for [`permissions_of`](Self::permissions_of).
    pub fn all_permissions(&self) -> Result<Vec<PermissionRecord>> {
        let outcome = self.list_all_permissions()?;
        self.decode_permissions(&outcome, None)
    }

    fn decode_permissions(
        &self,
        outcome: &RemoteOutcome,
        owner: Option<&str>,
    ) -> Result<Vec<PermissionRecord>> {
        if outcome.error_status().is_some() {
            return Err(listing_error(outcome));
        }
        match outcome {
            RemoteOutcome::Empty => Ok(Vec::new()),
            RemoteOutcome::Json(body) => {
                let records = self.resolver.decode_permissions(body, owner);
                debug!(permissions = records.len(), "decoded permission listing");
                Ok(records)
            }
            RemoteOutcome::Text { body, .. } => {
                Err(EntsyncError::Pagination(format!("permission listing is not JSON: {body}")))
            }
        }
    }

    #[instrument(skip(self), fields(network = %self.resolver.network(), op = operation.name()))]
    fn call(&self, operation: Operation<'_>) -> Result<RemoteOutcome> {
        let endpoint = self.resolver.resolve(operation)?;
        self.execute(&endpoint)
    }

    /// Send once, and once more after re-authenticating if the token was
    /// rejected.
    fn execute(&self, endpoint: &ResolvedEndpoint) -> Result<RemoteOutcome> {
        let credential = self.credentials.current()?;
        let (status, body) = self.send(endpoint, &credential.token)?;
        if status != StatusCode::UNAUTHORIZED {
            return classify(status, body);
        }

        warn!(path = %endpoint.path, "token rejected, retrying once with a new token");
        let fresh = self.credentials.refresh(&credential.token)?;
        let (status, body) = self.send(endpoint, &fresh.token)?;
        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate();
            return Err(EntsyncError::AuthExpired(format!(
                "{} {} rejected the refreshed token",
                endpoint.method, endpoint.path
            )));
        }
        classify(status, body)
    }

    fn send(&self, endpoint: &ResolvedEndpoint, token: &str) -> Result<(StatusCode, String)> {
        let session = self.sessions.build(token)?;
        let url = format!("{}{}", self.base_url, endpoint.path);

        let mut request = session.request(endpoint.method.clone(), &url);
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        let response = session.send(request)?;
        let status = response.status();
        let body = response.text().map_err(map_infra)?;
        Ok((status, body))
    }
}

/// Map a status code and raw body to an outcome.
///
/// 204 is empty. 200, 201, 400, 404 and 409 carry a body that is decoded as
/// JSON when possible and passed through as text otherwise. Any other status
/// is a `RemoteCall` error.
pub fn classify(status: StatusCode, body: String) -> Result<RemoteOutcome> {
    match status.as_u16() {
        204 => Ok(RemoteOutcome::Empty),
        200 | 201 | 400 | 404 | 409 => Ok(match serde_json::from_str::<Value>(&body) {
            Ok(value) => RemoteOutcome::Json(value),
            Err(_) => RemoteOutcome::Text { status: status.as_u16(), body },
        }),
        code => {
            warn!(status = code, body = %body, "remote call failed");
            Err(EntsyncError::RemoteCall { status: code, body })
        }
    }
}

fn listing_error(outcome: &RemoteOutcome) -> EntsyncError {
    let status = outcome.error_status().and_then(|s| s.parse().ok()).unwrap_or_default();
    let body = match outcome {
        RemoteOutcome::Json(value) => value.to_string(),
        RemoteOutcome::Text { body, .. } => body.clone(),
        RemoteOutcome::Empty => String::new(),
    };
    EntsyncError::RemoteCall { status, body }
}

impl EntitlementGateway for EntitlementClient {
    fn network(&self) -> Network {
        self.resolver.network()
    }

    #[instrument(skip(self), fields(network = %self.resolver.network()))]
    fn list_entitlements(&self) -> Result<Vec<EntitlementRecord>> {
        let mut endpoint = self.resolver.resolve(Operation::List)?;
        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            let outcome = self.execute(&endpoint)?;
            pages += 1;

            if let Some(status_title) = outcome.status_title() {
                warn!(page = pages, error = %status_title, "listing returned an error payload");
                return Err(listing_error(&outcome));
            }

            let body = match outcome {
                RemoteOutcome::Empty => break,
                RemoteOutcome::Text { body, .. } => {
                    return Err(EntsyncError::Pagination(format!(
                        "listing page {pages} is not JSON: {body}"
                    )))
                }
                RemoteOutcome::Json(body) => body,
            };

            let page = self.resolver.decode_page(&body)?;
            debug!(page = pages, records = page.records.len(), "fetched listing page");

            let exhausted = page.is_empty();
            records.extend(page.records);

            let Some(next) = page.next.filter(|_| !exhausted) else {
                break;
            };
            if pages >= self.max_pages {
                return Err(EntsyncError::Pagination(format!(
                    "listing still returned a next cursor after {} pages",
                    self.max_pages
                )));
            }
            endpoint = ResolvedEndpoint::get(self.resolver.next_page_path(&next));
        }

        info!(records = records.len(), pages, "listing complete");
        Ok(records)
    }

    fn add_entitlement(&self, identifier: &str) -> Result<RemoteOutcome> {
        self.call(Operation::Add(identifier))
    }

    fn delete_entitlement(&self, identifier: &str) -> Result<RemoteOutcome> {
        self.call(Operation::Delete(identifier))
    }

    fn get_entitlement(&self, identifier: &str) -> Result<RemoteOutcome> {
        self.call(Operation::Get(identifier))
    }

    fn find_entitlement(&self, query: &str) -> Result<RemoteOutcome> {
        self.call(Operation::Find(query))
    }

    fn add_permission(&self, identifier: &str, permission: &str) -> Result<RemoteOutcome> {
        self.call(Operation::AddPermission { identifier, permission })
    }

    fn list_permissions(&self, identifier: &str) -> Result<RemoteOutcome> {
        self.call(Operation::ListPermissions(identifier))
    }

    fn list_all_permissions(&self) -> Result<RemoteOutcome> {
        self.call(Operation::ListAllPermissions)
    }

    fn add_room_permission(&self, email: &str) -> Result<Option<RemoteOutcome>> {
        match self.resolver.profile().room_permission {
            Some(permission) => self
                .call(Operation::AddPermission { identifier: email, permission })
                .map(Some),
            None => Ok(None),
        }
    }

    fn entitlement_owner_email(&self, identifier: &str) -> Result<Option<String>> {
        let outcome = self.get_entitlement(identifier)?;
        if outcome.is_error_payload() {
            return Ok(None);
        }
        Ok(outcome.field_text(self.resolver.profile().fields.email))
    }
}
