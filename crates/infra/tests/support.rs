use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use entsync_domain::{
    ApiConfig, AppConfig, CredentialConfig, FileConfig, Network, ProxyConfig, Result,
};
use entsync_infra::api::{Credential, TokenIssuer};
use entsync_infra::EntitlementClient;
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer};

/// Mock HTTP server driven from synchronous tests.
///
/// The blocking client must never run inside `block_on`, so the runtime is
/// only used to start the server and to mount and verify mocks.
pub struct MockApi {
    rt: Runtime,
    pub server: MockServer,
}

impl MockApi {
    pub fn start() -> Self {
        let rt = Runtime::new().expect("tokio runtime should start");
        let server = rt.block_on(MockServer::start());
        Self { rt, server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn verify(&self) {
        self.rt.block_on(self.server.verify());
    }

    /// Number of requests the server has seen so far.
    pub fn request_count(&self) -> usize {
        self.rt.block_on(self.server.received_requests()).map_or(0, |requests| requests.len())
    }
}

/// Issues predictable tokens (`token-1`, `token-2`, ...).
#[derive(Default)]
pub struct SequentialIssuer {
    issued: AtomicUsize,
}

impl SequentialIssuer {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl TokenIssuer for SequentialIssuer {
    fn issue(&self, network: Network) -> Result<Credential> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let issued_at = Utc::now();
        Ok(Credential {
            network,
            token: format!("token-{n}"),
            issued_at,
            expires_at: issued_at + Duration::seconds(290),
        })
    }
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn app_config(base_url: &str, network: Network) -> AppConfig {
    AppConfig {
        api: ApiConfig {
            base_url: base_url.to_string(),
            network,
            request_timeout_secs: 5,
            max_pages: 1000,
            token_ttl_secs: 290,
        },
        credentials: CredentialConfig {
            private_key_path: fixture("test_rsa_private.pem"),
            public_key_id: "acme-key".into(),
            pod_id: Some("pod-7".into()),
        },
        proxy: ProxyConfig::default(),
        truststore_path: None,
        pod: None,
        files: FileConfig::default(),
    }
}

pub fn client_for(config: &AppConfig) -> (EntitlementClient, Arc<SequentialIssuer>) {
    let issuer = Arc::new(SequentialIssuer::default());
    let client = EntitlementClient::new(config, issuer.clone()).expect("client should build");
    (client, issuer)
}
