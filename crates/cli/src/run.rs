//! Batch run wiring
//!
//! Config, clients, validation, processing, then reports. Nothing is written
//! until the whole input has validated, and the results report is on disk
//! before the roster listing starts.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use entsync_core::{parse_rows, BatchProcessor};
use entsync_domain::{AppConfig, EntsyncError, Result};
use entsync_infra::config::{apply_env_overrides, load, load_from_file};
use entsync_infra::{
    read_input, write_results, write_roster, EntitlementClient, PodClient, RsaCredentialProvider,
};
use tracing::{info, instrument};

use crate::args::Args;

/// Exit code for configuration, input and file failures.
pub const EXIT_FATAL: u8 = 2;
/// Exit code for any other failure.
pub const EXIT_FAILURE: u8 = 1;

/// What happened to the roster report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roster {
    Written(PathBuf),
    Empty,
    Skipped,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub rows: usize,
    pub output: PathBuf,
    pub roster: Roster,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Processed {} rows, results in {}", self.rows, self.output.display())?;
        match &self.roster {
            Roster::Written(path) => write!(f, ", roster in {}", path.display()),
            Roster::Empty => f.write_str(", roster not written (no entitlements)"),
            Roster::Skipped => f.write_str(", roster skipped"),
        }
    }
}

pub fn run(args: &Args) -> anyhow::Result<Summary> {
    let config = load_config(args).context("failed to load configuration")?;
    execute(&config, args.skip_roster)
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = load_from_file(Some(path.clone()))?;
            apply_env_overrides(&mut config)?;
            config
        }
        None => load()?,
    };
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// Run one batch against a validated config.
///
/// # Errors
/// Client construction, credential issuance, input validation, run-fatal row
/// errors and report writing failures are fatal. A roster listing failure is
/// returned after the results report has been written.
#[instrument(skip_all, fields(network = %config.api.network, format = %config.files.format))]
pub fn execute(config: &AppConfig, skip_roster: bool) -> anyhow::Result<Summary> {
    let issuer = Arc::new(RsaCredentialProvider::from_config(config));
    let client =
        EntitlementClient::new(config, issuer).context("failed to build entitlement client")?;
    client.authenticate().context("failed to issue an API credential")?;
    let pod = PodClient::from_config(config).context("failed to build pod client")?;

    let files = &config.files;
    let records = read_input(&files.input)
        .with_context(|| format!("failed to read {}", files.input.display()))?;
    let rows = parse_rows(files.format, records).context("input validation failed")?;
    info!(rows = rows.len(), input = %files.input.display(), "input validated");

    let mut processor = BatchProcessor::new(&client, files.format);
    if let Some(pod) = &pod {
        processor = processor.with_directory(pod).with_apps(pod);
    }
    let results = processor.process(&rows).context("batch aborted")?;
    write_results(&files.output, files.format, &results)
        .with_context(|| format!("failed to write {}", files.output.display()))?;

    let roster = if skip_roster {
        Roster::Skipped
    } else {
        let records = processor.roster().context("failed to list entitlements for the roster")?;
        if write_roster(&files.roster, &records)
            .with_context(|| format!("failed to write {}", files.roster.display()))?
        {
            Roster::Written(files.roster.clone())
        } else {
            Roster::Empty
        }
    };

    Ok(Summary { rows: results.len(), output: files.output.clone(), roster })
}

/// Map a failed run to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<EntsyncError>() {
        Some(inner) if inner.aborts_batch() => EXIT_FATAL,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use entsync_domain::{
        ApiConfig, CredentialConfig, FileConfig, InputFormat, Network, ProxyConfig,
    };
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const LISTING: &str = "/admin/api/v1/customer/entitlements";

    struct Api {
        rt: Runtime,
        server: MockServer,
    }

    impl Api {
        fn start() -> Self {
            let rt = Runtime::new().unwrap();
            let server = rt.block_on(MockServer::start());
            Self { rt, server }
        }

        fn mount(&self, mock: Mock) {
            self.rt.block_on(mock.mount(&self.server));
        }

        fn request_count(&self) -> usize {
            self.rt.block_on(self.server.received_requests()).map_or(0, |r| r.len())
        }
    }

    fn config(base_url: &str, dir: &Path, input: &str) -> AppConfig {
        let input_path = dir.join("input.csv");
        std::fs::write(&input_path, input).unwrap();
        AppConfig {
            api: ApiConfig {
                base_url: base_url.into(),
                network: Network::WhatsApp,
                request_timeout_secs: 5,
                max_pages: 10,
                token_ttl_secs: 290,
            },
            credentials: CredentialConfig {
                private_key_path: Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("../infra/tests/fixtures/test_rsa_private.pem"),
                public_key_id: "acme-key".into(),
                pod_id: None,
            },
            proxy: ProxyConfig::default(),
            truststore_path: None,
            pod: None,
            files: FileConfig {
                input: input_path,
                output: dir.join("output.csv"),
                roster: dir.join("roster.csv"),
                format: InputFormat::Legacy,
            },
        }
    }

    #[test]
    fn fatal_errors_exit_with_two() {
        let validation = anyhow::Error::from(EntsyncError::Validation("line 3".into()));
        let config = Err::<(), _>(EntsyncError::Config("no key".into()))
            .context("failed to load configuration")
            .unwrap_err();

        assert_eq!(exit_code(&validation), EXIT_FATAL);
        assert_eq!(exit_code(&config), EXIT_FATAL);
    }

    #[test]
    fn remote_and_unknown_errors_exit_with_one() {
        let listing = Err::<(), _>(EntsyncError::Pagination("cap".into()))
            .context("failed to list entitlements for the roster")
            .unwrap_err();

        assert_eq!(exit_code(&listing), EXIT_FAILURE);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }

    #[test]
    fn invalid_input_sends_nothing_and_writes_nothing() {
        let api = Api::start();
        let dir = TempDir::new().unwrap();
        let config = config(&api.server.uri(), dir.path(), "UserID,Action\n1,ADD\n2\n");

        let err = execute(&config, false).unwrap_err();

        assert_eq!(exit_code(&err), EXIT_FATAL);
        assert_eq!(api.request_count(), 0);
        assert!(!config.files.output.exists());
        assert!(!config.files.roster.exists());
    }

    #[test]
    fn unreadable_signing_key_stops_before_any_row() {
        let api = Api::start();
        let dir = TempDir::new().unwrap();
        let mut config = config(&api.server.uri(), dir.path(), "1,ADD\n2,ADD\n3,REMOVE\n");
        config.credentials.private_key_path = dir.path().join("missing.pem");

        let err = execute(&config, false).unwrap_err();

        assert_eq!(exit_code(&err), EXIT_FATAL);
        assert!(matches!(err.downcast_ref::<EntsyncError>(), Some(EntsyncError::Config(_))));
        assert_eq!(api.request_count(), 0);
        assert!(!config.files.output.exists());
    }

    #[test]
    fn completed_run_writes_both_reports() {
        let api = Api::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(LISTING))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({}))),
        );
        api.mount(
            Mock::given(method("GET")).and(path(LISTING)).respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "entitlements": [{ "symphonyId": "1", "entitlementType": "WHATSAPPGROUPS" }]
                })),
            ),
        );
        let dir = TempDir::new().unwrap();
        let config = config(&api.server.uri(), dir.path(), "1,ADD\n");

        let summary = execute(&config, false).unwrap();

        assert_eq!(summary.rows, 1);
        assert_eq!(summary.roster, Roster::Written(config.files.roster.clone()));
        assert!(config.files.output.exists());
        assert!(config.files.roster.exists());
    }

    #[test]
    fn listing_failure_keeps_results_report() {
        let api = Api::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(LISTING))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({}))),
        );
        api.mount(
            Mock::given(method("GET"))
                .and(path(LISTING))
                .respond_with(ResponseTemplate::new(503).set_body_string("maintenance")),
        );
        let dir = TempDir::new().unwrap();
        let config = config(&api.server.uri(), dir.path(), "1,ADD\n");

        let err = execute(&config, false).unwrap_err();

        assert_eq!(exit_code(&err), EXIT_FAILURE);
        assert!(config.files.output.exists());
        assert!(!config.files.roster.exists());
    }

    #[test]
    fn skip_roster_does_not_list() {
        let api = Api::start();
        api.mount(
            Mock::given(method("POST"))
                .and(path(LISTING))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({}))),
        );
        let dir = TempDir::new().unwrap();
        let config = config(&api.server.uri(), dir.path(), "1,ADD\n");

        let summary = execute(&config, true).unwrap();

        assert_eq!(summary.roster, Roster::Skipped);
        assert_eq!(api.request_count(), 1);
        assert_eq!(
            summary.to_string(),
            format!("Processed 1 rows, results in {}, roster skipped", config.files.output.display())
        );
    }
}
