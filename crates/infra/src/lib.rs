//! # Entsync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The entitlement API client (credentials, endpoint routing, pagination)
//! - The pod admin client (user directory, app provisioning)
//! - HTTP session construction (proxy, trust store)
//! - Configuration loading
//! - CSV input and report files
//!
//! ## Architecture
//! - Implements traits defined in `entsync-core`
//! - Depends on `entsync-domain` and `entsync-core`
//! - Contains all "impure" code (network and file I/O)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod pod;
pub mod reports;

// Re-export commonly used items
pub use api::{EntitlementClient, RsaCredentialProvider, TokenIssuer};
pub use errors::{map_infra, InfraError};
pub use http::{Session, SessionFactory};
pub use pod::PodClient;
pub use reports::{read_input, write_results, write_roster};
