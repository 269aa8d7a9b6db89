//! Entitlement API client
//!
//! - [`auth`]: RS512 credential provider and the owned credential cache
//! - [`endpoints`]: per-network variant table and operation routing
//! - [`client`]: the blocking client implementing `EntitlementGateway`

pub mod auth;
pub mod client;
pub mod endpoints;

pub use auth::{sign_rs512, Claims, Credential, CredentialCache, RsaCredentialProvider, TokenIssuer};
pub use client::{classify, EntitlementClient};
pub use endpoints::{EndpointResolver, NetworkProfile, Operation, Page, ResolvedEndpoint};
