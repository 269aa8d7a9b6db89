//! # Entsync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the entitlement API, the user directory
//!   and app provisioning
//! - Input row validation
//! - The batch processor that turns rows into per-row outcomes
//!
//! ## Architecture Principles
//! - Only depends on `entsync-domain`
//! - No HTTP, file or platform code
//! - All external dependencies via traits

pub mod batch;

pub use batch::input::parse_rows;
pub use batch::ports::{AppProvisioner, EntitlementGateway, UserDirectory};
pub use batch::processor::BatchProcessor;
