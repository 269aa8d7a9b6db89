//! Batch processing of entitlement actions
//!
//! Rows are validated up front ([`input`]), then driven one at a time through
//! the [`ports::EntitlementGateway`] by the [`processor::BatchProcessor`].
//! Per-row failures become status strings ([`status`]); only validation
//! failures stop the batch.

pub mod input;
pub mod ports;
pub mod processor;
pub mod status;

pub use ports::{AppProvisioner, EntitlementGateway, UserDirectory};
