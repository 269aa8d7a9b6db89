//! # Entsync Domain
//!
//! Business domain types and models for entitlement synchronization.
//!
//! This crate contains:
//! - Network, entitlement and permission types
//! - Batch row types and input formats
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other entsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
