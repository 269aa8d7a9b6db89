//! Domain types and models

pub mod batch;
pub mod entitlement;
pub mod network;

pub use batch::{InputFormat, InputRow, RowAction, RowResult};
pub use entitlement::{EntitlementRecord, PermissionRecord, RemoteOutcome};
pub use network::Network;
