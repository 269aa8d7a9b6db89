//! Port interfaces for the batch processor
//!
//! All ports are synchronous: rows are processed strictly one at a time and
//! the only suspension points are blocking network calls inside adapters.

use entsync_domain::{EntitlementRecord, Network, RemoteOutcome, Result};

/// Entitlement operations against the remote administrative API
pub trait EntitlementGateway: Send + Sync {
    /// Network this gateway was constructed for
    fn network(&self) -> Network;

    /// Fully drained listing of current entitlements
    fn list_entitlements(&self) -> Result<Vec<EntitlementRecord>>;

    fn add_entitlement(&self, identifier: &str) -> Result<RemoteOutcome>;

    fn delete_entitlement(&self, identifier: &str) -> Result<RemoteOutcome>;

    fn get_entitlement(&self, identifier: &str) -> Result<RemoteOutcome>;

    /// Look up by identifier or email address
    fn find_entitlement(&self, query: &str) -> Result<RemoteOutcome>;

    fn add_permission(&self, identifier: &str, permission: &str) -> Result<RemoteOutcome>;

    fn list_permissions(&self, identifier: &str) -> Result<RemoteOutcome>;

    fn list_all_permissions(&self) -> Result<RemoteOutcome>;

    /// Grant the room-creation permission; `Ok(None)` on networks without one
    fn add_room_permission(&self, email: &str) -> Result<Option<RemoteOutcome>>;

    /// Email of the user owning the current entitlement, if it has one
    fn entitlement_owner_email(&self, identifier: &str) -> Result<Option<String>>;
}

/// Resolves email addresses to pod user ids
pub trait UserDirectory: Send + Sync {
    fn lookup_user_by_email(&self, email: &str) -> Result<Option<u64>>;
}

/// Installs and removes the companion app for a pod user
pub trait AppProvisioner: Send + Sync {
    /// Returns `true` when the user's app list was changed
    fn install_app(&self, user_id: u64) -> Result<bool>;

    /// Returns `true` when the user's app list was changed
    fn uninstall_app(&self, user_id: u64) -> Result<bool>;
}
