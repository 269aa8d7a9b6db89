//! Status strings written to the per-row outcome report

use entsync_domain::RemoteOutcome;

pub const INVALID_ACTION: &str = "Action is not ADD/REMOVE - SKIPPED";
pub const NOTHING_TO_DO: &str = "Nothing to do - SKIPPED";
pub const ADDED: &str = "Added successfully";
pub const REMOVED: &str = "Removed successfully";
pub const ERROR_ADDING: &str = "ERROR ADDING - Check logs for details";
pub const ERROR_REMOVING: &str = "ERROR REMOVING - Check logs for details";
pub const ERROR_ADDING_PERMISSION: &str = "ERROR ADDING PERMISSION - Check logs for details";
pub const ERROR_UPDATING_APP: &str = "ERROR UPDATING APP - Check logs for details";
pub const ROOM_PERMISSION_GRANTED: &str = "room permission granted";
pub const APP_INSTALLED: &str = "app installed";
pub const APP_ALREADY_INSTALLED: &str = "app already installed";
pub const APP_REMOVED: &str = "app removed";
pub const APP_NOT_INSTALLED: &str = "app not installed";

/// Status for a completed add call.
pub fn added(outcome: &RemoteOutcome) -> String {
    if let Some(name) = outcome.field_text("displayName") {
        return format!("{name} added successfully");
    }
    outcome.status_title().unwrap_or_else(|| ADDED.to_string())
}

/// Status for a completed delete call.
pub fn removed(outcome: &RemoteOutcome) -> String {
    outcome.status_title().unwrap_or_else(|| REMOVED.to_string())
}

/// Status fragment for a completed permission call.
pub fn permission_added(permission: &str, outcome: &RemoteOutcome) -> String {
    outcome.status_title().unwrap_or_else(|| format!("permission {permission} added"))
}

pub fn user_not_found(email: &str) -> String {
    format!("user not found for {email}")
}

/// Append a follow-up fragment to an existing status.
pub fn append(status: &mut String, fragment: &str) {
    if !status.is_empty() {
        status.push_str("; ");
    }
    status.push_str(fragment);
}
