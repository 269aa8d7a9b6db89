//! Batch processor
//!
//! Drives validated rows through the entitlement gateway strictly in input
//! order. Every remote failure is logged with its full error and converted
//! into the row's status string. Only run-fatal errors (bad configuration or
//! key material) stop the batch, and they are returned to the caller.

use entsync_domain::{
    EntitlementRecord, EntsyncError, InputFormat, InputRow, RemoteOutcome, Result, RowAction,
    RowResult,
};
use tracing::{error, info, instrument, warn};

use super::ports::{AppProvisioner, EntitlementGateway, UserDirectory};
use super::status::{self, append};

/// HTTP status meaning the user already holds the entitlement.
const ALREADY_ENTITLED: &str = "409";

/// Applies batch rows against an [`EntitlementGateway`].
pub struct BatchProcessor<'a> {
    gateway: &'a dyn EntitlementGateway,
    format: InputFormat,
    directory: Option<&'a dyn UserDirectory>,
    apps: Option<&'a dyn AppProvisioner>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(gateway: &'a dyn EntitlementGateway, format: InputFormat) -> Self {
        Self { gateway, format, directory: None, apps: None }
    }

    /// Enable email to user-id resolution.
    #[must_use]
    pub fn with_directory(mut self, directory: &'a dyn UserDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Enable app installation on ADD and removal on REMOVE (email format).
    #[must_use]
    pub fn with_apps(mut self, apps: &'a dyn AppProvisioner) -> Self {
        self.apps = Some(apps);
        self
    }

    /// Process every row and return one result per row, in input order.
    ///
    /// # Errors
    /// Returns the first run-fatal error (see [`EntsyncError::aborts_batch`]);
    /// the remaining rows are not attempted.
    pub fn process(&self, rows: &[InputRow]) -> Result<Vec<RowResult>> {
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(self.process_row(row)?);
        }
        info!(
            network = %self.gateway.network(),
            rows = results.len(),
            "batch processing complete"
        );
        Ok(results)
    }

    /// Process a single row. State is local to the call.
    ///
    /// # Errors
    /// Returns run-fatal errors; every other failure becomes the row's status.
    #[instrument(skip(self, row), fields(line = row.line, identifier = %row.identifier))]
    pub fn process_row(&self, row: &InputRow) -> Result<RowResult> {
        let mut result = RowResult::for_row(row);

        if let Some(rejection) = &row.rejection {
            warn!(reason = %rejection, "row rejected");
            result.status.clone_from(rejection);
            return Ok(result);
        }

        match &row.action {
            RowAction::Add => self.add(row, &mut result.status)?,
            RowAction::Remove => self.remove(row, &mut result.status)?,
            RowAction::Blank => self.blank(row, &mut result.status)?,
            RowAction::Invalid(token) => {
                warn!(action = %token, "invalid action");
                result.status = status::INVALID_ACTION.to_string();
            }
        }

        Ok(result)
    }

    /// Full listing used for the roster report at the end of a batch.
    ///
    /// # Errors
    /// Propagates the gateway's listing error.
    pub fn roster(&self) -> Result<Vec<EntitlementRecord>> {
        self.gateway.list_entitlements()
    }

    fn add(&self, row: &InputRow, status: &mut String) -> Result<()> {
        info!("adding entitlement");
        let outcome = match self.gateway.add_entitlement(&row.identifier) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = ?err, "error while adding entitlement");
                *status = status::ERROR_ADDING.to_string();
                return fatal_only(err);
            }
        };
        *status = status::added(&outcome);

        if !is_entitled_after(&outcome) {
            return Ok(());
        }
        if let Some(permission) = &row.permission {
            self.attach_permission(row, permission, status)?;
        }
        if self.format == InputFormat::Email {
            if let Some(email) = row.email.as_deref() {
                self.grant_room_permission(email, status)?;
                self.install_app(email, status)?;
            }
        }
        Ok(())
    }

    fn remove(&self, row: &InputRow, status: &mut String) -> Result<()> {
        info!("removing entitlement");
        // The owner must be resolved before the entitlement disappears.
        let owner_email = self.owner_email_for_removal(row)?;

        let outcome = match self.gateway.delete_entitlement(&row.identifier) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = ?err, "error while removing entitlement");
                *status = status::ERROR_REMOVING.to_string();
                return fatal_only(err);
            }
        };
        *status = status::removed(&outcome);

        if outcome.is_error_payload() {
            return Ok(());
        }
        if let Some(email) = owner_email.as_deref() {
            self.uninstall_app(email, status)?;
        }
        Ok(())
    }

    fn blank(&self, row: &InputRow, status: &mut String) -> Result<()> {
        match &row.permission {
            Some(permission) => self.attach_permission(row, permission, status),
            None => {
                *status = status::NOTHING_TO_DO.to_string();
                Ok(())
            }
        }
    }

    fn attach_permission(
        &self,
        row: &InputRow,
        permission: &str,
        status: &mut String,
    ) -> Result<()> {
        info!(permission, "adding permission");
        match self.gateway.add_permission(&row.identifier, permission) {
            Ok(outcome) => {
                append(status, &status::permission_added(permission, &outcome));
                Ok(())
            }
            Err(err) => {
                error!(permission, error = ?err, "error while adding permission");
                append(status, status::ERROR_ADDING_PERMISSION);
                fatal_only(err)
            }
        }
    }

    fn grant_room_permission(&self, email: &str, status: &mut String) -> Result<()> {
        match self.gateway.add_room_permission(email) {
            Ok(Some(outcome)) => {
                let fragment =
                    outcome.status_title().unwrap_or_else(|| status::ROOM_PERMISSION_GRANTED.into());
                append(status, &fragment);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                error!(email, error = ?err, "error while granting room permission");
                append(status, status::ERROR_ADDING_PERMISSION);
                fatal_only(err)
            }
        }
    }

    fn install_app(&self, email: &str, status: &mut String) -> Result<()> {
        let Some(apps) = self.apps else { return Ok(()) };
        let Some(user_id) = self.resolve_user(email, status)? else { return Ok(()) };

        match apps.install_app(user_id) {
            Ok(true) => append(status, status::APP_INSTALLED),
            Ok(false) => append(status, status::APP_ALREADY_INSTALLED),
            Err(err) => {
                error!(user_id, error = ?err, "error while installing app");
                append(status, status::ERROR_UPDATING_APP);
                return fatal_only(err);
            }
        }
        Ok(())
    }

    fn uninstall_app(&self, email: &str, status: &mut String) -> Result<()> {
        let Some(apps) = self.apps else { return Ok(()) };
        let Some(user_id) = self.resolve_user(email, status)? else { return Ok(()) };

        match apps.uninstall_app(user_id) {
            Ok(true) => append(status, status::APP_REMOVED),
            Ok(false) => append(status, status::APP_NOT_INSTALLED),
            Err(err) => {
                error!(user_id, error = ?err, "error while removing app");
                append(status, status::ERROR_UPDATING_APP);
                return fatal_only(err);
            }
        }
        Ok(())
    }

    fn owner_email_for_removal(&self, row: &InputRow) -> Result<Option<String>> {
        if self.format != InputFormat::Email || self.apps.is_none() {
            return Ok(None);
        }
        if row.email.is_some() {
            return Ok(row.email.clone());
        }
        match self.gateway.entitlement_owner_email(&row.identifier) {
            Ok(email) => Ok(email),
            Err(err) => {
                warn!(error = ?err, "could not resolve entitlement owner");
                fatal_only(err).map(|()| None)
            }
        }
    }

    fn resolve_user(&self, email: &str, status: &mut String) -> Result<Option<u64>> {
        let Some(directory) = self.directory else { return Ok(None) };
        match directory.lookup_user_by_email(email) {
            Ok(Some(user_id)) => Ok(Some(user_id)),
            Ok(None) => {
                warn!(email, "email not found in user directory");
                append(status, &status::user_not_found(email));
                Ok(None)
            }
            Err(err) => {
                error!(email, error = ?err, "error while resolving user");
                append(status, status::ERROR_UPDATING_APP);
                fatal_only(err).map(|()| None)
            }
        }
    }
}

/// Hand run-fatal errors back to the caller; anything else stays a row
/// outcome.
fn fatal_only(err: EntsyncError) -> Result<()> {
    if err.aborts_batch() {
        Err(err)
    } else {
        Ok(())
    }
}

fn is_entitled_after(outcome: &RemoteOutcome) -> bool {
    match outcome.error_status() {
        None => true,
        Some(status) => status == ALREADY_ENTITLED,
    }
}
