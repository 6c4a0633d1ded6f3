//! Error types for the reconcile crate.
//!
//! Errors are designed for layered context using rootcause: directory
//! failures stay attached as the cause, and `ReconcileError` names the
//! reconciliation step and the ids involved.

use membersync_core::{GroupId, UserId};
use membersync_directory::MembershipOperation;
use std::fmt;

/// Errors from reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A desired user does not exist in the directory.
    UserNotFound { user_id: UserId },
    /// Looking up a desired user failed for a reason other than absence.
    UserLookupFailed { user_id: UserId },
    /// The desired state cannot be applied as given.
    InvalidDesiredState { reason: String },
    /// The desired state names a different group than the one being managed.
    IdentityChanged { current: GroupId, requested: GroupId },
    /// A directory call failed (use as context wrapper).
    RemoteOperation {
        operation: MembershipOperation,
        group_id: GroupId,
    },
}

impl ReconcileError {
    /// Returns true if the error was raised before any membership change.
    #[must_use]
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound { .. }
                | Self::UserLookupFailed { .. }
                | Self::InvalidDesiredState { .. }
                | Self::IdentityChanged { .. }
        )
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserNotFound { user_id } => {
                write!(f, "error fetching user with id {user_id}: user does not exist")
            }
            Self::UserLookupFailed { user_id } => {
                write!(f, "error fetching user with id {user_id}")
            }
            Self::InvalidDesiredState { reason } => {
                write!(f, "invalid desired state: {reason}")
            }
            Self::IdentityChanged { current, requested } => {
                write!(
                    f,
                    "target group cannot change from '{current}' to '{requested}'"
                )
            }
            Self::RemoteOperation {
                operation,
                group_id,
            } => {
                write!(f, "'{operation}' failed for group '{group_id}'")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
