//! Directory error types.

use crate::types::{MemberKind, MembershipOperation};
use std::fmt;

/// Errors from the remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The referenced entity does not exist.
    NotFound {
        /// Kind of the missing entity.
        kind: MemberKind,
        /// The id that was looked up.
        id: String,
    },
    /// Failed to reach the directory.
    ConnectionFailed {
        /// Error details.
        details: String,
    },
    /// The directory rejected the credentials.
    AuthenticationFailed {
        /// Error details.
        details: String,
    },
    /// A directory request failed.
    RequestFailed {
        /// The operation that failed.
        operation: MembershipOperation,
        /// Error details.
        details: String,
    },
    /// A listing needed more pages than the client is allowed to fetch.
    ListingTruncated {
        /// The group being listed.
        group_id: String,
        /// How many members were fetched before giving up.
        fetched: usize,
    },
    /// The directory answered with a body that could not be understood.
    InvalidResponse {
        /// Error details.
        details: String,
    },
}

impl DirectoryError {
    /// Returns true if this error means the referenced entity is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => {
                write!(f, "{kind} '{id}' not found")
            }
            Self::ConnectionFailed { details } => {
                write!(f, "failed to connect to directory: {details}")
            }
            Self::AuthenticationFailed { details } => {
                write!(f, "directory authentication failed: {details}")
            }
            Self::RequestFailed { operation, details } => {
                write!(f, "directory request '{operation}' failed: {details}")
            }
            Self::ListingTruncated { group_id, fetched } => {
                write!(
                    f,
                    "listing of group '{group_id}' truncated after {fetched} members"
                )
            }
            Self::InvalidResponse { details } => {
                write!(f, "invalid directory response: {details}")
            }
        }
    }
}

impl std::error::Error for DirectoryError {}
