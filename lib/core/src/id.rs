//! Strongly-typed identifiers for directory entities.
//!
//! The remote directory hands out opaque string ids. They are never parsed
//! or reinterpreted here, only checked for being non-empty and carried
//! around with their kind attached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed wrapper around an opaque string id.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates an ID, rejecting empty or whitespace-only input.
            ///
            /// # Errors
            ///
            /// Returns a `ParseIdError` if the id is blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ParseIdError {
                        id_type: stringify!($name),
                        reason: "id must not be empty".to_string(),
                    });
                }
                Ok(Self(id))
            }

            /// Returns the raw id.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a directory user.
    UserId
);

define_id!(
    /// Identifier of a directory group.
    GroupId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_raw_id() {
        let id: UserId = "42".parse().expect("should parse");
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn parse_rejects_blank() {
        let result: Result<GroupId, _> = "   ".parse();
        let err = result.unwrap_err();
        assert_eq!(err.id_type, "GroupId");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn ordering_follows_raw_string() {
        use std::collections::BTreeSet;

        let ids: BTreeSet<UserId> = ["u2", "u1", "u3", "u1"]
            .into_iter()
            .map(|s| UserId::new(s).expect("valid"))
            .collect();

        let raw: Vec<&str> = ids.iter().map(UserId::as_str).collect();
        assert_eq!(raw, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn serde_is_transparent() {
        let id = GroupId::new("17").expect("valid");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"17\"");
        let parsed: GroupId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_rejects_empty() {
        let result: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
