//! Core identifier types and error handling for membersync.
//!
//! This crate provides the identifiers and the `Result` alias shared by the
//! directory client, the reconciler and the command-line front end.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{GroupId, ParseIdError, UserId};
