//! Remote directory access for membersync.
//!
//! This crate defines the [`MembershipClient`] capability the reconciler is
//! written against, together with two implementations: an HTTP client for a
//! REST directory API and an in-memory directory.

mod client;
mod config;
mod error;
mod http;
pub mod memory;
mod types;

pub use client::MembershipClient;
pub use config::HttpDirectoryConfig;
pub use error::DirectoryError;
pub use http::HttpDirectoryClient;
pub use memory::{DirectoryCall, InMemoryDirectory};
pub use types::{Group, Member, MemberKind, MembershipEdge, MembershipOperation, User};
