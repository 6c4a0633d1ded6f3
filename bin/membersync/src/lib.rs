//! Command-line front end for membersync.
//!
//! Reads desired membership from JSON documents, reconciles it through the
//! HTTP directory client, and keeps the last applied state of each managed
//! group on disk.

pub mod commands;
pub mod config;
pub mod error;
pub mod state_store;
