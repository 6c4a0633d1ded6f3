//! Error handling foundation for membersync.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error type in its own
//! error module and adds layer-appropriate context with `Report::context`
//! as errors propagate.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context as errors propagate.
pub type Result<T, C> = std::result::Result<T, Report<C>>;
