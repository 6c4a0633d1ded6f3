//! Error types for the command-line front end.

use std::fmt;

/// Command-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// No `directory` section was configured.
    MissingDirectory,
    /// The directory client could not be built.
    ClientSetup,
    /// A desired-state file could not be read or parsed.
    DesiredStateFile { path: String, details: String },
    /// An id given on the command line is invalid.
    InvalidArgument { details: String },
    /// A command failed (use as context wrapper).
    Command {
        command: &'static str,
        group_id: String,
    },
    /// Output could not be rendered.
    Output { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::MissingDirectory => {
                write!(
                    f,
                    "no directory configured (set [directory] in the config file or MEMBERSYNC__DIRECTORY__BASE_URL)"
                )
            }
            Self::ClientSetup => write!(f, "failed to set up directory client"),
            Self::DesiredStateFile { path, details } => {
                write!(f, "invalid desired state file '{path}': {details}")
            }
            Self::InvalidArgument { details } => write!(f, "invalid argument: {details}"),
            Self::Command { command, group_id } => {
                write!(f, "{command} failed for group '{group_id}'")
            }
            Self::Output { details } => write!(f, "failed to render output: {details}"),
        }
    }
}

impl std::error::Error for CliError {}
