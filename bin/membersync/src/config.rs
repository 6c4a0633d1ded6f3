//! Command-line configuration.
//!
//! Loaded via the `config` crate from an optional TOML file layered under
//! environment variables prefixed `MEMBERSYNC`, with `__` separating
//! sections (`MEMBERSYNC__DIRECTORY__BASE_URL`).
//!
//! See [`HttpDirectoryConfig`] for the directory section.

use membersync_directory::HttpDirectoryConfig;
use membersync_reconcile::ReconcilerOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "membersync.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MEMBERSYNC";

/// Configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Remote directory connection. Required by every command.
    #[serde(default)]
    pub directory: Option<HttpDirectoryConfig>,

    /// Reconciler behavior.
    #[serde(default)]
    pub reconcile: ReconcilerOptions,

    /// Directory holding applied state, one JSON document per group.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".membersync")
}

impl CliConfig {
    /// Loads configuration from `path` (or the default file, if present) and
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or if the
    /// merged configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::new(DEFAULT_CONFIG_FILE, config::FileFormat::Toml).required(false),
        };

        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membersync_reconcile::SyncStrategy;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_sections_from_file() {
        let file = write_config(
            r#"
            state_dir = "/var/lib/membersync"

            [directory]
            base_url = "https://directory.example.com/api/4.0"
            client_id = "id"
            client_secret = "secret"
            timeout_secs = 5

            [reconcile]
            strategy = "delta"
            "#,
        );

        let config = CliConfig::load(Some(file.path())).unwrap();

        let directory = config.directory.unwrap();
        assert_eq!(directory.base_url(), "https://directory.example.com/api/4.0");
        assert_eq!(directory.timeout(), Duration::from_secs(5));
        assert_eq!(directory.page_size(), 100);
        assert_eq!(config.reconcile.strategy, SyncStrategy::Delta);
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/membersync"));
    }

    #[test]
    fn optional_sections_have_defaults() {
        let file = write_config("");

        let config = CliConfig::load(Some(file.path())).unwrap();

        assert!(config.directory.is_none());
        assert_eq!(config.reconcile.strategy, SyncStrategy::FullSweep);
        assert_eq!(config.state_dir, PathBuf::from(".membersync"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        assert!(CliConfig::load(Some(&missing)).is_err());
    }
}
