use clap::{Parser, Subcommand};
use membersync::commands::{self, Commands};
use membersync::config::CliConfig;
use membersync::error::CliError;
use membersync::state_store::StateStore;
use membersync_core::Result;
use membersync_directory::HttpDirectoryClient;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "membersync")]
#[command(about = "Reconcile directory group membership against a desired state")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./membersync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a desired state and preview the calls apply would issue
    Plan {
        /// Desired state JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create or update a group's membership from a desired state
    Apply {
        /// Desired state JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a group's current membership
    Read { group_id: String },

    /// Start managing an existing group by id
    Import { group_id: String },

    /// Remove every unprotected member and stop managing a group
    Delete {
        group_id: String,

        /// User to keep (repeatable; defaults to the applied protected users)
        #[arg(long = "protect-user", value_name = "ID")]
        protect_users: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(report) => {
            eprintln!("error: {report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let config = CliConfig::load(cli.config.as_deref()).map_err(|e| CliError::Config {
        details: e.to_string(),
    })?;
    tracing::debug!(state_dir = %config.state_dir.display(), "loaded configuration");

    let directory = config.directory.ok_or(CliError::MissingDirectory)?;
    let client = HttpDirectoryClient::new(directory)
        .map_err(|report| report.context(CliError::ClientSetup))?;
    let runner = Commands::new(client, config.reconcile, StateStore::new(config.state_dir));

    match cli.command {
        Command::Plan { file } => {
            let desired = commands::read_desired(&file)?;
            render(&runner.plan(&desired).await?)
        }
        Command::Apply { file } => {
            let desired = commands::read_desired(&file)?;
            render(&runner.apply(&desired).await?.record)
        }
        Command::Read { group_id } => {
            let group_id = commands::parse_group_id(&group_id)?;
            render(&runner.read(&group_id).await?)
        }
        Command::Import { group_id } => {
            let group_id = commands::parse_group_id(&group_id)?;
            render(&runner.import(&group_id).await?)
        }
        Command::Delete {
            group_id,
            protect_users,
        } => {
            let group_id = commands::parse_group_id(&group_id)?;
            let protect_users = commands::parse_user_ids(&protect_users)?;
            render(&runner.delete(&group_id, protect_users).await?.record)
        }
    }
}

fn render<T: Serialize>(value: &T) -> Result<String, CliError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| CliError::Output {
        details: e.to_string(),
    })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delete_collects_repeated_protect_user() {
        let cli = Cli::try_parse_from([
            "membersync",
            "delete",
            "42",
            "--protect-user",
            "1",
            "--protect-user",
            "2",
        ])
        .unwrap();

        match cli.command {
            Command::Delete {
                group_id,
                protect_users,
            } => {
                assert_eq!(group_id, "42");
                assert_eq!(protect_users, vec!["1".to_string(), "2".to_string()]);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn apply_takes_file_and_global_config() {
        let cli =
            Cli::try_parse_from(["membersync", "apply", "-f", "desired.json", "--config", "x.toml"])
                .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Apply { file } if file == PathBuf::from("desired.json")));
    }
}
