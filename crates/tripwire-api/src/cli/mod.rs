//! CLI command definitions for the `tripwire` binary.
//!
//! Uses clap derive macros. Resource commands follow a noun-verb pattern
//! (`tripwire agent list`, `tripwire agent disable <id>`).

pub mod agent;
pub mod execution;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Blockchain event automation: agents, triggers and actions.
#[derive(Parser)]
#[command(name = "tripwire", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook receiver and management API.
    Serve {
        /// Port to listen on (defaults to server.port in config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to server.host in config.toml).
        #[arg(long)]
        host: Option<String>,

        /// Also export spans to stdout via OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Manage agents.
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },

    /// Show recent executions, newest first.
    #[command(alias = "history")]
    Executions {
        /// Only executions of this agent.
        #[arg(long)]
        agent: Option<String>,

        /// Maximum rows (1-500).
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// List all agents.
    #[command(alias = "ls")]
    List,

    /// Show one agent with its triggers, actions and stats.
    Show {
        /// Agent id.
        id: String,
    },

    /// Create agents from a JSON file (one object or an array).
    Import {
        /// Path to the JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Delete an agent permanently.
    #[command(alias = "rm")]
    Delete {
        /// Agent id.
        id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Activate an agent so its triggers are matched.
    Enable {
        /// Agent id.
        id: String,
    },

    /// Deactivate an agent without deleting it.
    Disable {
        /// Agent id.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tripwire", "executions", "--limit", "5", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Executions { agent, limit } => {
                assert!(agent.is_none());
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected executions command"),
        }
    }

    #[test]
    fn parses_agent_delete_force() {
        let cli = Cli::try_parse_from(["tripwire", "agent", "rm", "abc", "--force"]).unwrap();
        match cli.command {
            Commands::Agent {
                action: AgentCommand::Delete { id, force },
            } => {
                assert_eq!(id, "abc");
                assert!(force);
            }
            _ => panic!("expected agent delete"),
        }
    }
}
