//! Gitward CLI - evaluate Git access decisions against a snapshot.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use gitward_access::{AccessConfig, RepositoryKind};
use std::path::PathBuf;

mod commands;
mod logging;
mod snapshot;

use logging::LogFormat;

/// Gitward - Git access decisions for hosted repositories
#[derive(Parser, Debug)]
#[command(name = "gitward")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Instance settings file (TOML); GITWARD__* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Project,
    Wiki,
    Design,
}

impl From<Kind> for RepositoryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Project => RepositoryKind::Project,
            Kind::Wiki => RepositoryKind::Wiki,
            Kind::Design => RepositoryKind::Design,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide whether a Git command is allowed
    Check {
        /// Authorization snapshot (YAML)
        #[arg(short, long)]
        snapshot: PathBuf,
        /// anonymous, user:<username>, key:<id>, token:<id> or job:<id>
        #[arg(short, long)]
        actor: String,
        /// Project path as the client requested it (e.g. acme/api)
        #[arg(short, long)]
        project: String,
        /// Git command (git-upload-pack, git-receive-pack, ...)
        #[arg(long = "command", default_value = "git-upload-pack")]
        git_command: String,
        /// ssh, http or web
        #[arg(long, default_value = "ssh")]
        protocol: String,
        /// Repository container
        #[arg(long, value_enum, default_value_t = Kind::Project)]
        kind: Kind,
        /// Credential scope: full, read-only, build or none
        #[arg(long)]
        abilities: Option<String>,
        /// SSH key the user authenticated with, as <algorithm>:<bits>
        #[arg(long)]
        ssh_key: Option<String>,
        /// A ref change "<oldrev> <newrev> <ref>" (repeatable)
        #[arg(long = "change")]
        changes: Vec<String>,
        /// File of pre-receive hook lines
        #[arg(long, conflicts_with = "changes")]
        changes_file: Option<PathBuf>,
        /// Size of the incoming push in bytes
        #[arg(long, default_value_t = 0)]
        push_size: u64,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Explain a user's access level on a project
    Level {
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Username
        #[arg(short, long)]
        user: String,
        /// Project path
        #[arg(short, long)]
        project: String,
    },

    /// List the projects a user can reach
    Authorizations {
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Username
        #[arg(short, long)]
        user: String,
    },

    /// Show protected ref rules of a project
    Rules {
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Project path
        #[arg(short, long)]
        project: String,
        /// Only show the rule protecting this ref
        #[arg(long = "ref")]
        ref_name: Option<String>,
    },

    /// Show version information
    Version,
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Check {
            snapshot,
            actor,
            project,
            git_command,
            protocol,
            kind,
            abilities,
            ssh_key,
            changes,
            changes_file,
            push_size,
            json,
        } => {
            let config =
                AccessConfig::load(cli.config.as_deref()).context("loading configuration")?;
            let request = commands::CheckRequest {
                actor,
                project,
                protocol,
                command: git_command,
                kind: kind.into(),
                abilities,
                ssh_key,
                changes: commands::read_changes(&changes, changes_file.as_deref())?,
                push_size,
                json,
            };
            commands::check(&snapshot, &config, request)
        }
        Commands::Level {
            snapshot,
            user,
            project,
        } => commands::level(&snapshot, &user, &project).map(|_| true),
        Commands::Authorizations { snapshot, user } => {
            commands::authorizations(&snapshot, &user).map(|_| true)
        }
        Commands::Rules {
            snapshot,
            project,
            ref_name,
        } => commands::rules(&snapshot, &project, ref_name.as_deref()).map(|_| true),
        Commands::Version => {
            println!("gitward {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose), cli.log_format);

    match run(cli) {
        Ok(true) => {}
        // Denied: the client message is already on stderr.
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}
