//! # inperson
//!
//! Command-line front end for inperson sync: plan events, invite friends
//! and answer invitations, all stored locally.
//!
//! ## Commands
//!
//! - `init`: Initialize device identity
//! - `create`: Create an event
//! - `list` / `show`: Inspect events and responses
//! - `respond`: Answer an event
//! - `invite`: Invite friends to an event
//! - `friends`: Manage the friend directory
//! - `status`: Show local status
//! - `demo`: Run two in-process devices through a sync session
//!
//! ## Example
//!
//! ```bash
//! # Initialize device
//! inperson init --name "Alice"
//!
//! # Remember a friend by the user id they shared
//! inperson friends add Bob 5d3c...
//!
//! # Plan something for the weekend
//! inperson create "BBQ" --when +2d --publicity private
//! inperson invite 1a2b3c4d Bob
//!
//! # Watch two devices sync
//! inperson demo
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use inperson_sync_types::{Attendance, Publicity};
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod config;

use commands::{create, demo, friends, init, invite, list, respond, show, status};
use config::{set_dir_permissions_0700, NodeConfig};

/// Offline-first event planning between nearby friends.
#[derive(Parser, Debug)]
#[command(name = "inperson")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for device identity, settings and events
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase logging (-v info, -vv debug, -vvv trace). RUST_LOG wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize device identity
    Init {
        /// Your display name
        #[arg(long, short)]
        name: String,
    },

    /// Create an event
    Create {
        /// Event title
        title: String,

        /// When: RFC 3339 or an offset like +90m, +3h, +2d
        #[arg(long, short)]
        when: String,

        /// Who may see the event
        #[arg(long, short, value_enum, default_value = "private")]
        publicity: PublicityArg,
    },

    /// List events
    List {
        /// Include past events
        #[arg(long)]
        past: bool,
    },

    /// Show an event with its responses
    Show {
        /// Event id or unique prefix
        id: String,
    },

    /// Answer an event
    Respond {
        /// Event id or unique prefix
        id: String,

        /// Your answer
        #[arg(value_enum)]
        answer: AnswerArg,
    },

    /// Invite friends to an event
    Invite {
        /// Event id or unique prefix
        id: String,

        /// Friend names or user ids
        #[arg(required = true)]
        friends: Vec<String>,
    },

    /// Manage friends
    Friends {
        #[command(subcommand)]
        command: FriendsCommand,
    },

    /// Show local status
    Status,

    /// Run two in-process devices through a sync session
    Demo {
        /// Seconds to wait for each sync step
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
}

#[derive(Subcommand, Debug)]
enum FriendsCommand {
    /// List friends
    List,

    /// Add a friend
    Add {
        /// Display name
        name: String,

        /// The friend's user id
        user_id: String,
    },

    /// Forget every friend
    Clear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PublicityArg {
    /// Only invitees, invited by the host
    Private,
    /// Invitees may invite their friends
    CanInvite,
    /// Shared with every nearby friend
    Public,
}

impl From<PublicityArg> for Publicity {
    fn from(arg: PublicityArg) -> Self {
        match arg {
            PublicityArg::Private => Publicity::Private,
            PublicityArg::CanInvite => Publicity::CanInvite,
            PublicityArg::Public => Publicity::AutoShare,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnswerArg {
    Going,
    NotGoing,
    Maybe,
}

impl From<AnswerArg> for Attendance {
    fn from(arg: AnswerArg) -> Self {
        match arg {
            AnswerArg::Going => Attendance::Going,
            AnswerArg::NotGoing => Attendance::NotGoing,
            AnswerArg::Maybe => Attendance::Maybe,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    set_dir_permissions_0700(&data_dir).await?;

    let config = NodeConfig::load(&data_dir)?;
    setup_logging(cli.verbose, &config.log.filter);

    match cli.command {
        Commands::Init { name } => {
            init::run(&data_dir, &name).await?;
        }
        Commands::Create {
            title,
            when,
            publicity,
        } => {
            let date = create::parse_when(&when, chrono::Utc::now())?;
            create::run(&data_dir, &title, date, publicity.into()).await?;
        }
        Commands::List { past } => {
            list::run(&data_dir, past).await?;
        }
        Commands::Show { id } => {
            show::run(&data_dir, &id).await?;
        }
        Commands::Respond { id, answer } => {
            respond::run(&data_dir, &id, answer.into()).await?;
        }
        Commands::Invite { id, friends } => {
            invite::run(&data_dir, &id, &friends).await?;
        }
        Commands::Friends { command } => match command {
            FriendsCommand::List => friends::list(&data_dir).await?,
            FriendsCommand::Add { name, user_id } => {
                friends::add(&data_dir, &name, &user_id).await?;
            }
            FriendsCommand::Clear => friends::clear(&data_dir).await?,
        },
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Demo { timeout } => {
            demo::run(&config.sync, Duration::from_secs(timeout)).await?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `-v` flags override the configured
/// filter; `RUST_LOG` overrides both.
fn setup_logging(verbosity: u8, configured: &str) {
    let filter = match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory for inperson.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "inperson", "inperson")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
